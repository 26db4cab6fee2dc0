//! 规则编译器
//!
//! 将 `name` / `name:params` 形式的规则字面量解析成带类型的 [`Rule`]，
//! 在解析阶段完成参数校验与正则预编译，执行阶段不再出现定义错误。

use regex::Regex;

use crate::error::{Result, ValidationError};
use crate::evaluator::parse_datetime;
use crate::rules::{Format, Rule, RuleKind};

/// 规则编译器
pub struct RuleParser;

impl RuleParser {
    /// 解析单条规则字面量
    ///
    /// 参数以逗号分隔；`regex` 例外，冒号之后的全部内容都是模式。
    /// 未知的规则名解析为 [`RuleKind::Custom`]，由引擎在执行时查找注册的谓词。
    pub fn parse(field: &str, literal: &str) -> Result<Rule> {
        Self::parse_with(field, literal, None)
    }

    /// 解析含占位符的规则字面量
    ///
    /// 先按原字面量拆分参数，再把各参数中的 `placeholder` 替换为 `identifier`，
    /// 标识中的逗号与首尾空白原样保留；`regex` 模式中的标识会被转义。
    pub fn parse_bound(
        field: &str,
        literal: &str,
        placeholder: &str,
        identifier: &str,
    ) -> Result<Rule> {
        Self::parse_with(field, literal, Some((placeholder, identifier)))
    }

    fn parse_with(field: &str, literal: &str, binding: Option<(&str, &str)>) -> Result<Rule> {
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(ValidationError::invalid_rule(field, literal, "不能为空"));
        }

        let (name, raw_params) = match literal.split_once(':') {
            Some((name, rest)) => (name.trim(), Some(rest)),
            None => (literal, None),
        };

        if name.is_empty() {
            return Err(ValidationError::invalid_rule(field, literal, "缺少规则名"));
        }

        let bind = |param: &str, escape: bool| match binding {
            Some((placeholder, identifier)) if escape => {
                param.replace(placeholder, &regex::escape(identifier))
            }
            Some((placeholder, identifier)) => param.replace(placeholder, identifier),
            None => param.to_string(),
        };

        let params: Vec<String> = match (name, raw_params) {
            ("regex", Some(pattern)) => vec![bind(pattern, true)],
            (_, Some(rest)) => rest.split(',').map(|p| bind(p.trim(), false)).collect(),
            (_, None) => Vec::new(),
        };

        let concrete = match binding {
            Some((placeholder, identifier)) => literal.replace(placeholder, identifier),
            None => literal.to_string(),
        };

        let kind = Self::parse_kind(field, &concrete, name, &params, raw_params.is_some())?;

        Ok(Rule::new(concrete, name, params, kind))
    }

    /// 批量解析
    pub fn parse_all<I, S>(field: &str, literals: I) -> Result<Vec<Rule>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        literals
            .into_iter()
            .map(|literal| Self::parse(field, literal.as_ref()))
            .collect()
    }

    fn parse_kind(
        field: &str,
        literal: &str,
        name: &str,
        params: &[String],
        has_params: bool,
    ) -> Result<RuleKind> {
        let invalid = |reason: &str| ValidationError::invalid_rule(field, literal, reason);

        let kind = match name {
            "required" => RuleKind::Required,
            "confirmed" => RuleKind::Confirmed,
            "format" => {
                let name = Self::single(params).ok_or_else(|| invalid("需要一个格式名"))?;
                let format = name
                    .parse::<Format>()
                    .map_err(|_| invalid(&format!("不支持的格式 '{}'", name)))?;
                RuleKind::Format(format)
            }
            "range" | "between" => {
                let (min, max) =
                    Self::bounds(params).ok_or_else(|| invalid("需要 MIN-MAX 边界"))?;
                let min = Self::number(&min).ok_or_else(|| invalid("下界不是数值"))?;
                let max = Self::number(&max).ok_or_else(|| invalid("上界不是数值"))?;
                if min > max {
                    return Err(invalid("下界大于上界"));
                }
                RuleKind::Range { min, max }
            }
            "min" => RuleKind::Min(
                Self::single(params)
                    .and_then(Self::number)
                    .ok_or_else(|| invalid("需要一个数值参数"))?,
            ),
            "max" => RuleKind::Max(
                Self::single(params)
                    .and_then(Self::number)
                    .ok_or_else(|| invalid("需要一个数值参数"))?,
            ),
            "length" => {
                let (min, max) = match Self::bounds(params) {
                    Some((min, max)) => (Self::size(&min), Self::size(&max)),
                    None => {
                        let exact = Self::single(params).and_then(Self::size);
                        (exact, exact)
                    }
                };
                match (min, max) {
                    (Some(min), Some(max)) if min <= max => RuleKind::Length {
                        min: Some(min),
                        max: Some(max),
                    },
                    (Some(_), Some(_)) => return Err(invalid("下界大于上界")),
                    _ => return Err(invalid("需要非负整数长度")),
                }
            }
            "min_length" => RuleKind::Length {
                min: Some(
                    Self::single(params)
                        .and_then(Self::size)
                        .ok_or_else(|| invalid("需要非负整数长度"))?,
                ),
                max: None,
            },
            "max_length" => RuleKind::Length {
                min: None,
                max: Some(
                    Self::single(params)
                        .and_then(Self::size)
                        .ok_or_else(|| invalid("需要非负整数长度"))?,
                ),
            },
            "regex" => {
                let pattern = params
                    .first()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| invalid("需要正则表达式"))?;
                let regex = Regex::new(pattern)
                    .map_err(|e| invalid(&format!("正则表达式无效: {}", e)))?;
                RuleKind::Regex(regex)
            }
            "unique" => {
                if params.len() > 2 {
                    return Err(invalid("最多接受 COLUMN,EXCEPT 两个参数"));
                }
                let non_empty = |i: usize| params.get(i).filter(|p| !p.is_empty()).cloned();
                RuleKind::Unique {
                    column: non_empty(0),
                    except: non_empty(1),
                }
            }
            "same" => RuleKind::Same(
                Self::single(params)
                    .ok_or_else(|| invalid("需要另一个字段名"))?
                    .to_string(),
            ),
            "different" => RuleKind::Different(
                Self::single(params)
                    .ok_or_else(|| invalid("需要另一个字段名"))?
                    .to_string(),
            ),
            "in" | "not_in" => {
                if params.iter().all(|p| p.is_empty()) {
                    return Err(invalid("需要至少一个候选值"));
                }
                let values = params.to_vec();
                if name == "in" {
                    RuleKind::In(values)
                } else {
                    RuleKind::NotIn(values)
                }
            }
            "before" | "after" => {
                let date = Self::single(params)
                    .and_then(parse_datetime)
                    .ok_or_else(|| invalid("需要 RFC 3339 或 YYYY-MM-DD 日期"))?;
                if name == "before" {
                    RuleKind::Before(date)
                } else {
                    RuleKind::After(date)
                }
            }
            other => match other.parse::<Format>() {
                // `email`、`numeric` 等简写
                Ok(format) if !has_params => RuleKind::Format(format),
                _ => RuleKind::Custom,
            },
        };

        Ok(kind)
    }

    /// 恰好一个非空参数
    fn single(params: &[String]) -> Option<&str> {
        match params {
            [only] if !only.is_empty() => Some(only.as_str()),
            _ => None,
        }
    }

    /// `MIN,MAX` 或 `MIN-MAX`（允许负数下界，如 `-5-10`）
    fn bounds(params: &[String]) -> Option<(String, String)> {
        match params {
            [min, max] => Some((min.clone(), max.clone())),
            [single] => {
                let (split, _) = single.char_indices().skip(1).find(|(_, c)| *c == '-')?;
                Some((single[..split].to_string(), single[split + 1..].to_string()))
            }
            _ => None,
        }
    }

    fn number(s: &str) -> Option<f64> {
        s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }

    fn size(s: &str) -> Option<usize> {
        s.trim().parse::<usize>().ok()
    }
}
