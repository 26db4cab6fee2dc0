//! 谓词评估器
//!
//! 实现内置规则的求值逻辑。除 `required` 外，所有规则在值缺失或为空时直接通过，
//! 类型不符的值视为不满足规则而不是错误。

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use validator::{ValidateEmail, ValidateIp, ValidateUrl};

use crate::error::{Result, ValidationError};
use crate::predicate::PredicateContext;
use crate::rules::{Format, Rule, RuleKind};

/// 内置谓词评估器
pub struct PredicateEvaluator;

impl PredicateEvaluator {
    /// 评估一条内置规则
    ///
    /// # Arguments
    /// * `rule` - 已解析的规则
    /// * `value` - 从属性集中取出的字段值
    /// * `ctx` - 跨字段规则与唯一性查询需要的上下文
    pub fn evaluate(
        rule: &Rule,
        value: Option<&Value>,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool> {
        if Self::is_empty(value) {
            return Ok(!rule.kind().is_implicit());
        }

        // is_empty(None) 为 true，这里一定有值
        let Some(value) = value else {
            return Ok(false);
        };

        match rule.kind() {
            RuleKind::Required => Ok(true),
            RuleKind::Format(format) => Ok(Self::check_format(value, *format)),
            RuleKind::Range { min, max } => {
                Ok(Self::as_f64(value).is_some_and(|n| n >= *min && n <= *max))
            }
            RuleKind::Min(min) => Ok(Self::as_f64(value).is_some_and(|n| n >= *min)),
            RuleKind::Max(max) => Ok(Self::as_f64(value).is_some_and(|n| n <= *max)),
            RuleKind::Length { min, max } => Ok(Self::length(value).is_some_and(|len| {
                min.map_or(true, |min| len >= min) && max.map_or(true, |max| len <= max)
            })),
            RuleKind::Regex(regex) => Ok(Self::as_text(value).is_some_and(|s| regex.is_match(&s))),
            RuleKind::Unique { column, except } => {
                Self::unique(value, column.as_deref(), except.as_deref(), ctx)
            }
            RuleKind::Same(other) => Ok(ctx
                .attributes
                .get(other)
                .is_some_and(|other| Self::loose_eq(value, other))),
            RuleKind::Different(other) => Ok(!ctx
                .attributes
                .get(other)
                .is_some_and(|other| Self::loose_eq(value, other))),
            RuleKind::Confirmed => {
                let confirmation = format!("{}{}", ctx.field, ctx.confirmation_suffix);
                Ok(ctx
                    .attributes
                    .get(&confirmation)
                    .is_some_and(|other| Self::loose_eq(value, other)))
            }
            RuleKind::In(values) => {
                Ok(Self::as_text(value).is_some_and(|s| values.iter().any(|v| *v == s)))
            }
            RuleKind::NotIn(values) => {
                Ok(Self::as_text(value).is_some_and(|s| values.iter().all(|v| *v != s)))
            }
            RuleKind::Before(date) => Ok(value
                .as_str()
                .and_then(parse_datetime)
                .is_some_and(|t| t < *date)),
            RuleKind::After(date) => Ok(value
                .as_str()
                .and_then(parse_datetime)
                .is_some_and(|t| t > *date)),
            RuleKind::Custom => Err(ValidationError::UnknownRule {
                field: ctx.field.to_string(),
                name: rule.name().to_string(),
            }),
        }
    }

    /// 判断值是否为空（空白字符串也视为空）
    pub fn is_empty(value: Option<&Value>) -> bool {
        match value {
            None => true,
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(arr)) => arr.is_empty(),
            Some(Value::Object(obj)) => obj.is_empty(),
            _ => false,
        }
    }

    /// 通过唯一性查询协作方判断值未被占用
    fn unique(
        value: &Value,
        column: Option<&str>,
        except: Option<&str>,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool> {
        let lookup = ctx.lookup.ok_or_else(|| ValidationError::LookupUnavailable {
            field: ctx.field.to_string(),
        })?;

        let column = column.unwrap_or(ctx.field);
        let exists = lookup
            .exists(column, value, except)
            .map_err(|source| ValidationError::Collaborator {
                collaborator: "uniqueness_lookup".to_string(),
                source,
            })?;

        Ok(!exists)
    }

    fn check_format(value: &Value, format: Format) -> bool {
        match format {
            Format::Email => value.as_str().is_some_and(|s| s.validate_email()),
            Format::Url => value.as_str().is_some_and(|s| s.validate_url()),
            Format::Ip => value.as_str().is_some_and(|s| s.validate_ip()),
            Format::Ipv4 => value.as_str().is_some_and(|s| s.validate_ipv4()),
            Format::Ipv6 => value.as_str().is_some_and(|s| s.validate_ipv6()),
            Format::Numeric => !value.is_boolean() && Self::as_f64(value).is_some(),
            Format::Integer => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            Format::Boolean => match value {
                Value::Bool(_) => true,
                Value::Number(n) => n.as_i64().is_some_and(|n| n == 0 || n == 1),
                Value::String(s) => matches!(s.as_str(), "true" | "false" | "0" | "1"),
                _ => false,
            },
            Format::String => value.is_string(),
            Format::Array => value.is_array(),
            Format::Alpha => value
                .as_str()
                .is_some_and(|s| s.chars().all(char::is_alphabetic)),
            Format::AlphaNum => value
                .as_str()
                .is_some_and(|s| s.chars().all(char::is_alphanumeric)),
            Format::AlphaDash => value.as_str().is_some_and(|s| {
                s.chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
            }),
            Format::Date => value.as_str().and_then(parse_datetime).is_some(),
            Format::Uuid => value
                .as_str()
                .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            Format::Json => value
                .as_str()
                .is_some_and(|s| serde_json::from_str::<Value>(s).is_ok()),
        }
    }

    /// 宽松相等：两边都是整数时精确比较，否则转为浮点数比较（如 100 == 100.0 == "100"）
    fn loose_eq(a: &Value, b: &Value) -> bool {
        if let (Some(x), Some(y)) = (Self::as_integer(a), Self::as_integer(b)) {
            return x == y;
        }
        if let (Some(x), Some(y)) = (Self::as_f64(a), Self::as_f64(b)) {
            return (x - y).abs() < f64::EPSILON;
        }
        a == b
    }

    /// 整数值（含整数字符串），覆盖 i64 与 u64 的全部取值
    fn as_integer(value: &Value) -> Option<i128> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from)),
            Value::String(s) => s.trim().parse::<i128>().ok(),
            _ => None,
        }
    }

    /// 字符串字符数或数组长度
    fn length(value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(arr) => Some(arr.len()),
            _ => None,
        }
    }

    /// 标量值的文本形式
    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 尝试将 Value 转换为 f64
    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
            _ => None,
        }
    }
}

/// 解析日期时间（RFC 3339 或纯日期）
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
