//! 规则类型定义

use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// 格式检查种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Email,
    Url,
    Ip,
    Ipv4,
    Ipv6,
    Numeric,
    Integer,
    Boolean,
    String,
    Array,
    Alpha,
    AlphaNum,
    AlphaDash,
    Date,
    Uuid,
    Json,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "url",
            Self::Ip => "ip",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Array => "array",
            Self::Alpha => "alpha",
            Self::AlphaNum => "alpha_num",
            Self::AlphaDash => "alpha_dash",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Json => "json",
        }
    }
}

impl FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s {
            "email" => Self::Email,
            "url" => Self::Url,
            "ip" => Self::Ip,
            "ipv4" => Self::Ipv4,
            "ipv6" => Self::Ipv6,
            "numeric" => Self::Numeric,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "array" => Self::Array,
            "alpha" => Self::Alpha,
            "alpha_num" => Self::AlphaNum,
            "alpha_dash" => Self::AlphaDash,
            "date" => Self::Date,
            "uuid" => Self::Uuid,
            "json" => Self::Json,
            _ => return Err(()),
        };
        Ok(format)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规则种类
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// 非空
    Required,
    /// 类型/格式检查
    Format(Format),
    /// 闭区间数值范围
    Range { min: f64, max: f64 },
    Min(f64),
    Max(f64),
    /// 字符串字符数或数组长度边界
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Regex(Regex),
    /// 唯一性检查，`column` 为空时使用字段名
    Unique {
        column: Option<String>,
        except: Option<String>,
    },
    Same(String),
    Different(String),
    /// 与 `<field><suffix>` 字段相等
    Confirmed,
    In(Vec<String>),
    NotIn(Vec<String>),
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
    /// 由引擎注册表提供的自定义谓词
    Custom,
}

impl RuleKind {
    /// 是否对缺失/空值也执行
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Required)
    }
}

/// 解析后的单条规则
#[derive(Debug, Clone)]
pub struct Rule {
    literal: String,
    name: String,
    params: Vec<String>,
    kind: RuleKind,
}

impl Rule {
    pub(crate) fn new(
        literal: impl Into<String>,
        name: impl Into<String>,
        params: Vec<String>,
        kind: RuleKind,
    ) -> Self {
        Self {
            literal: literal.into(),
            name: name.into(),
            params,
            kind,
        }
    }

    /// 规则字面量（占位符已替换）
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// 规则名（`format:email` 的 `format`，简写 `email` 的 `email`）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// 唯一性规则的排除标识
    pub fn excluded_identifier(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Unique { except, .. } => except.as_deref(),
            _ => None,
        }
    }

    /// 为没有排除参数的唯一性规则绑定记录标识，标识不经过字面量解析
    pub(crate) fn exclude_identifier(self, field: &str, identifier: &str) -> Self {
        match self.kind {
            RuleKind::Unique {
                column,
                except: None,
            } => {
                let column = column.unwrap_or_else(|| field.to_string());
                Self {
                    literal: format!("{}:{},{}", self.name, column, identifier),
                    name: self.name,
                    params: vec![column.clone(), identifier.to_string()],
                    kind: RuleKind::Unique {
                        column: Some(column),
                        except: Some(identifier.to_string()),
                    },
                }
            }
            kind => Self { kind, ..self },
        }
    }

    /// 消息模板可用的变量
    pub fn message_variables(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![("params", self.params.join(", "))];

        match &self.kind {
            RuleKind::Range { min, max } => {
                vars.push(("min", format_number(*min)));
                vars.push(("max", format_number(*max)));
            }
            RuleKind::Min(min) => vars.push(("min", format_number(*min))),
            RuleKind::Max(max) => vars.push(("max", format_number(*max))),
            RuleKind::Length { min, max } => {
                if let Some(min) = min {
                    vars.push(("min", min.to_string()));
                }
                if let Some(max) = max {
                    vars.push(("max", max.to_string()));
                }
                if min.is_some() && min == max {
                    vars.push(("size", min.unwrap_or_default().to_string()));
                }
            }
            RuleKind::Format(format) => vars.push(("format", format.to_string())),
            RuleKind::Regex(regex) => vars.push(("pattern", regex.as_str().to_string())),
            RuleKind::Same(other) | RuleKind::Different(other) => {
                vars.push(("other", other.clone()))
            }
            RuleKind::In(values) | RuleKind::NotIn(values) => {
                vars.push(("values", values.join(", ")))
            }
            RuleKind::Before(date) | RuleKind::After(date) => {
                vars.push(("date", date.to_rfc3339()))
            }
            _ => {}
        }

        vars
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

/// 整数值不带小数点输出
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip_names() {
        for name in ["email", "url", "alpha_num", "uuid", "json"] {
            let format: Format = name.parse().unwrap();
            assert_eq!(format.as_str(), name);
        }
        assert!("nope".parse::<Format>().is_err());
    }

    #[test]
    fn test_message_variables() {
        let rule = Rule::new(
            "range:0-150",
            "range",
            vec!["0".to_string(), "150".to_string()],
            RuleKind::Range {
                min: 0.0,
                max: 150.0,
            },
        );
        let vars = rule.message_variables();
        assert!(vars.contains(&("min", "0".to_string())));
        assert!(vars.contains(&("max", "150".to_string())));

        let exact = Rule::new(
            "length:6",
            "length",
            vec!["6".to_string()],
            RuleKind::Length {
                min: Some(6),
                max: Some(6),
            },
        );
        assert!(exact.message_variables().contains(&("size", "6".to_string())));
    }

    #[test]
    fn test_only_required_is_implicit() {
        assert!(RuleKind::Required.is_implicit());
        assert!(!RuleKind::Confirmed.is_implicit());
        assert!(!RuleKind::Format(Format::Email).is_implicit());
    }

    #[test]
    fn test_exclude_identifier() {
        let rule = Rule::new(
            "unique",
            "unique",
            Vec::new(),
            RuleKind::Unique {
                column: None,
                except: None,
            },
        );
        let rule = rule.exclude_identifier("email", "acme,inc");
        assert_eq!(rule.excluded_identifier(), Some("acme,inc"));
        assert_eq!(rule.literal(), "unique:email,acme,inc");

        let other = Rule::new("required", "required", Vec::new(), RuleKind::Required);
        assert_eq!(other.exclude_identifier("email", "1").literal(), "required");
    }
}
