//! 校验消息
//!
//! 消息/本地化协作方的接口与两种内置实现：
//! - [`RawMessages`]：直接返回规则字面量，如 `required`、`range:0-150`
//! - [`TemplateMessages`]：按规则名渲染 `{{variable}}` 模板
//!
//! ## 使用示例
//!
//! ```ignore
//! let messages = TemplateMessages::with_defaults()
//!     .with_attribute_name("email", "邮箱")
//!     .with_custom("email.required", "请填写{{attribute}}");
//! ```

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

use crate::rules::{Rule, RuleKind};

/// 匹配 {{variable_name}} 格式，变量名支持字母、数字、下划线
static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("variable pattern is valid"));

/// 消息解析器
#[cfg_attr(test, mockall::automock)]
pub trait MessageResolver: Send + Sync {
    /// 为未通过的规则生成消息
    fn resolve(&self, field: &str, rule: &Rule) -> String;

    /// 字段的展示名
    fn attribute(&self, field: &str) -> String {
        field.to_string()
    }
}

/// 渲染模板
///
/// 将模板中的 `{{variable}}` 替换为变量表中的值，未找到的变量保留原样并记录警告日志。
pub fn render_template(template: &str, variables: &[(&str, String)]) -> String {
    VARIABLE_REGEX
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match variables.iter().find(|(key, _)| *key == name) {
                Some((_, value)) => value.clone(),
                None => {
                    warn!(variable = name, template = template, "消息模板变量未找到，保留原样");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// 规则字面量即消息
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMessages;

impl MessageResolver for RawMessages {
    fn resolve(&self, _field: &str, rule: &Rule) -> String {
        rule.literal().to_string()
    }
}

/// 模板消息
#[derive(Debug, Clone, Default)]
pub struct TemplateMessages {
    /// 按规则名索引的模板
    templates: HashMap<String, String>,
    /// `field.rule` 或 `rule` 形式的覆盖模板
    custom: HashMap<String, String>,
    /// 字段展示名
    attribute_names: HashMap<String, String>,
}

impl TemplateMessages {
    /// 创建空的模板集合（找不到模板时回退到规则字面量）
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有默认模板的消息解析器
    pub fn with_defaults() -> Self {
        let mut messages = Self::new();
        messages.register_default_templates();
        messages
    }

    fn register_default_templates(&mut self) {
        let defaults = [
            ("required", "{{attribute}} 不能为空"),
            ("format", "{{attribute}} 格式不正确，应为 {{format}}"),
            ("range", "{{attribute}} 必须在 {{min}} 到 {{max}} 之间"),
            ("between", "{{attribute}} 必须在 {{min}} 到 {{max}} 之间"),
            ("min", "{{attribute}} 不能小于 {{min}}"),
            ("max", "{{attribute}} 不能大于 {{max}}"),
            ("length", "{{attribute}} 长度必须在 {{min}} 到 {{max}} 之间"),
            ("min_length", "{{attribute}} 长度不能少于 {{min}}"),
            ("max_length", "{{attribute}} 长度不能超过 {{max}}"),
            ("regex", "{{attribute}} 格式不正确"),
            ("unique", "{{attribute}} 已被占用"),
            ("same", "{{attribute}} 必须与 {{other}} 一致"),
            ("different", "{{attribute}} 不能与 {{other}} 相同"),
            ("confirmed", "{{attribute}} 两次输入不一致"),
            ("in", "{{attribute}} 必须是以下之一: {{values}}"),
            ("not_in", "{{attribute}} 不能是: {{values}}"),
            ("before", "{{attribute}} 必须早于 {{date}}"),
            ("after", "{{attribute}} 必须晚于 {{date}}"),
        ];

        for (rule, template) in defaults {
            self.register_template(rule, template);
        }
    }

    /// 注册规则模板
    pub fn register_template(&mut self, rule: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(rule.into(), template.into());
    }

    /// 覆盖模板，键为 `field.rule` 或 `rule`
    pub fn with_custom(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.custom.insert(key.into(), template.into());
        self
    }

    pub fn with_attribute_name(
        mut self,
        field: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        self.attribute_names.insert(field.into(), display.into());
        self
    }

    /// 查找模板：字段覆盖 > 规则覆盖 > 规则模板 > 格式通用模板
    fn template_for(&self, field: &str, rule: &Rule) -> Option<&str> {
        let name = rule.name();
        self.custom
            .get(&format!("{}.{}", field, name))
            .or_else(|| self.custom.get(name))
            .or_else(|| self.templates.get(name))
            .or_else(|| match rule.kind() {
                RuleKind::Format(_) => self.templates.get("format"),
                _ => None,
            })
            .map(String::as_str)
    }
}

impl MessageResolver for TemplateMessages {
    fn resolve(&self, field: &str, rule: &Rule) -> String {
        let Some(template) = self.template_for(field, rule) else {
            return rule.literal().to_string();
        };

        let mut variables = rule.message_variables();
        variables.push(("attribute", self.attribute(field)));
        render_template(template, &variables)
    }

    fn attribute(&self, field: &str) -> String {
        self.attribute_names
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }
}
