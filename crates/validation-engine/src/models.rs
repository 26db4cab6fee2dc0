//! 校验引擎领域模型

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// 生命周期阶段，决定合并哪一个规则覆盖层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Creating,
    Updating,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Updating => write!(f, "updating"),
        }
    }
}

/// 候选属性集
///
/// 字段名到候选值的有序映射。调用方可修改，校验过程中对引擎只读。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet {
    values: IndexMap<String, Value>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象创建，保留文档中的字段顺序
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 从 `Value::Object` 创建；其他类型返回 None
    ///
    /// 注意 `serde_json::Map` 默认按键排序，需要保序时请使用 [`AttributeSet::from_json`]。
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }

    /// 链式设置字段
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.shift_remove(field)
    }

    /// 获取字段值
    ///
    /// 优先按完整字段名匹配，找不到时按点号路径逐级查找（如 "address.city" 或 "items.0.sku"）。
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }

        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;

        for part in parts {
            match current {
                Value::Object(map) => {
                    current = map.get(part)?;
                }
                Value::Array(arr) => {
                    let index: usize = part.parse().ok()?;
                    current = arr.get(index)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// 返回剔除了指定后缀字段的副本（用于持久化前去掉 `*_confirmation`）
    pub fn without_suffix(&self, suffix: &str) -> Self {
        self.values
            .iter()
            .filter(|(field, _)| !field.ends_with(suffix))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }
}

impl<K, V> FromIterator<(K, V)> for AttributeSet
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 声明式规则表：字段名到规则字面量列表
///
/// 反序列化时字段的规则既可以写成数组，也可以写成 `"required|format:email"` 形式。
/// 管道写法不适用于本身包含 `|` 的正则规则，此时请使用数组。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleMap {
    fields: IndexMap<String, Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleListRepr {
    Piped(String),
    List(Vec<String>),
}

impl RuleListRepr {
    fn into_literals(self) -> Vec<String> {
        match self {
            Self::Piped(s) => split_piped(&s),
            Self::List(list) => list,
        }
    }
}

fn split_piped(s: &str) -> Vec<String> {
    s.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

impl<'de> Deserialize<'de> for RuleMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, RuleListRepr>::deserialize(deserializer)?;
        Ok(Self {
            fields: raw
                .into_iter()
                .map(|(field, repr)| (field, repr.into_literals()))
                .collect(),
        })
    }
}

impl RuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 链式声明字段规则
    pub fn with<I, S>(mut self, field: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(field, rules.into_iter().map(Into::into).collect());
        self
    }

    /// 以管道分隔的字符串声明字段规则
    pub fn with_piped(mut self, field: impl Into<String>, rules: &str) -> Self {
        self.insert(field, split_piped(rules));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, rules: Vec<String>) -> Option<Vec<String>> {
        self.fields.insert(field.into(), rules)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 实体类型的规则定义
///
/// 基础规则 + 创建/更新覆盖层 + 自定义消息，每个实体类型定义一次。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleBook {
    pub rules: RuleMap,
    pub rules_for_create: RuleMap,
    pub rules_for_update: RuleMap,
    /// 键为 `field.rule` 或 `rule`，值为 `{{variable}}` 模板
    pub custom_messages: IndexMap<String, String>,
}

impl RuleBook {
    pub fn new(rules: RuleMap) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_create_rules(mut self, rules: RuleMap) -> Self {
        self.rules_for_create = rules;
        self
    }

    pub fn with_update_rules(mut self, rules: RuleMap) -> Self {
        self.rules_for_update = rules;
        self
    }

    pub fn with_message(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.custom_messages.insert(key.into(), template.into());
        self
    }

    /// 获取指定阶段的覆盖层
    pub fn overlay(&self, phase: LifecyclePhase) -> &RuleMap {
        match phase {
            LifecyclePhase::Creating => &self.rules_for_create,
            LifecyclePhase::Updating => &self.rules_for_update,
        }
    }
}

/// 校验结论
///
/// 只能由错误表构造，`valid` 恒等于错误表为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    valid: bool,
    errors: IndexMap<String, Vec<String>>,
}

impl ValidationVerdict {
    /// 通过的结论
    pub fn passed() -> Self {
        Self {
            valid: true,
            errors: IndexMap::new(),
        }
    }

    /// 由错误表构造结论，空消息列表会被丢弃
    pub fn from_errors(errors: IndexMap<String, Vec<String>>) -> Self {
        let errors: IndexMap<String, Vec<String>> = errors
            .into_iter()
            .filter(|(_, messages)| !messages.is_empty())
            .collect();

        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    /// 某字段的全部消息
    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 某字段的第一条消息
    pub fn first(&self, field: &str) -> Option<&str> {
        self.messages(field).first().map(String::as_str)
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// 未通过的字段，按声明顺序
    pub fn failed_fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// 所有消息，按字段声明顺序展开
    pub fn all_messages(&self) -> Vec<&str> {
        self.errors
            .values()
            .flat_map(|messages| messages.iter().map(String::as_str))
            .collect()
    }

    pub fn into_errors(self) -> IndexMap<String, Vec<String>> {
        self.errors
    }
}

impl Default for ValidationVerdict {
    fn default() -> Self {
        Self::passed()
    }
}

impl fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return write!(f, "valid");
        }

        let mut first = true;
        for (field, messages) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
            first = false;
        }
        Ok(())
    }
}
