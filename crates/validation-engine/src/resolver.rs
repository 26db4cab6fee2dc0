//! 规则解析器
//!
//! 按生命周期阶段合并基础规则与覆盖层，替换自排除占位符，输出可直接执行的 [`RuleSpec`]。
//! 解析完成后规则不再感知阶段。

use fervent_shared::ValidationConfig;
use fervent_shared::observability::metrics;
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::compiler::RuleParser;
use crate::error::Result;
use crate::models::{LifecyclePhase, RuleBook, RuleMap};
use crate::rules::Rule;

/// 默认自排除占位符
pub const DEFAULT_SELF_PLACEHOLDER: &str = "{id}";

/// 解析时无法落地而被丢弃的规则（非致命）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRuleReference {
    pub field: String,
    pub literal: String,
    pub reason: String,
}

/// 解析完成的规则集
///
/// 字段顺序与声明顺序一致，解析后只读。
#[derive(Debug, Clone)]
pub struct RuleSpec {
    phase: LifecyclePhase,
    fields: IndexMap<String, Vec<Rule>>,
    skipped: Vec<UnresolvedRuleReference>,
    custom_messages: IndexMap<String, String>,
}

impl RuleSpec {
    fn empty(phase: LifecyclePhase) -> Self {
        Self {
            phase,
            fields: IndexMap::new(),
            skipped: Vec::new(),
            custom_messages: IndexMap::new(),
        }
    }

    /// 解析时所处的阶段（仅用于日志）
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields
            .iter()
            .map(|(field, rules)| (field.as_str(), rules.as_slice()))
    }

    pub fn rules(&self, field: &str) -> Option<&[Rule]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// 解析阶段被丢弃的规则
    pub fn skipped(&self) -> &[UnresolvedRuleReference] {
        &self.skipped
    }

    /// 查找自定义消息：`field.rule` 优先于 `rule`
    pub fn custom_message(&self, field: &str, rule_name: &str) -> Option<&str> {
        self.custom_messages
            .get(&format!("{}.{}", field, rule_name))
            .or_else(|| self.custom_messages.get(rule_name))
            .map(String::as_str)
    }

    pub fn with_custom_messages(mut self, messages: IndexMap<String, String>) -> Self {
        self.custom_messages = messages;
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 规则总数
    pub fn rule_count(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }
}

/// 单条规则字面量的解析结果
enum Binding {
    Rule(Rule),
    /// 占位符无法替换，携带原因
    Unresolved(String),
}

/// 规则解析器
#[derive(Debug, Clone)]
pub struct RuleResolver {
    placeholder: String,
    auto_exclude_self: bool,
}

impl Default for RuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleResolver {
    pub fn new() -> Self {
        Self {
            placeholder: DEFAULT_SELF_PLACEHOLDER.to_string(),
            auto_exclude_self: false,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            placeholder: config.self_placeholder.clone(),
            auto_exclude_self: config.auto_exclude_self,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// 更新阶段自动为没有排除参数的 unique 规则追加当前记录标识
    pub fn with_auto_exclude_self(mut self, enabled: bool) -> Self {
        self.auto_exclude_self = enabled;
        self
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// 解析规则
    ///
    /// 覆盖层中出现的字段整体替换基础规则；仅出现在覆盖层中的字段追加在末尾。
    /// 两边都没有的字段不做校验。
    #[instrument(
        skip_all,
        fields(phase = %phase, base_fields = base.len(), self_id = ?self_identifier)
    )]
    pub fn resolve(
        &self,
        base: &RuleMap,
        overlay: Option<&RuleMap>,
        phase: LifecyclePhase,
        self_identifier: Option<&str>,
    ) -> Result<RuleSpec> {
        let mut merged: IndexMap<&str, &[String]> = base
            .iter()
            .map(|(field, rules)| (field.as_str(), rules.as_slice()))
            .collect();

        if let Some(overlay) = overlay {
            for (field, rules) in overlay.iter() {
                // 已存在的键保留原位置，值整体替换
                merged.insert(field.as_str(), rules.as_slice());
            }
        }

        let mut spec = RuleSpec::empty(phase);

        for (field, literals) in merged {
            let mut rules = Vec::with_capacity(literals.len());

            for literal in literals {
                match self.bind(field, literal, phase, self_identifier)? {
                    Binding::Rule(rule) => {
                        rules.push(self.exclude_self(field, rule, phase, self_identifier));
                    }
                    Binding::Unresolved(reason) => {
                        warn!(
                            field = field,
                            literal = %literal,
                            phase = %phase,
                            reason = %reason,
                            "规则引用无法解析，已跳过"
                        );
                        metrics::record_rule_skipped(field);
                        spec.skipped.push(UnresolvedRuleReference {
                            field: field.to_string(),
                            literal: literal.clone(),
                            reason,
                        });
                    }
                }
            }

            spec.fields.insert(field.to_string(), rules);
        }

        debug!(
            fields = spec.len(),
            rules = spec.rule_count(),
            skipped = spec.skipped.len(),
            "规则解析完成"
        );

        Ok(spec)
    }

    /// 按实体规则定义解析，并携带自定义消息
    pub fn resolve_book(
        &self,
        book: &RuleBook,
        phase: LifecyclePhase,
        self_identifier: Option<&str>,
    ) -> Result<RuleSpec> {
        let spec = self.resolve(&book.rules, Some(book.overlay(phase)), phase, self_identifier)?;
        Ok(spec.with_custom_messages(book.custom_messages.clone()))
    }

    /// 解析单条规则并绑定记录标识
    ///
    /// 标识在参数拆分之后才替换进去，不会被当作规则语法解析。
    fn bind(
        &self,
        field: &str,
        literal: &str,
        phase: LifecyclePhase,
        self_identifier: Option<&str>,
    ) -> Result<Binding> {
        if !literal.contains(self.placeholder.as_str()) {
            return RuleParser::parse(field, literal).map(Binding::Rule);
        }

        if let Some(id) = self_identifier {
            return RuleParser::parse_bound(field, literal, &self.placeholder, id)
                .map(Binding::Rule);
        }

        // 新建记录没有需要排除的自身，unique 规则去掉排除参数后照常执行
        if phase == LifecyclePhase::Creating {
            if let Some(stripped) = self.strip_unique_exclusion(literal) {
                return RuleParser::parse(field, &stripped).map(Binding::Rule);
            }
        }

        Ok(Binding::Unresolved(format!("占位符 {} 缺少记录标识", self.placeholder)))
    }

    /// `unique:COLUMN,{id}` -> `unique:COLUMN`
    fn strip_unique_exclusion(&self, literal: &str) -> Option<String> {
        let (name, rest) = literal.trim().split_once(':')?;
        if name.trim() != "unique" {
            return None;
        }

        let params: Vec<&str> = rest.split(',').map(str::trim).collect();
        match params.as_slice() {
            [column, except] if *except == self.placeholder => {
                if column.is_empty() {
                    Some("unique".to_string())
                } else {
                    Some(format!("unique:{}", column))
                }
            }
            _ => None,
        }
    }

    fn exclude_self(
        &self,
        field: &str,
        rule: Rule,
        phase: LifecyclePhase,
        self_identifier: Option<&str>,
    ) -> Rule {
        match self_identifier {
            Some(id) if self.auto_exclude_self && phase == LifecyclePhase::Updating => {
                rule.exclude_identifier(field, id)
            }
            _ => rule,
        }
    }
}

/// 使用默认解析器解析规则
pub fn resolve(
    base: &RuleMap,
    overlay: Option<&RuleMap>,
    phase: LifecyclePhase,
    self_identifier: Option<&str>,
) -> Result<RuleSpec> {
    RuleResolver::new().resolve(base, overlay, phase, self_identifier)
}

impl RuleBook {
    /// 使用默认解析器按阶段解析
    pub fn resolve(
        &self,
        phase: LifecyclePhase,
        self_identifier: Option<&str>,
    ) -> Result<RuleSpec> {
        RuleResolver::new().resolve_book(self, phase, self_identifier)
    }
}
