//! 校验引擎
//!
//! 按 [`RuleSpec`] 对属性集逐字段执行规则，每个字段遇到第一条未通过的规则即停止，
//! 其余字段继续执行。引擎只持有不可变协作方的 `Arc`，可以在线程间共享。

use fervent_shared::observability::metrics;
use fervent_shared::{MessageMode, ValidationConfig};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ValidationError};
use crate::evaluator::PredicateEvaluator;
use crate::lookup::UniquenessLookup;
use crate::messages::{MessageResolver, RawMessages, TemplateMessages, render_template};
use crate::models::{AttributeSet, LifecyclePhase, RuleBook, ValidationVerdict};
use crate::predicate::{Predicate, PredicateContext};
use crate::resolver::{RuleResolver, RuleSpec};
use crate::rules::{Rule, RuleKind};

/// 校验引擎
pub struct ValidationEngine {
    lookup: Option<Arc<dyn UniquenessLookup>>,
    messages: Arc<dyn MessageResolver>,
    /// 自定义谓词注册表
    predicates: HashMap<String, Arc<dyn Predicate>>,
    resolver: RuleResolver,
    confirmation_suffix: String,
    purge_confirmations: bool,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine")
            .field("has_lookup", &self.lookup.is_some())
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .field("resolver", &self.resolver)
            .field("confirmation_suffix", &self.confirmation_suffix)
            .field("purge_confirmations", &self.purge_confirmations)
            .finish()
    }
}

impl ValidationEngine {
    /// 使用默认配置创建引擎（规则字面量作为消息，无唯一性查询）
    pub fn new() -> Self {
        Self::from_config(&ValidationConfig::default())
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        let messages: Arc<dyn MessageResolver> = match config.message_mode {
            MessageMode::Raw => Arc::new(RawMessages),
            MessageMode::Template => Arc::new(TemplateMessages::with_defaults()),
        };

        Self {
            lookup: None,
            messages,
            predicates: HashMap::new(),
            resolver: RuleResolver::from_config(config),
            confirmation_suffix: config.confirmation_suffix.clone(),
            purge_confirmations: config.purge_confirmations,
        }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn UniquenessLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_messages(mut self, messages: Arc<dyn MessageResolver>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_resolver(mut self, resolver: RuleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// 注册自定义谓词，同名谓词会被覆盖
    pub fn register_predicate(
        mut self,
        name: impl Into<String>,
        predicate: Arc<dyn Predicate>,
    ) -> Self {
        let name = name.into();
        debug!(predicate = %name, "注册自定义谓词");
        self.predicates.insert(name, predicate);
        self
    }

    pub fn resolver(&self) -> &RuleResolver {
        &self.resolver
    }

    pub fn confirmation_suffix(&self) -> &str {
        &self.confirmation_suffix
    }

    pub(crate) fn purge_confirmations(&self) -> bool {
        self.purge_confirmations
    }

    /// 使用引擎的解析器按阶段解析规则定义
    pub fn resolve(
        &self,
        book: &RuleBook,
        phase: LifecyclePhase,
        self_identifier: Option<&str>,
    ) -> Result<RuleSpec> {
        self.resolver.resolve_book(book, phase, self_identifier)
    }

    /// 执行校验
    ///
    /// 规则未通过不是错误，结果记录在 [`ValidationVerdict`] 中。
    /// 只有协作方失败或使用了未注册的自定义规则时返回 `Err`。
    #[instrument(
        name = "validation",
        skip_all,
        fields(phase = %spec.phase(), field_count = spec.len(), rule_count = spec.rule_count())
    )]
    pub fn validate(
        &self,
        attributes: &AttributeSet,
        spec: &RuleSpec,
    ) -> Result<ValidationVerdict> {
        let start = Instant::now();
        debug!(stage = "executing", "开始执行校验");

        let mut errors: IndexMap<String, Vec<String>> = IndexMap::new();

        for (field, rules) in spec.fields() {
            let ctx = PredicateContext {
                field,
                attributes,
                lookup: self.lookup.as_deref(),
                confirmation_suffix: &self.confirmation_suffix,
            };
            let value = attributes.get(field);

            for rule in rules {
                if self.passes(rule, value, &ctx)? {
                    continue;
                }

                let message = self.message_for(spec, field, rule);
                debug!(field = field, rule = %rule, message = %message, "字段校验未通过");
                errors.insert(field.to_string(), vec![message]);
                // 每个字段只报告第一条未通过的规则
                break;
            }
        }

        let verdict = ValidationVerdict::from_errors(errors);
        let elapsed = start.elapsed();
        metrics::record_validation(
            verdict.is_valid(),
            verdict.errors().len(),
            elapsed.as_secs_f64(),
        );

        if verdict.is_valid() {
            info!(
                stage = "passed",
                duration_us = elapsed.as_micros() as u64,
                "校验通过"
            );
        } else {
            warn!(
                stage = "failed",
                failed_fields = verdict.errors().len(),
                verdict = %verdict,
                duration_us = elapsed.as_micros() as u64,
                "校验未通过"
            );
        }

        Ok(verdict)
    }

    /// 校验未通过时返回 [`ValidationError::Failed`]
    pub fn ensure_valid(&self, attributes: &AttributeSet, spec: &RuleSpec) -> Result<()> {
        let verdict = self.validate(attributes, spec)?;
        if verdict.is_valid() {
            Ok(())
        } else {
            Err(ValidationError::Failed(verdict))
        }
    }

    /// 校验通过后执行副作用
    ///
    /// 未通过时副作用不会被调用，返回携带结论的 [`ValidationError::Failed`]；
    /// 通过时副作用恰好执行一次，返回其结果。
    pub fn validate_and_run<T, F>(
        &self,
        attributes: &AttributeSet,
        spec: &RuleSpec,
        side_effect: F,
    ) -> Result<T>
    where
        F: FnOnce() -> T,
    {
        let verdict = self.validate(attributes, spec)?;

        if !verdict.is_valid() {
            metrics::record_gate("blocked");
            info!(phase = %spec.phase(), "校验未通过，已阻止副作用执行");
            return Err(ValidationError::Failed(verdict));
        }

        metrics::record_gate("ran");
        Ok(side_effect())
    }

    /// 强制模式：无论校验结果如何都执行副作用，并返回真实结论
    ///
    /// 协作方失败时没有结论可言，副作用不执行，错误原样返回。
    pub fn force_run<T, F>(
        &self,
        attributes: &AttributeSet,
        spec: &RuleSpec,
        side_effect: F,
    ) -> Result<(T, ValidationVerdict)>
    where
        F: FnOnce() -> T,
    {
        let verdict = self.validate(attributes, spec)?;

        if !verdict.is_valid() {
            warn!(
                phase = %spec.phase(),
                failed_fields = verdict.errors().len(),
                "强制模式：校验未通过，仍执行副作用"
            );
        }

        metrics::record_gate("forced");
        Ok((side_effect(), verdict))
    }

    fn passes(
        &self,
        rule: &Rule,
        value: Option<&Value>,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool> {
        if !matches!(rule.kind(), RuleKind::Custom) {
            return PredicateEvaluator::evaluate(rule, value, ctx);
        }

        let predicate =
            self.predicates
                .get(rule.name())
                .ok_or_else(|| ValidationError::UnknownRule {
                    field: ctx.field.to_string(),
                    name: rule.name().to_string(),
                })?;

        if PredicateEvaluator::is_empty(value) && !predicate.implicit() {
            return Ok(true);
        }

        predicate
            .check(value, rule.params(), ctx)
            .map_err(|source| ValidationError::Collaborator {
                collaborator: format!("predicate:{}", rule.name()),
                source,
            })
    }

    /// 消息优先级：规则定义中的自定义消息 > 自定义谓词消息 > 消息解析器
    fn message_for(&self, spec: &RuleSpec, field: &str, rule: &Rule) -> String {
        if let Some(template) = spec.custom_message(field, rule.name()) {
            let mut variables = rule.message_variables();
            variables.push(("attribute", self.messages.attribute(field)));
            return render_template(template, &variables);
        }

        if matches!(rule.kind(), RuleKind::Custom) {
            if let Some(message) = self
                .predicates
                .get(rule.name())
                .and_then(|predicate| predicate.message(field, rule.params()))
            {
                return message;
            }
        }

        self.messages.resolve(field, rule)
    }
}
