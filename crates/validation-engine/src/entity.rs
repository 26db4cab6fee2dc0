//! 实体保存闸门
//!
//! 实体通过 [`Validatable`] 声明自己的规则定义、属性与标识，引擎据此判断生命周期阶段、
//! 解析规则并在持久化前校验。持久化本身由调用方传入的闭包完成。

use thiserror::Error;
use tracing::{debug, instrument};

use crate::engine::ValidationEngine;
use crate::error::{Result, ValidationError};
use crate::models::{AttributeSet, LifecyclePhase, RuleBook, ValidationVerdict};
use crate::resolver::RuleSpec;

/// 可校验实体
pub trait Validatable {
    /// 实体的规则定义（基础规则、创建/更新覆盖层、自定义消息）
    fn rule_book(&self) -> &RuleBook;

    fn attributes(&self) -> &AttributeSet;

    /// 已持久化记录的标识，新建实体返回 None
    fn identifier(&self) -> Option<String>;

    /// 有标识即为更新，否则为创建
    fn phase(&self) -> LifecyclePhase {
        if self.identifier().is_some() {
            LifecyclePhase::Updating
        } else {
            LifecyclePhase::Creating
        }
    }
}

/// 校验未通过的实体与错误
///
/// 调用方可以取回实体修正后重试。
#[derive(Debug, Error)]
#[error("实体保存被拒绝: {error}")]
pub struct Rejected<E> {
    pub entity: E,
    #[source]
    pub error: ValidationError,
}

impl<E> Rejected<E> {
    /// 校验未通过时的结论，协作方错误时为 None
    pub fn verdict(&self) -> Option<&ValidationVerdict> {
        self.error.verdict()
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    pub fn into_parts(self) -> (E, ValidationError) {
        (self.entity, self.error)
    }
}

impl ValidationEngine {
    /// 按实体所处阶段解析规则
    pub fn resolve_entity<E: Validatable>(&self, entity: &E) -> Result<RuleSpec> {
        let identifier = entity.identifier();
        self.resolve(entity.rule_book(), entity.phase(), identifier.as_deref())
    }

    /// 校验实体
    #[instrument(skip_all, fields(entity = std::any::type_name::<E>(), phase = %entity.phase()))]
    pub fn validate_entity<E: Validatable>(&self, entity: &E) -> Result<ValidationVerdict> {
        let spec = self.resolve_entity(entity)?;
        self.validate(entity.attributes(), &spec)
    }

    /// 校验通过后持久化
    ///
    /// `persist` 收到的属性集在开启 `purge_confirmations` 时已剔除确认字段。
    #[instrument(skip_all, fields(entity = std::any::type_name::<E>(), phase = %entity.phase()))]
    pub fn save<E, T, F>(&self, entity: &E, persist: F) -> Result<T>
    where
        E: Validatable,
        F: FnOnce(AttributeSet) -> T,
    {
        let spec = self.resolve_entity(entity)?;
        self.validate_and_run(entity.attributes(), &spec, || {
            persist(self.persistable(entity.attributes()))
        })
    }

    /// 强制保存：无论校验结果如何都持久化，并返回真实结论
    #[instrument(skip_all, fields(entity = std::any::type_name::<E>(), phase = %entity.phase()))]
    pub fn force_save<E, T, F>(&self, entity: &E, persist: F) -> Result<(T, ValidationVerdict)>
    where
        E: Validatable,
        F: FnOnce(AttributeSet) -> T,
    {
        let spec = self.resolve_entity(entity)?;
        self.force_run(entity.attributes(), &spec, || {
            persist(self.persistable(entity.attributes()))
        })
    }

    /// 保存实体，失败时连同实体一起返回
    pub fn save_or_reject<E, T, F>(
        &self,
        entity: E,
        persist: F,
    ) -> std::result::Result<T, Rejected<E>>
    where
        E: Validatable,
        F: FnOnce(AttributeSet) -> T,
    {
        match self.save(&entity, persist) {
            Ok(value) => Ok(value),
            Err(error) => Err(Rejected { entity, error }),
        }
    }

    fn persistable(&self, attributes: &AttributeSet) -> AttributeSet {
        if !self.purge_confirmations() {
            return attributes.clone();
        }

        let purged = attributes.without_suffix(self.confirmation_suffix());
        debug!(
            removed = attributes.len() - purged.len(),
            "持久化前剔除确认字段"
        );
        purged
    }
}
