//! 声明式校验引擎
//!
//! 提供按生命周期阶段执行的声明式属性校验，支持：
//! - 基础规则与创建/更新覆盖层合并
//! - 唯一性规则的自排除占位符替换
//! - 逐字段短路求值，每个字段至多一条消息
//! - 校验闸门（通过才执行副作用）与强制模式
//! - 自定义谓词、唯一性查询与消息模板扩展点

pub mod compiler;
pub mod engine;
pub mod entity;
pub mod error;
pub mod evaluator;
pub mod lookup;
pub mod messages;
pub mod models;
pub mod predicate;
pub mod resolver;
pub mod rules;

pub use compiler::RuleParser;
pub use engine::ValidationEngine;
pub use entity::{Rejected, Validatable};
pub use error::{CollaboratorError, Result, ValidationError};
pub use lookup::UniquenessLookup;
pub use messages::{MessageResolver, RawMessages, TemplateMessages, render_template};
pub use models::{AttributeSet, LifecyclePhase, RuleBook, RuleMap, ValidationVerdict};
pub use predicate::{Predicate, PredicateContext};
pub use resolver::{RuleResolver, RuleSpec, UnresolvedRuleReference, resolve};
pub use rules::{Format, Rule, RuleKind};
