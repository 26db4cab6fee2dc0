//! 谓词扩展点
//!
//! 内置规则由 [`crate::evaluator::PredicateEvaluator`] 求值；其他规则名在引擎的注册表中
//! 查找实现了 [`Predicate`] 的自定义谓词。

use serde_json::Value;

use crate::error::CollaboratorError;
use crate::lookup::UniquenessLookup;
use crate::models::AttributeSet;

/// 谓词求值上下文
#[derive(Clone, Copy)]
pub struct PredicateContext<'a> {
    /// 当前字段名
    pub field: &'a str,
    /// 完整的候选属性集（跨字段规则使用）
    pub attributes: &'a AttributeSet,
    pub lookup: Option<&'a dyn UniquenessLookup>,
    pub confirmation_suffix: &'a str,
}

/// 自定义谓词
pub trait Predicate: Send + Sync {
    /// 判断值是否满足谓词
    fn check(
        &self,
        value: Option<&Value>,
        params: &[String],
        ctx: &PredicateContext<'_>,
    ) -> Result<bool, CollaboratorError>;

    /// 自定义消息；返回 None 时交给消息解析器处理
    fn message(&self, _field: &str, _params: &[String]) -> Option<String> {
        None
    }

    /// 为 true 时缺失/空值也会执行检查
    fn implicit(&self) -> bool {
        false
    }
}
