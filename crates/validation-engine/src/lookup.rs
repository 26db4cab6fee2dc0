//! 唯一性查询协作方
//!
//! 引擎不实现存储，唯一性规则通过调用方注入的查询接口判断值是否已被占用。
//! 超时与取消由实现方自行负责，引擎没有超时策略。

use serde_json::Value;

use crate::error::CollaboratorError;

/// 唯一性查询接口
pub trait UniquenessLookup: Send + Sync {
    /// 判断 `field` 上是否已存在 `value`，`excluding` 为需要排除的记录标识（通常是正在更新的记录本身）
    fn exists(
        &self,
        field: &str,
        value: &Value,
        excluding: Option<&str>,
    ) -> Result<bool, CollaboratorError>;
}
