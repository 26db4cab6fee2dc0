//! 校验引擎错误类型

use thiserror::Error;

use crate::models::ValidationVerdict;

/// 外部协作方（唯一性查询、自定义谓词）返回的错误，原样向上传递
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("校验未通过: {0}")]
    Failed(ValidationVerdict),

    #[error("外部协作方错误 ({collaborator}): {source}")]
    Collaborator {
        collaborator: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("无效的规则: 字段 {field} 的规则 '{literal}' {reason}")]
    InvalidRule {
        field: String,
        literal: String,
        reason: String,
    },

    #[error("未注册的规则: 字段 {field} 使用了 '{name}'")]
    UnknownRule { field: String, name: String },

    #[error("唯一性规则缺少查询协作方: 字段 {field}")]
    LookupUnavailable { field: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

impl ValidationError {
    pub(crate) fn invalid_rule(
        field: &str,
        literal: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRule {
            field: field.to_string(),
            literal: literal.to_string(),
            reason: reason.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Failed(_) => "VALIDATION_FAILED",
            Self::Collaborator { .. } => "COLLABORATOR_ERROR",
            Self::InvalidRule { .. } => "INVALID_RULE",
            Self::UnknownRule { .. } => "UNKNOWN_RULE",
            Self::LookupUnavailable { .. } => "LOOKUP_UNAVAILABLE",
        }
    }

    /// 校验未通过时返回结论
    pub fn verdict(&self) -> Option<&ValidationVerdict> {
        match self {
            Self::Failed(verdict) => Some(verdict),
            _ => None,
        }
    }

    pub fn into_verdict(self) -> Option<ValidationVerdict> {
        match self {
            Self::Failed(verdict) => Some(verdict),
            _ => None,
        }
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
