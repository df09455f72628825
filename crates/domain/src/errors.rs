//! 领域错误定义
//!
//! 业务规则错误与存储层错误分开建模，调用方据此决定返回码和重试策略。

use thiserror::Error;

/// 业务规则错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 入参验证失败
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 买家和卖家是同一个用户
    #[error("buyer and seller must be different users")]
    SelfTrade,

    /// 同一买家和商品的会话已存在
    #[error("chat already exists for this buyer and product")]
    ChatAlreadyExists,

    /// 会话不存在
    #[error("chat not found")]
    ChatNotFound,

    /// 用户不存在
    #[error("user not found")]
    UserNotFound,

    /// 商品不存在或不属于该卖家
    #[error("listing not found")]
    ListingNotFound,

    /// 操作者不是会话参与方
    #[error("user is not a participant of this chat")]
    NotAParticipant,

    /// 声明的发送方角色与实际身份不符
    #[error("sender role does not match the acting user")]
    RoleMismatch,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误。`Unavailable` 表示暂时性故障，可以重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    Conflict,

    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;
