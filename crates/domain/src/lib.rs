//! 市场聊天系统核心领域模型
//!
//! 包含会话、消息等核心实体，以及会话存储接口和相关业务规则。

pub mod chat;
pub mod errors;
pub mod message;
pub mod store;
pub mod value_objects;

// 重新导出常用类型
pub use chat::Chat;
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use message::{Message, MessageSender, WELCOME_MESSAGE};
pub use store::{ChatStore, RepositoryFuture, RepositoryResult};
pub use value_objects::{ChatId, MessageContent, MessageId, ProductId, Timestamp, UserId};
