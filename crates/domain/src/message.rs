use std::fmt;

use crate::errors::DomainError;
use crate::value_objects::{MessageContent, MessageId, Timestamp};

/// 新会话创建时自动写入的系统欢迎语。
pub const WELCOME_MESSAGE: &str =
    "Welcome to the marketplace chat! Please be careful about what personal information you share.";

/// 消息发送方。`System` 仅用于系统欢迎消息，不接受外部声明。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    Buyer,
    Seller,
    System,
}

impl MessageSender {
    /// 解析调用方声明的发送角色。
    pub fn parse_role(value: &str) -> Result<Self, DomainError> {
        match value.trim() {
            "" => Err(DomainError::invalid_argument(
                "sender_role",
                "cannot be empty",
            )),
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "system" => Err(DomainError::invalid_argument(
                "sender_role",
                "reserved for system messages",
            )),
            other => Err(DomainError::invalid_argument(
                "sender_role",
                format!("unknown role '{other}'"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存储层反序列化使用的全量映射，与 `parse_role` 不同，接受 `system`。
impl std::str::FromStr for MessageSender {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "system" => Ok(Self::System),
            other => Err(DomainError::invalid_argument(
                "sender",
                format!("unknown sender '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: MessageContent,
    pub sender: MessageSender,
    pub sent_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        content: MessageContent,
        sender: MessageSender,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id,
            content,
            sender,
            sent_at,
        }
    }

    /// 构造系统欢迎消息。
    pub fn welcome(id: MessageId, sent_at: Timestamp) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            content: MessageContent::new(WELCOME_MESSAGE)?,
            sender: MessageSender::System,
            sent_at,
        })
    }
}
