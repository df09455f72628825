use async_trait::async_trait;
use domain::{ChatId, Message};
use thiserror::Error;

/// 广播事件载荷，会话 ID 即投递主题。
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageBroadcast {
    pub chat_id: ChatId,
    pub message: Message,
}

impl MessageBroadcast {
    pub fn new(chat_id: ChatId, message: Message) -> Self {
        Self { chat_id, message }
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 消息广播端口。投递是尽力而为的，失败不影响消息持久化。
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    async fn publish(&self, payload: MessageBroadcast) -> Result<(), BroadcastError>;
}
