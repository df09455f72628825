use std::collections::HashMap;

use application::{broadcaster::BroadcastError, MessageBroadcast, MessageBroadcaster};
use async_trait::async_trait;
use domain::ChatId;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// 进程内消息广播器，每个会话一个独立主题。
///
/// 事件只投递给该会话的订阅者，其他会话看不到。慢消费者由有界
/// 通道丢弃最旧事件，不会阻塞消息写入方。
pub struct LocalMessageBroadcaster {
    capacity: usize,
    topics: RwLock<HashMap<Uuid, broadcast::Sender<MessageBroadcast>>>,
}

impl LocalMessageBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// 订阅一个会话主题，主题不存在时按需创建。
    pub async fn subscribe(&self, chat_id: ChatId) -> broadcast::Receiver<MessageBroadcast> {
        let mut topics = self.topics.write().await;
        topics
            .entry(Uuid::from(chat_id))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

#[async_trait]
impl MessageBroadcaster for LocalMessageBroadcaster {
    async fn publish(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        let topics = self.topics.read().await;
        let sender = match topics.get(&Uuid::from(payload.chat_id)) {
            Some(sender) => sender,
            // 还没有任何订阅者的会话，投递即成功
            None => return Ok(()),
        };
        if sender.receiver_count() == 0 {
            return Ok(());
        }
        sender
            .send(payload)
            .map_err(|err| BroadcastError::failed(err.to_string()))?;
        Ok(())
    }
}
