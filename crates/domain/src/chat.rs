use crate::errors::DomainError;
use crate::message::{Message, MessageSender};
use crate::value_objects::{ChatId, MessageId, ProductId, Timestamp, UserId};

/// 买家和卖家围绕一个商品的会话。每个 (买家, 商品) 组合最多存在一个会话。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub product_id: ProductId,
    pub messages: Vec<Message>,
    pub message_count: u64,
    pub created_at: Timestamp,
    pub last_message_at: Timestamp,
}

impl Chat {
    /// 创建新会话并写入系统欢迎消息。欢迎消息与会话本身一起出现，
    /// 不存在没有消息的会话。
    pub fn open(
        id: ChatId,
        buyer_id: UserId,
        seller_id: UserId,
        product_id: ProductId,
        welcome_id: MessageId,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if buyer_id == seller_id {
            return Err(DomainError::SelfTrade);
        }
        let welcome = Message::welcome(welcome_id, created_at)?;
        Ok(Self {
            id,
            buyer_id,
            seller_id,
            product_id,
            messages: vec![welcome],
            message_count: 1,
            created_at,
            last_message_at: created_at,
        })
    }

    /// 追加一条消息。计数器和最后活跃时间在同一步维护，
    /// 时间戳早于当前最后消息时会被抬升，保证单调不减。
    pub fn append(&mut self, mut message: Message) {
        if message.sent_at < self.last_message_at {
            message.sent_at = self.last_message_at;
        }
        self.last_message_at = message.sent_at;
        self.message_count += 1;
        self.messages.push(message);
    }

    pub fn is_party(&self, user: UserId) -> bool {
        self.buyer_id == user || self.seller_id == user
    }

    /// 返回用户在会话中的角色，非参与方返回 None。
    pub fn role_of(&self, user: UserId) -> Option<MessageSender> {
        if self.buyer_id == user {
            Some(MessageSender::Buyer)
        } else if self.seller_id == user {
            Some(MessageSender::Seller)
        } else {
            None
        }
    }
}
