use domain::{Chat, Message, MessageSender, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::{Listing, UserAccount};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub content: String,
    pub sender: MessageSender,
    pub sent_at: Timestamp,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: Uuid::from(message.id),
            content: message.content.as_str().to_owned(),
            sender: message.sender,
            sent_at: message.sent_at,
        }
    }
}

/// 创建会话的响应视图，参与方和商品只含原始 ID。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDto {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub messages: Vec<MessageDto>,
    pub message_count: u64,
    pub created_at: Timestamp,
    pub last_message_at: Timestamp,
}

impl From<&Chat> for ChatDto {
    fn from(chat: &Chat) -> Self {
        Self {
            id: Uuid::from(chat.id),
            buyer_id: Uuid::from(chat.buyer_id),
            seller_id: Uuid::from(chat.seller_id),
            product_id: Uuid::from(chat.product_id),
            messages: chat.messages.iter().map(MessageDto::from).collect(),
            message_count: chat.message_count,
            created_at: chat.created_at,
            last_message_at: chat.last_message_at,
        }
    }
}

/// 参与方摘要。密码哈希和注册时间不出现在任何响应里。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl From<&UserAccount> for PartySummary {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: Uuid::from(account.id),
            name: account.name.clone(),
            email: account.email.clone(),
            avatar_url: account.avatar_url.clone(),
        }
    }
}

/// 商品摘要。卖家、详情描述和上架时间被裁剪。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub picture_url: Option<String>,
}

impl From<&Listing> for ListingSummary {
    fn from(listing: &Listing) -> Self {
        Self {
            id: Uuid::from(listing.id),
            title: listing.title.clone(),
            price_cents: listing.price_cents,
            picture_url: listing.picture_url.clone(),
        }
    }
}

/// 填充后的会话视图。被删除的用户或商品渲染为 null，不让整个请求失败。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulatedChatDto {
    pub id: Uuid,
    pub buyer: Option<PartySummary>,
    pub seller: Option<PartySummary>,
    pub product: Option<ListingSummary>,
    pub messages: Vec<MessageDto>,
    pub message_count: u64,
    pub created_at: Timestamp,
    pub last_message_at: Timestamp,
}

impl PopulatedChatDto {
    pub fn new(
        chat: &Chat,
        buyer: Option<&UserAccount>,
        seller: Option<&UserAccount>,
        product: Option<&Listing>,
    ) -> Self {
        Self {
            id: Uuid::from(chat.id),
            buyer: buyer.map(PartySummary::from),
            seller: seller.map(PartySummary::from),
            product: product.map(ListingSummary::from),
            messages: chat.messages.iter().map(MessageDto::from).collect(),
            message_count: chat.message_count,
            created_at: chat.created_at,
            last_message_at: chat.last_message_at,
        }
    }
}
