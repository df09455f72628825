use futures::future::BoxFuture;

use crate::chat::Chat;
use crate::errors::RepositoryError;
use crate::message::Message;
use crate::value_objects::{ChatId, ProductId, UserId};

pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type RepositoryFuture<T> = BoxFuture<'static, RepositoryResult<T>>;

/// 会话存储接口。唯一性和追加的原子性由实现保证，
/// 调用方不做 check-then-act。
pub trait ChatStore: Send + Sync {
    /// 持久化新会话（含欢迎消息）。同一 (买家, 商品) 已存在时返回 `Conflict`。
    fn create(&self, chat: Chat) -> RepositoryFuture<Chat>;

    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>>;

    fn find_by_pair(&self, buyer: UserId, product: ProductId) -> RepositoryFuture<Option<Chat>>;

    /// 原子追加消息：消息写入、计数器递增和最后活跃时间更新是同一步。
    /// 同一会话上的并发追加串行执行。会话不存在时返回 `NotFound`。
    fn append_message(&self, chat_id: ChatId, message: Message) -> RepositoryFuture<Chat>;

    /// 列出用户作为买家或卖家参与的所有会话，按最后活跃时间倒序。
    fn list_for_party(&self, user: UserId) -> RepositoryFuture<Vec<Chat>>;
}
