//! 内存版适配器。
//!
//! 测试和本地开发使用，与 Postgres 实现遵守同一套存储契约：
//! 唯一性在写锁内裁决，追加是单个线性化步骤。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use application::gateway::{GatewayError, IdentityGateway, Listing, ListingGateway, UserAccount};
use async_trait::async_trait;
use domain::{
    Chat, ChatId, ChatStore, Message, ProductId, RepositoryError, RepositoryFuture, UserId,
};
use tokio::sync::RwLock;
use tokio::time::timeout;
use uuid::Uuid;

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct MemoryState {
    chats: HashMap<Uuid, Chat>,
    pair_index: HashMap<(Uuid, Uuid), Uuid>,
}

/// 内存会话存储。锁等待超过 `op_timeout` 视为存储不可用。
pub struct MemoryChatStore {
    state: Arc<RwLock<MemoryState>>,
    op_timeout: Duration,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::with_op_timeout(DEFAULT_OP_TIMEOUT)
    }

    pub fn with_op_timeout(op_timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            op_timeout,
        }
    }
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_timed_out() -> RepositoryError {
    RepositoryError::unavailable("memory store lock timed out")
}

impl ChatStore for MemoryChatStore {
    fn create(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let state = self.state.clone();
        let op_timeout = self.op_timeout;
        Box::pin(async move {
            let mut guard = timeout(op_timeout, state.write())
                .await
                .map_err(|_| lock_timed_out())?;

            let pair = (Uuid::from(chat.buyer_id), Uuid::from(chat.product_id));
            if guard.pair_index.contains_key(&pair) {
                return Err(RepositoryError::Conflict);
            }

            let stored = chat.clone();
            guard.pair_index.insert(pair, Uuid::from(chat.id));
            guard.chats.insert(Uuid::from(chat.id), chat);
            Ok(stored)
        })
    }

    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>> {
        let state = self.state.clone();
        let op_timeout = self.op_timeout;
        Box::pin(async move {
            let guard = timeout(op_timeout, state.read())
                .await
                .map_err(|_| lock_timed_out())?;
            Ok(guard.chats.get(&Uuid::from(id)).cloned())
        })
    }

    fn find_by_pair(&self, buyer: UserId, product: ProductId) -> RepositoryFuture<Option<Chat>> {
        let state = self.state.clone();
        let op_timeout = self.op_timeout;
        Box::pin(async move {
            let guard = timeout(op_timeout, state.read())
                .await
                .map_err(|_| lock_timed_out())?;
            let pair = (Uuid::from(buyer), Uuid::from(product));
            let chat = guard
                .pair_index
                .get(&pair)
                .and_then(|id| guard.chats.get(id))
                .cloned();
            Ok(chat)
        })
    }

    fn append_message(&self, chat_id: ChatId, message: Message) -> RepositoryFuture<Chat> {
        let state = self.state.clone();
        let op_timeout = self.op_timeout;
        Box::pin(async move {
            let mut guard = timeout(op_timeout, state.write())
                .await
                .map_err(|_| lock_timed_out())?;
            let chat = guard
                .chats
                .get_mut(&Uuid::from(chat_id))
                .ok_or(RepositoryError::NotFound)?;
            chat.append(message);
            Ok(chat.clone())
        })
    }

    fn list_for_party(&self, user: UserId) -> RepositoryFuture<Vec<Chat>> {
        let state = self.state.clone();
        let op_timeout = self.op_timeout;
        Box::pin(async move {
            let guard = timeout(op_timeout, state.read())
                .await
                .map_err(|_| lock_timed_out())?;
            let mut chats: Vec<Chat> = guard
                .chats
                .values()
                .filter(|chat| chat.is_party(user))
                .cloned()
                .collect();
            chats.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
            Ok(chats)
        })
    }
}

/// 内存身份网关，账号通过 `insert` 预置。
#[derive(Default)]
pub struct MemoryIdentityGateway {
    accounts: RwLock<HashMap<Uuid, UserAccount>>,
}

impl MemoryIdentityGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: UserAccount) {
        self.accounts
            .write()
            .await
            .insert(Uuid::from(account.id), account);
    }

    pub async fn remove(&self, id: UserId) {
        self.accounts.write().await.remove(&Uuid::from(id));
    }
}

#[async_trait]
impl IdentityGateway for MemoryIdentityGateway {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, GatewayError> {
        Ok(self.accounts.read().await.get(&Uuid::from(id)).cloned())
    }
}

/// 内存商品网关，商品通过 `insert` 预置。
#[derive(Default)]
pub struct MemoryListingGateway {
    listings: RwLock<HashMap<Uuid, Listing>>,
}

impl MemoryListingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, listing: Listing) {
        self.listings
            .write()
            .await
            .insert(Uuid::from(listing.id), listing);
    }

    pub async fn remove(&self, id: ProductId) {
        self.listings.write().await.remove(&Uuid::from(id));
    }
}

#[async_trait]
impl ListingGateway for MemoryListingGateway {
    async fn find_listing(&self, id: ProductId) -> Result<Option<Listing>, GatewayError> {
        Ok(self.listings.read().await.get(&Uuid::from(id)).cloned())
    }
}
