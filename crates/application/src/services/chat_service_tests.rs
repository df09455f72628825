//! 会话服务单元测试
//!
//! 用内存假实现覆盖创建、发消息、查询和广播容错等核心流程。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use domain::{
    Chat, ChatId, ChatStore, DomainError, Message, MessageSender, ProductId, RepositoryError,
    RepositoryFuture, UserId,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster},
    clock::SystemClock,
    error::ApplicationError,
    gateway::{GatewayError, IdentityGateway, Listing, ListingGateway, UserAccount},
    services::{ChatService, ChatServiceDependencies, InitializeChatRequest, SendMessageRequest},
};

#[derive(Default)]
struct InMemoryChatStore {
    data: Arc<RwLock<HashMap<Uuid, Chat>>>,
}

impl InMemoryChatStore {
    fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn stored_chat(&self, id: ChatId) -> Option<Chat> {
        self.data.read().await.get(&Uuid::from(id)).cloned()
    }

    async fn len(&self) -> usize {
        self.data.read().await.len()
    }
}

impl ChatStore for InMemoryChatStore {
    fn create(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let store = self.data.clone();
        Box::pin(async move {
            let mut guard = store.write().await;
            let duplicate = guard
                .values()
                .any(|c| c.buyer_id == chat.buyer_id && c.product_id == chat.product_id);
            if duplicate {
                return Err(RepositoryError::Conflict);
            }
            let stored = chat.clone();
            guard.insert(Uuid::from(chat.id), chat);
            Ok(stored)
        })
    }

    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>> {
        let store = self.data.clone();
        Box::pin(async move { Ok(store.read().await.get(&Uuid::from(id)).cloned()) })
    }

    fn find_by_pair(&self, buyer: UserId, product: ProductId) -> RepositoryFuture<Option<Chat>> {
        let store = self.data.clone();
        Box::pin(async move {
            Ok(store
                .read()
                .await
                .values()
                .find(|c| c.buyer_id == buyer && c.product_id == product)
                .cloned())
        })
    }

    fn append_message(&self, chat_id: ChatId, message: Message) -> RepositoryFuture<Chat> {
        let store = self.data.clone();
        Box::pin(async move {
            let mut guard = store.write().await;
            let chat = guard
                .get_mut(&Uuid::from(chat_id))
                .ok_or(RepositoryError::NotFound)?;
            chat.append(message);
            Ok(chat.clone())
        })
    }

    fn list_for_party(&self, user: UserId) -> RepositoryFuture<Vec<Chat>> {
        let store = self.data.clone();
        Box::pin(async move {
            let mut chats: Vec<Chat> = store
                .read()
                .await
                .values()
                .filter(|c| c.is_party(user))
                .cloned()
                .collect();
            chats.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
            Ok(chats)
        })
    }
}

/// 模拟并发竞争：查重时看不到对手，写入时撞上唯一约束。
struct RacyChatStore;

impl ChatStore for RacyChatStore {
    fn create(&self, _chat: Chat) -> RepositoryFuture<Chat> {
        Box::pin(async { Err(RepositoryError::Conflict) })
    }

    fn find_by_id(&self, _id: ChatId) -> RepositoryFuture<Option<Chat>> {
        Box::pin(async { Ok(None) })
    }

    fn find_by_pair(&self, _buyer: UserId, _product: ProductId) -> RepositoryFuture<Option<Chat>> {
        Box::pin(async { Ok(None) })
    }

    fn append_message(&self, _chat_id: ChatId, _message: Message) -> RepositoryFuture<Chat> {
        Box::pin(async { Err(RepositoryError::NotFound) })
    }

    fn list_for_party(&self, _user: UserId) -> RepositoryFuture<Vec<Chat>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

struct UnavailableChatStore;

impl ChatStore for UnavailableChatStore {
    fn create(&self, _chat: Chat) -> RepositoryFuture<Chat> {
        Box::pin(async { Err(RepositoryError::unavailable("store is down")) })
    }

    fn find_by_id(&self, _id: ChatId) -> RepositoryFuture<Option<Chat>> {
        Box::pin(async { Err(RepositoryError::unavailable("store is down")) })
    }

    fn find_by_pair(&self, _buyer: UserId, _product: ProductId) -> RepositoryFuture<Option<Chat>> {
        Box::pin(async { Err(RepositoryError::unavailable("store is down")) })
    }

    fn append_message(&self, _chat_id: ChatId, _message: Message) -> RepositoryFuture<Chat> {
        Box::pin(async { Err(RepositoryError::unavailable("store is down")) })
    }

    fn list_for_party(&self, _user: UserId) -> RepositoryFuture<Vec<Chat>> {
        Box::pin(async { Err(RepositoryError::unavailable("store is down")) })
    }
}

#[derive(Default)]
struct StaticIdentityGateway {
    users: HashMap<Uuid, UserAccount>,
}

impl StaticIdentityGateway {
    fn with_users(users: Vec<UserAccount>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| (Uuid::from(u.id), u))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityGateway for StaticIdentityGateway {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, GatewayError> {
        Ok(self.users.get(&Uuid::from(id)).cloned())
    }
}

struct OfflineIdentityGateway;

#[async_trait]
impl IdentityGateway for OfflineIdentityGateway {
    async fn find_user(&self, _id: UserId) -> Result<Option<UserAccount>, GatewayError> {
        Err(GatewayError::unavailable("identity service timed out"))
    }
}

#[derive(Default)]
struct StaticListingGateway {
    listings: HashMap<Uuid, Listing>,
}

impl StaticListingGateway {
    fn with_listings(listings: Vec<Listing>) -> Self {
        Self {
            listings: listings
                .into_iter()
                .map(|l| (Uuid::from(l.id), l))
                .collect(),
        }
    }
}

#[async_trait]
impl ListingGateway for StaticListingGateway {
    async fn find_listing(&self, id: ProductId) -> Result<Option<Listing>, GatewayError> {
        Ok(self.listings.get(&Uuid::from(id)).cloned())
    }
}

#[derive(Default)]
struct RecordingBroadcaster {
    events: Arc<RwLock<Vec<MessageBroadcast>>>,
}

impl RecordingBroadcaster {
    fn new() -> Self {
        Self::default()
    }

    async fn events(&self) -> Vec<MessageBroadcast> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl MessageBroadcaster for RecordingBroadcaster {
    async fn publish(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        self.events.write().await.push(payload);
        Ok(())
    }
}

struct FailingBroadcaster;

#[async_trait]
impl MessageBroadcaster for FailingBroadcaster {
    async fn publish(&self, _payload: MessageBroadcast) -> Result<(), BroadcastError> {
        Err(BroadcastError::failed("push channel is gone"))
    }
}

fn account(id: Uuid, name: &str) -> UserAccount {
    UserAccount {
        id: UserId::from(id),
        name: name.to_owned(),
        email: format!("{name}@example.com"),
        password_hash: "$2b$12$secret-hash".to_owned(),
        avatar_url: None,
        created_at: Utc::now(),
    }
}

fn listing(id: Uuid, owner: Uuid, title: &str) -> Listing {
    Listing {
        id: ProductId::from(id),
        owner_id: UserId::from(owner),
        title: title.to_owned(),
        description: "barely used".to_owned(),
        price_cents: 12_500,
        picture_url: None,
        created_at: Utc::now(),
    }
}

struct Fixture {
    service: ChatService,
    store: Arc<InMemoryChatStore>,
    broadcaster: Arc<RecordingBroadcaster>,
    buyer: Uuid,
    seller: Uuid,
    product: Uuid,
}

fn fixture() -> Fixture {
    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    let product = Uuid::new_v4();

    let store = Arc::new(InMemoryChatStore::new());
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let identity = Arc::new(StaticIdentityGateway::with_users(vec![
        account(buyer, "alice"),
        account(seller, "bob"),
    ]));
    let listings = Arc::new(StaticListingGateway::with_listings(vec![listing(
        product, seller, "old bike",
    )]));

    let service = ChatService::new(ChatServiceDependencies {
        chat_store: store.clone(),
        identity_gateway: identity,
        listing_gateway: listings,
        clock: Arc::new(SystemClock),
        broadcaster: broadcaster.clone(),
    });

    Fixture {
        service,
        store,
        broadcaster,
        buyer,
        seller,
        product,
    }
}

fn initialize_request(fx: &Fixture) -> InitializeChatRequest {
    InitializeChatRequest {
        buyer_id: fx.buyer,
        seller_id: fx.seller,
        product_id: fx.product,
    }
}

fn send_request(chat_id: Uuid, actor: Uuid, role: &str, content: &str) -> SendMessageRequest {
    SendMessageRequest {
        chat_id,
        actor_id: actor,
        sender_role: role.to_owned(),
        content: content.to_owned(),
    }
}

#[tokio::test]
async fn initialize_seeds_welcome_message() {
    let fx = fixture();

    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    assert_eq!(chat.buyer_id, fx.buyer);
    assert_eq!(chat.seller_id, fx.seller);
    assert_eq!(chat.product_id, fx.product);
    assert_eq!(chat.message_count, 1);
    assert_eq!(chat.messages.len(), 1);
    assert_eq!(chat.messages[0].sender, MessageSender::System);
    assert_eq!(chat.last_message_at, chat.created_at);
}

#[tokio::test]
async fn initialize_rejects_self_trade_without_persisting() {
    let fx = fixture();

    let result = fx
        .service
        .initialize_chat(InitializeChatRequest {
            buyer_id: fx.seller,
            seller_id: fx.seller,
            product_id: fx.product,
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::SelfTrade))
    ));
    assert_eq!(fx.store.len().await, 0);
}

#[tokio::test]
async fn initialize_rejects_unknown_buyer() {
    let fx = fixture();

    let result = fx
        .service
        .initialize_chat(InitializeChatRequest {
            buyer_id: Uuid::new_v4(),
            seller_id: fx.seller,
            product_id: fx.product,
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::UserNotFound))
    ));
}

#[tokio::test]
async fn initialize_rejects_duplicate_pair() {
    let fx = fixture();

    fx.service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("first initialize");
    let result = fx.service.initialize_chat(initialize_request(&fx)).await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::ChatAlreadyExists))
    ));
    assert_eq!(fx.store.len().await, 1);
}

#[tokio::test]
async fn initialize_translates_store_conflict() {
    let fx = fixture();
    let identity = Arc::new(StaticIdentityGateway::with_users(vec![
        account(fx.buyer, "alice"),
        account(fx.seller, "bob"),
    ]));
    let listings = Arc::new(StaticListingGateway::with_listings(vec![listing(
        fx.product, fx.seller, "old bike",
    )]));
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: Arc::new(RacyChatStore),
        identity_gateway: identity,
        listing_gateway: listings,
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
    });

    let result = service
        .initialize_chat(InitializeChatRequest {
            buyer_id: fx.buyer,
            seller_id: fx.seller,
            product_id: fx.product,
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::ChatAlreadyExists))
    ));
}

#[tokio::test]
async fn initialize_rejects_unknown_listing() {
    let fx = fixture();

    let result = fx
        .service
        .initialize_chat(InitializeChatRequest {
            buyer_id: fx.buyer,
            seller_id: fx.seller,
            product_id: Uuid::new_v4(),
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::ListingNotFound))
    ));
}

#[tokio::test]
async fn initialize_rejects_listing_owned_by_someone_else() {
    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    let real_owner = Uuid::new_v4();
    let product = Uuid::new_v4();

    let identity = Arc::new(StaticIdentityGateway::with_users(vec![
        account(buyer, "alice"),
        account(seller, "bob"),
        account(real_owner, "carol"),
    ]));
    let listings = Arc::new(StaticListingGateway::with_listings(vec![listing(
        product, real_owner, "old bike",
    )]));
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: Arc::new(InMemoryChatStore::new()),
        identity_gateway: identity,
        listing_gateway: listings,
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
    });

    let result = service
        .initialize_chat(InitializeChatRequest {
            buyer_id: buyer,
            seller_id: seller,
            product_id: product,
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::ListingNotFound))
    ));
}

#[tokio::test]
async fn send_appends_and_broadcasts_in_order() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    for i in 0..3 {
        fx.service
            .send_message(send_request(chat.id, fx.buyer, "buyer", &format!("hi {i}")))
            .await
            .expect("send");
    }

    let stored = fx
        .store
        .stored_chat(ChatId::from(chat.id))
        .await
        .expect("stored chat");
    assert_eq!(stored.message_count, 4);
    assert_eq!(stored.messages.len(), 4);
    assert_eq!(stored.messages[1].content.as_str(), "hi 0");
    assert_eq!(stored.messages[3].content.as_str(), "hi 2");

    let mut previous = stored.messages[0].sent_at;
    for message in &stored.messages {
        assert!(message.sent_at >= previous);
        previous = message.sent_at;
    }

    let events = fx.broadcaster.events().await;
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| Uuid::from(e.chat_id) == chat.id));
    assert_eq!(events[0].message.content.as_str(), "hi 0");
}

#[tokio::test]
async fn send_rejects_invalid_payloads_without_mutation() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    for (role, content) in [
        ("buyer", ""),
        ("buyer", "   "),
        ("", "hello"),
        ("system", "hello"),
        ("admin", "hello"),
    ] {
        let result = fx
            .service
            .send_message(send_request(chat.id, fx.buyer, role, content))
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
        ));
    }

    let stored = fx
        .store
        .stored_chat(ChatId::from(chat.id))
        .await
        .expect("stored chat");
    assert_eq!(stored.message_count, 1);
    assert!(fx.broadcaster.events().await.is_empty());
}

#[tokio::test]
async fn send_rejects_non_party_without_mutation() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    let outsider = Uuid::new_v4();
    let result = fx
        .service
        .send_message(send_request(chat.id, outsider, "buyer", "let me in"))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NotAParticipant))
    ));
    let stored = fx
        .store
        .stored_chat(ChatId::from(chat.id))
        .await
        .expect("stored chat");
    assert_eq!(stored.message_count, 1);
}

#[tokio::test]
async fn send_rejects_role_mismatch() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    let result = fx
        .service
        .send_message(send_request(chat.id, fx.buyer, "seller", "pretending"))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::RoleMismatch))
    ));
}

#[tokio::test]
async fn send_reports_missing_chat() {
    let fx = fixture();

    let result = fx
        .service
        .send_message(send_request(Uuid::new_v4(), fx.buyer, "buyer", "anyone?"))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::ChatNotFound))
    ));
}

#[tokio::test]
async fn send_survives_broadcast_failure() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    let identity = Arc::new(StaticIdentityGateway::with_users(vec![
        account(fx.buyer, "alice"),
        account(fx.seller, "bob"),
    ]));
    let listings = Arc::new(StaticListingGateway::with_listings(vec![listing(
        fx.product, fx.seller, "old bike",
    )]));
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: fx.store.clone(),
        identity_gateway: identity,
        listing_gateway: listings,
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(FailingBroadcaster),
    });

    let message = service
        .send_message(send_request(chat.id, fx.seller, "seller", "still here"))
        .await
        .expect("send despite broadcast failure");
    assert_eq!(message.sender, MessageSender::Seller);

    let stored = fx
        .store
        .stored_chat(ChatId::from(chat.id))
        .await
        .expect("stored chat");
    assert_eq!(stored.message_count, 2);
}

#[tokio::test]
async fn get_strips_sensitive_fields() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    let populated = fx
        .service
        .get_chat(chat.id, fx.buyer)
        .await
        .expect("get chat");

    let body = serde_json::to_value(&populated).expect("serialize");
    let buyer = &body["buyer"];
    assert_eq!(buyer["name"], "alice");
    assert!(buyer.get("password_hash").is_none());
    assert!(buyer.get("created_at").is_none());

    let product = &body["product"];
    assert_eq!(product["title"], "old bike");
    assert!(product.get("owner_id").is_none());
    assert!(product.get("description").is_none());
    assert!(product.get("created_at").is_none());
}

#[tokio::test]
async fn get_renders_dangling_refs_as_null() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    // 商品在会话创建后被下架
    let identity = Arc::new(StaticIdentityGateway::with_users(vec![
        account(fx.buyer, "alice"),
        account(fx.seller, "bob"),
    ]));
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: fx.store.clone(),
        identity_gateway: identity,
        listing_gateway: Arc::new(StaticListingGateway::default()),
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
    });

    let populated = service
        .get_chat(chat.id, fx.buyer)
        .await
        .expect("get chat");
    assert!(populated.product.is_none());
    assert!(populated.buyer.is_some());
    assert_eq!(populated.message_count, 1);
}

#[tokio::test]
async fn get_rejects_non_party() {
    let fx = fixture();
    let chat = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("initialize");

    let result = fx.service.get_chat(chat.id, Uuid::new_v4()).await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NotAParticipant))
    ));
}

#[tokio::test]
async fn list_returns_empty_for_user_with_no_chats() {
    let fx = fixture();

    let chats = fx.service.list_chats(Uuid::new_v4()).await.expect("list");

    assert!(chats.is_empty());
}

#[tokio::test]
async fn list_orders_by_recent_activity() {
    let fx = fixture();
    let first = fx
        .service
        .initialize_chat(initialize_request(&fx))
        .await
        .expect("first chat");

    // 同一卖家的另一个商品
    let second_product = Uuid::new_v4();
    let identity = Arc::new(StaticIdentityGateway::with_users(vec![
        account(fx.buyer, "alice"),
        account(fx.seller, "bob"),
    ]));
    let listings = Arc::new(StaticListingGateway::with_listings(vec![
        listing(fx.product, fx.seller, "old bike"),
        listing(second_product, fx.seller, "older bike"),
    ]));
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: fx.store.clone(),
        identity_gateway: identity,
        listing_gateway: listings,
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
    });

    let second = service
        .initialize_chat(InitializeChatRequest {
            buyer_id: fx.buyer,
            seller_id: fx.seller,
            product_id: second_product,
        })
        .await
        .expect("second chat");

    // 给第一个会话发消息，它应当排到最前面
    service
        .send_message(send_request(first.id, fx.buyer, "buyer", "bumping this"))
        .await
        .expect("send");

    let chats = service.list_chats(fx.buyer).await.expect("list");
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].id, first.id);
    assert_eq!(chats[1].id, second.id);
}

#[tokio::test]
async fn store_outage_surfaces_as_repository_error() {
    let fx = fixture();
    let identity = Arc::new(StaticIdentityGateway::with_users(vec![account(
        fx.buyer, "alice",
    )]));
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: Arc::new(UnavailableChatStore),
        identity_gateway: identity,
        listing_gateway: Arc::new(StaticListingGateway::default()),
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
    });

    let result = service
        .send_message(send_request(Uuid::new_v4(), fx.buyer, "buyer", "hello"))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Repository(
            RepositoryError::Unavailable { .. }
        ))
    ));
}

#[tokio::test]
async fn gateway_outage_surfaces_as_gateway_error() {
    let fx = fixture();
    let service = ChatService::new(ChatServiceDependencies {
        chat_store: Arc::new(InMemoryChatStore::new()),
        identity_gateway: Arc::new(OfflineIdentityGateway),
        listing_gateway: Arc::new(StaticListingGateway::default()),
        clock: Arc::new(SystemClock),
        broadcaster: Arc::new(RecordingBroadcaster::new()),
    });

    let result = service
        .initialize_chat(InitializeChatRequest {
            buyer_id: fx.buyer,
            seller_id: fx.seller,
            product_id: fx.product,
        })
        .await;

    assert!(matches!(result, Err(ApplicationError::Gateway(_))));
}
