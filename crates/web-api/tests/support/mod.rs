use std::sync::Arc;

use application::{
    gateway::{Listing, UserAccount},
    services::{ChatService, ChatServiceDependencies},
    SystemClock,
};
use axum::Router;
use chrono::Utc;
use domain::{ProductId, UserId};
use infrastructure::{
    LocalMessageBroadcaster, MemoryChatStore, MemoryIdentityGateway, MemoryListingGateway,
};
use uuid::Uuid;
use web_api::{router, AppState};

/// 内存适配器组装出来的被测应用。网关句柄向外暴露，测试用它预置账号和商品。
pub struct TestApp {
    pub router: Router,
    pub identity: Arc<MemoryIdentityGateway>,
    pub listings: Arc<MemoryListingGateway>,
}

pub fn account(id: Uuid, name: &str) -> UserAccount {
    UserAccount {
        id: UserId::from(id),
        name: name.to_owned(),
        email: format!("{name}@example.com"),
        password_hash: "$2b$12$secret-hash".to_owned(),
        avatar_url: None,
        created_at: Utc::now(),
    }
}

pub fn listing(id: Uuid, owner: Uuid, title: &str) -> Listing {
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

pub fn build_app() -> TestApp {
    let store = Arc::new(MemoryChatStore::new());
    let identity = Arc::new(MemoryIdentityGateway::new());
    let listings = Arc::new(MemoryListingGateway::new());
    let broadcaster = Arc::new(LocalMessageBroadcaster::new(64));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        chat_store: store,
        identity_gateway: identity.clone(),
        listing_gateway: listings.clone(),
        clock: Arc::new(SystemClock),
        broadcaster: broadcaster.clone(),
    }));

    TestApp {
        router: router(AppState::new(chat_service, broadcaster)),
        identity,
        listings,
    }
}
