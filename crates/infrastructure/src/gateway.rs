//! 市场主系统数据的只读网关。
//!
//! 用户账号和商品表由主应用维护，聊天子系统只做查询。

use application::gateway::{GatewayError, IdentityGateway, Listing, ListingGateway, UserAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ProductId, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

fn map_gateway_err(err: sqlx::Error) -> GatewayError {
    GatewayError::unavailable(err.to_string())
}

#[derive(Debug, FromRow)]
struct AccountRecord {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AccountRecord> for UserAccount {
    fn from(value: AccountRecord) -> Self {
        Self {
            id: UserId::from(value.id),
            name: value.name,
            email: value.email,
            password_hash: value.password_hash,
            avatar_url: value.avatar_url,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ListingRecord {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: String,
    price_cents: i64,
    picture_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ListingRecord> for Listing {
    fn from(value: ListingRecord) -> Self {
        Self {
            id: ProductId::from(value.id),
            owner_id: UserId::from(value.owner_id),
            title: value.title,
            description: value.description,
            price_cents: value.price_cents,
            picture_url: value.picture_url,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgIdentityGateway {
    pool: PgPool,
}

impl PgIdentityGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityGateway for PgIdentityGateway {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, GatewayError> {
        let record = sqlx::query_as::<_, AccountRecord>(
            r#"SELECT id, name, email, password_hash, avatar_url, created_at FROM users WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_gateway_err)?;

        Ok(record.map(UserAccount::from))
    }
}

#[derive(Clone)]
pub struct PgListingGateway {
    pool: PgPool,
}

impl PgListingGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingGateway for PgListingGateway {
    async fn find_listing(&self, id: ProductId) -> Result<Option<Listing>, GatewayError> {
        let record = sqlx::query_as::<_, ListingRecord>(
            r#"SELECT id, owner_id, title, description, price_cents, picture_url, created_at FROM products WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_gateway_err)?;

        Ok(record.map(Listing::from))
    }
}
