//! 外部协作方接口。
//!
//! 用户账号和商品目录由市场主系统管理，聊天子系统只读访问。

use async_trait::async_trait;
use domain::{ProductId, Timestamp, UserId};
use thiserror::Error;

/// 身份服务返回的用户账号读模型。包含敏感字段，
/// 对外暴露前必须经过 DTO 层裁剪。
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: Timestamp,
}

/// 商品目录返回的商品读模型。
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: ProductId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub picture_url: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream unavailable: {message}")]
    Unavailable { message: String },
}

impl GatewayError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, GatewayError>;
}

#[async_trait]
pub trait ListingGateway: Send + Sync {
    async fn find_listing(&self, id: ProductId) -> Result<Option<Listing>, GatewayError>;
}
