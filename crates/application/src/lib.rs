//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、参与方鉴权、
//! 以及对外部协作方（身份服务、商品目录、消息广播）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod services;

pub use broadcaster::{BroadcastError, MessageBroadcast, MessageBroadcaster};
pub use clock::{Clock, SystemClock};
pub use dto::{ChatDto, ListingSummary, MessageDto, PartySummary, PopulatedChatDto};
pub use error::ApplicationError;
pub use gateway::{GatewayError, IdentityGateway, Listing, ListingGateway, UserAccount};
pub use services::{
    ChatService, ChatServiceDependencies, InitializeChatRequest, SendMessageRequest,
};
