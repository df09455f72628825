//! 基础设施层实现。
//!
//! 提供会话存储（Postgres 与内存两种实现）、外部网关适配器、
//! 以及按会话主题分发的本地消息广播器。

pub mod broadcast;
pub mod gateway;
pub mod memory;
pub mod migrations;
pub mod repository;

pub use broadcast::LocalMessageBroadcaster;
pub use gateway::{PgIdentityGateway, PgListingGateway};
pub use memory::{MemoryChatStore, MemoryIdentityGateway, MemoryListingGateway};
pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgChatStore};
