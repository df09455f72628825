use std::sync::Arc;

use domain::{
    Chat, ChatId, ChatStore, DomainError, Message, MessageContent, MessageId, MessageSender,
    ProductId, RepositoryError, UserId,
};
use uuid::Uuid;

use crate::{
    broadcaster::{MessageBroadcast, MessageBroadcaster},
    clock::Clock,
    dto::{ChatDto, MessageDto, PopulatedChatDto},
    error::ApplicationError,
    gateway::{IdentityGateway, ListingGateway},
};

#[derive(Debug, Clone)]
pub struct InitializeChatRequest {
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub chat_id: Uuid,
    pub actor_id: Uuid, // 操作者（由上游认证层提供）
    pub sender_role: String,
    pub content: String,
}

pub struct ChatServiceDependencies {
    pub chat_store: Arc<dyn ChatStore>,
    pub identity_gateway: Arc<dyn IdentityGateway>,
    pub listing_gateway: Arc<dyn ListingGateway>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 为一个 (买家, 商品) 组合创建会话，欢迎消息随会话一起写入。
    pub async fn initialize_chat(
        &self,
        request: InitializeChatRequest,
    ) -> Result<ChatDto, ApplicationError> {
        let buyer_id = UserId::from(request.buyer_id);
        let seller_id = UserId::from(request.seller_id);
        let product_id = ProductId::from(request.product_id);

        if buyer_id == seller_id {
            return Err(DomainError::SelfTrade.into());
        }

        // 买家必须是真实账号
        self.deps
            .identity_gateway
            .find_user(buyer_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        if self
            .deps
            .chat_store
            .find_by_pair(buyer_id, product_id)
            .await?
            .is_some()
        {
            return Err(DomainError::ChatAlreadyExists.into());
        }

        // 商品必须存在且确实属于该卖家
        let listing = self
            .deps
            .listing_gateway
            .find_listing(product_id)
            .await?
            .ok_or(DomainError::ListingNotFound)?;
        if listing.owner_id != seller_id {
            return Err(DomainError::ListingNotFound.into());
        }

        let now = self.deps.clock.now();
        let chat = Chat::open(
            ChatId::from(Uuid::new_v4()),
            buyer_id,
            seller_id,
            product_id,
            MessageId::from(Uuid::new_v4()),
            now,
        )?;

        // 并发创建同一组合时由存储层唯一约束裁决，这里只翻译错误
        let stored = match self.deps.chat_store.create(chat).await {
            Ok(chat) => chat,
            Err(RepositoryError::Conflict) => {
                return Err(DomainError::ChatAlreadyExists.into());
            }
            Err(other) => return Err(other.into()),
        };

        tracing::info!(
            chat_id = %stored.id,
            buyer_id = %stored.buyer_id,
            seller_id = %stored.seller_id,
            product_id = %stored.product_id,
            "会话已创建"
        );

        Ok(ChatDto::from(&stored))
    }

    /// 向会话追加一条消息并广播给订阅方。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let chat_id = ChatId::from(request.chat_id);
        let actor_id = UserId::from(request.actor_id);

        let claimed_role = MessageSender::parse_role(&request.sender_role)?;
        let content = MessageContent::new(request.content)?;

        let chat = self
            .deps
            .chat_store
            .find_by_id(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound)?;

        let actual_role = chat.role_of(actor_id).ok_or(DomainError::NotAParticipant)?;
        if claimed_role != actual_role {
            return Err(DomainError::RoleMismatch.into());
        }

        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            content,
            actual_role,
            self.deps.clock.now(),
        );

        let updated = self
            .deps
            .chat_store
            .append_message(chat_id, message)
            .await
            .map_err(|err| match err {
                // 查到会话之后又被删除的窗口
                RepositoryError::NotFound => ApplicationError::from(DomainError::ChatNotFound),
                other => ApplicationError::from(other),
            })?;

        let stored = updated
            .messages
            .last()
            .cloned()
            .ok_or_else(|| RepositoryError::storage("chat has no messages after append"))?;

        // 广播失败只记录日志，消息已经持久化，本次请求照常成功
        if let Err(broadcast_error) = self
            .deps
            .broadcaster
            .publish(MessageBroadcast::new(chat_id, stored.clone()))
            .await
        {
            tracing::warn!(
                chat_id = %chat_id,
                message_id = %stored.id,
                error = %broadcast_error,
                "消息已持久化，但实时广播失败"
            );
        }

        Ok(MessageDto::from(&stored))
    }

    /// 获取单个会话的填充视图，仅参与方可见。
    pub async fn get_chat(
        &self,
        chat_id: Uuid,
        actor_id: Uuid,
    ) -> Result<PopulatedChatDto, ApplicationError> {
        let chat_id = ChatId::from(chat_id);
        let actor_id = UserId::from(actor_id);

        let chat = self
            .deps
            .chat_store
            .find_by_id(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound)?;

        if !chat.is_party(actor_id) {
            return Err(DomainError::NotAParticipant.into());
        }

        self.populate(&chat).await
    }

    /// 列出用户参与的所有会话，没有会话返回空列表。
    pub async fn list_chats(
        &self,
        actor_id: Uuid,
    ) -> Result<Vec<PopulatedChatDto>, ApplicationError> {
        let actor_id = UserId::from(actor_id);
        let chats = self.deps.chat_store.list_for_party(actor_id).await?;

        let mut populated = Vec::with_capacity(chats.len());
        for chat in &chats {
            populated.push(self.populate(chat).await?);
        }
        Ok(populated)
    }

    // 组装填充视图，引用失效的用户或商品渲染为 null
    async fn populate(&self, chat: &Chat) -> Result<PopulatedChatDto, ApplicationError> {
        let buyer = self.deps.identity_gateway.find_user(chat.buyer_id).await?;
        let seller = self.deps.identity_gateway.find_user(chat.seller_id).await?;
        let product = self
            .deps
            .listing_gateway
            .find_listing(chat.product_id)
            .await?;

        Ok(PopulatedChatDto::new(
            chat,
            buyer.as_ref(),
            seller.as_ref(),
            product.as_ref(),
        ))
    }
}
