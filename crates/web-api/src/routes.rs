use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::services::{InitializeChatRequest, SendMessageRequest};
use application::{ChatDto, MessageBroadcast, MessageDto, PopulatedChatDto};
use domain::ChatId;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
struct InitializeChatPayload {
    buyer: Uuid,
    seller: Uuid,
    product: Uuid,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    actor: Uuid,
    sender_role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct SendAck {
    ok: bool,
}

#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor: Uuid,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chats", post(initialize_chat).get(list_chats))
        .route("/chats/{chat_id}", get(get_chat))
        .route("/chats/{chat_id}/messages", post(send_message))
        .route("/chats/{chat_id}/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn initialize_chat(
    State(state): State<AppState>,
    Json(payload): Json<InitializeChatPayload>,
) -> Result<(StatusCode, Json<ChatDto>), ApiError> {
    let dto = state
        .chat_service
        .initialize_chat(InitializeChatRequest {
            buyer_id: payload.buyer,
            seller_id: payload.seller,
            product_id: payload.product,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<Json<SendAck>, ApiError> {
    state
        .chat_service
        .send_message(SendMessageRequest {
            chat_id,
            actor_id: payload.actor,
            sender_role: payload.sender_role,
            content: payload.content,
        })
        .await?;

    Ok(Json(SendAck { ok: true }))
}

async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<PopulatedChatDto>, ApiError> {
    let dto = state.chat_service.get_chat(chat_id, query.actor).await?;

    Ok(Json(dto))
}

async fn list_chats(
    State(state): State<AppState>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<PopulatedChatDto>>, ApiError> {
    let items = state.chat_service.list_chats(query.actor).await?;

    Ok(Json(items))
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // 升级前做与 get 相同的参与方鉴权，非参与方拿不到这个会话的事件流
    state.chat_service.get_chat(chat_id, query.actor).await?;

    // 鉴权通过后先订阅再升级，两步之间广播的消息不会丢
    let receiver = state.broadcaster.subscribe(ChatId::from(chat_id)).await;

    Ok(ws.on_upgrade(move |socket| websocket_handler(socket, chat_id, receiver)))
}

async fn websocket_handler(
    socket: WebSocket,
    chat_id: Uuid,
    mut receiver: broadcast::Receiver<MessageBroadcast>,
) {
    let (mut sender, mut incoming) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                // 慢消费者被丢弃最旧事件后继续接收，丢掉的部分靠重新拉取会话补齐
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(chat_id = %chat_id, skipped, "websocket subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let payload = match serde_json::to_string(&MessageDto::from(&event.message)) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            if matches!(message, WsMessage::Close(_)) {
                break;
            }
        }
    });

    let _ = tokio::join!(send_task, recv_task);
}
