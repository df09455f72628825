use std::sync::Arc;

use application::ChatService;
use infrastructure::LocalMessageBroadcaster;

/// 路由层共享状态。广播器保留具体类型，WebSocket 端点需要按会话订阅。
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub broadcaster: Arc<LocalMessageBroadcaster>,
}

impl AppState {
    pub fn new(chat_service: Arc<ChatService>, broadcaster: Arc<LocalMessageBroadcaster>) -> Self {
        Self {
            chat_service,
            broadcaster,
        }
    }
}
