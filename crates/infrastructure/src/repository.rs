use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::{
    Chat, ChatId, ChatStore, Message, MessageContent, MessageId, MessageSender, ProductId,
    RepositoryError, RepositoryFuture, RepositoryResult, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgConnection, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::PoolTimedOut => RepositoryError::unavailable("connection pool timed out"),
        sqlx::Error::Io(io) => RepositoryError::unavailable(io.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        other => RepositoryError::storage(other.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    product_id: Uuid,
    message_count: i64,
    created_at: DateTime<Utc>,
    last_message_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    sender: String,
    content: String,
    sent_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let sender = MessageSender::from_str(&value.sender)
            .map_err(|err| invalid_data(err.to_string()))?;
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Message::new(
            MessageId::from(value.id),
            content,
            sender,
            value.sent_at,
        ))
    }
}

fn assemble(record: ChatRecord, messages: Vec<Message>) -> Chat {
    Chat {
        id: ChatId::from(record.id),
        buyer_id: UserId::from(record.buyer_id),
        seller_id: UserId::from(record.seller_id),
        product_id: ProductId::from(record.product_id),
        messages,
        message_count: record.message_count as u64,
        created_at: record.created_at,
        last_message_at: record.last_message_at,
    }
}

const CHAT_COLUMNS: &str =
    "id, buyer_id, seller_id, product_id, message_count, created_at, last_message_at";

async fn load_messages(conn: &mut PgConnection, chat_id: Uuid) -> RepositoryResult<Vec<Message>> {
    let records = sqlx::query_as::<_, MessageRecord>(
        r#"SELECT id, sender, content, sent_at FROM messages WHERE chat_id = $1 ORDER BY seq"#,
    )
    .bind(chat_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    records.into_iter().map(Message::try_from).collect()
}

async fn load_chat(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Chat>> {
    let record = sqlx::query_as::<_, ChatRecord>(&format!(
        "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    match record {
        Some(record) => {
            let messages = load_messages(conn, record.id).await?;
            Ok(Some(assemble(record, messages)))
        }
        None => Ok(None),
    }
}

/// Postgres 会话存储。
///
/// 唯一性靠 chats 表的 (buyer_id, product_id) 唯一约束裁决；
/// 追加消息在事务里先 UPDATE 会话行（行锁串行化并发追加），
/// 计数器、最后活跃时间和消息行在同一个事务内落盘。
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ChatStore for PgChatStore {
    fn create(&self, chat: Chat) -> RepositoryFuture<Chat> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

            sqlx::query(
                r#"
                INSERT INTO chats (id, buyer_id, seller_id, product_id, message_count, created_at, last_message_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::from(chat.id))
            .bind(Uuid::from(chat.buyer_id))
            .bind(Uuid::from(chat.seller_id))
            .bind(Uuid::from(chat.product_id))
            .bind(chat.message_count as i64)
            .bind(chat.created_at)
            .bind(chat.last_message_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            // 欢迎消息与会话同一事务写入，不存在没有消息的会话
            for (index, message) in chat.messages.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO messages (id, chat_id, seq, sender, content, sent_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(Uuid::from(message.id))
                .bind(Uuid::from(chat.id))
                .bind((index + 1) as i64)
                .bind(message.sender.as_str())
                .bind(message.content.as_str())
                .bind(message.sent_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
            }

            tx.commit().await.map_err(map_sqlx_err)?;
            Ok(chat)
        })
    }

    fn find_by_id(&self, id: ChatId) -> RepositoryFuture<Option<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut conn = pool.acquire().await.map_err(map_sqlx_err)?;
            load_chat(&mut conn, Uuid::from(id)).await
        })
    }

    fn find_by_pair(&self, buyer: UserId, product: ProductId) -> RepositoryFuture<Option<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut conn = pool.acquire().await.map_err(map_sqlx_err)?;
            let record = sqlx::query_as::<_, ChatRecord>(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE buyer_id = $1 AND product_id = $2"
            ))
            .bind(Uuid::from(buyer))
            .bind(Uuid::from(product))
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_err)?;

            match record {
                Some(record) => {
                    let messages = load_messages(&mut conn, record.id).await?;
                    Ok(Some(assemble(record, messages)))
                }
                None => Ok(None),
            }
        })
    }

    fn append_message(&self, chat_id: ChatId, message: Message) -> RepositoryFuture<Chat> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

            // 行锁串行化同一会话的并发追加；时间戳早于最后消息时被抬升
            let updated: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
                r#"
                UPDATE chats
                SET message_count = message_count + 1,
                    last_message_at = GREATEST(last_message_at, $2)
                WHERE id = $1
                RETURNING message_count, last_message_at
                "#,
            )
            .bind(Uuid::from(chat_id))
            .bind(message.sent_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            let (seq, clamped_at) = updated.ok_or(RepositoryError::NotFound)?;

            sqlx::query(
                r#"
                INSERT INTO messages (id, chat_id, seq, sender, content, sent_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::from(message.id))
            .bind(Uuid::from(chat_id))
            .bind(seq)
            .bind(message.sender.as_str())
            .bind(message.content.as_str())
            .bind(clamped_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            // 提交前读取，保证返回的会话以本次追加结尾
            let chat = load_chat(&mut tx, Uuid::from(chat_id))
                .await?
                .ok_or(RepositoryError::NotFound)?;

            tx.commit().await.map_err(map_sqlx_err)?;
            Ok(chat)
        })
    }

    fn list_for_party(&self, user: UserId) -> RepositoryFuture<Vec<Chat>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let mut conn = pool.acquire().await.map_err(map_sqlx_err)?;
            let records = sqlx::query_as::<_, ChatRecord>(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE buyer_id = $1 OR seller_id = $1 ORDER BY last_message_at DESC"
            ))
            .bind(Uuid::from(user))
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_err)?;

            let mut chats = Vec::with_capacity(records.len());
            for record in records {
                let messages = load_messages(&mut conn, record.id).await?;
                chats.push(assemble(record, messages));
            }
            Ok(chats)
        })
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}
