use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use crate::database::entities::{chat_messages, chat_sessions};
use crate::errors::{CoreError, CoreResult};

/// A user keeps at most this many diagnosis conversations.
pub const MAX_SESSIONS_PER_USER: usize = 3;
const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: chat_sessions::Model,
    pub preview: String,
    pub message_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: chat_sessions::Model,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i32,
    pub text: String,
    pub is_user: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<chat_messages::Model> for MessageView {
    fn from(message: chat_messages::Model) -> Self {
        let metadata = message
            .metadata_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: message.id,
            text: message.text,
            is_user: message.is_user,
            metadata,
            created_at: message.created_at,
        }
    }
}

pub fn default_title(crop: &str) -> String {
    let mut chars = crop.trim().chars();
    let crop = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{} diagnosis", crop)
}

pub fn preview(first_user_message: Option<&str>) -> String {
    match first_user_message {
        Some(text) if text.chars().count() > PREVIEW_CHARS => {
            format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
        }
        Some(text) => text.to_string(),
        None => "New conversation".to_string(),
    }
}

/// Diagnosis conversations and their messages
#[derive(Clone)]
pub struct ChatHistoryService {
    db: DatabaseConnection,
}

impl ChatHistoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn sessions_for<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
    ) -> CoreResult<Vec<chat_sessions::Model>> {
        chat_sessions::Entity::find()
            .filter(chat_sessions::Column::UserId.eq(user_id))
            .order_by_desc(chat_sessions::Column::UpdatedAt)
            .order_by_desc(chat_sessions::Column::Id)
            .all(conn)
            .await
            .map_err(|e| CoreError::internal("Failed to list chat sessions").with_source(e))
    }

    /// Create a session, evicting the least recently updated ones so the
    /// user ends up with at most [`MAX_SESSIONS_PER_USER`].
    pub async fn create_session(
        &self,
        user_id: i32,
        crop: &str,
        title: Option<String>,
    ) -> CoreResult<chat_sessions::Model> {
        let crop = crop.trim().to_lowercase();
        if crop.is_empty() {
            return Err(CoreError::validation("crop is required").with_field("field", "crop"));
        }
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title(&crop));

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::internal("Failed to start transaction").with_source(e))?;

        let existing = Self::sessions_for(&txn, user_id).await?;
        for stale in existing.into_iter().skip(MAX_SESSIONS_PER_USER - 1) {
            tracing::debug!(session_id = stale.id, user_id, "Evicting oldest chat session");
            Self::remove(&txn, stale.id).await?;
        }

        let now = chrono::Utc::now();
        let session = chat_sessions::ActiveModel {
            user_id: Set(user_id),
            crop: Set(crop),
            title: Set(title),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| CoreError::internal("Failed to create chat session").with_source(e))?;

        txn.commit()
            .await
            .map_err(|e| CoreError::internal("Failed to commit chat session").with_source(e))?;
        Ok(session)
    }

    /// Sessions of a user, most recently updated first
    pub async fn list_sessions(&self, user_id: i32) -> CoreResult<Vec<SessionSummary>> {
        let sessions = Self::sessions_for(&self.db, user_id).await?;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let first_user_message = chat_messages::Entity::find()
                .filter(chat_messages::Column::SessionId.eq(session.id))
                .filter(chat_messages::Column::IsUser.eq(true))
                .order_by_asc(chat_messages::Column::CreatedAt)
                .order_by_asc(chat_messages::Column::Id)
                .one(&self.db)
                .await
                .map_err(|e| CoreError::internal("Failed to load preview").with_source(e))?;
            let message_count = chat_messages::Entity::find()
                .filter(chat_messages::Column::SessionId.eq(session.id))
                .count(&self.db)
                .await
                .map_err(|e| CoreError::internal("Failed to count messages").with_source(e))?;

            summaries.push(SessionSummary {
                preview: preview(first_user_message.as_ref().map(|m| m.text.as_str())),
                message_count,
                session,
            });
        }
        Ok(summaries)
    }

    /// Session owned by `user_id`; other users' sessions are reported as missing
    pub async fn get_session(&self, user_id: i32, id: i32) -> CoreResult<chat_sessions::Model> {
        chat_sessions::Entity::find_by_id(id)
            .filter(chat_sessions::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to get chat session").with_source(e))?
            .ok_or_else(|| CoreError::not_found("ChatSession", id.to_string()))
    }

    pub async fn get_detail(&self, user_id: i32, id: i32) -> CoreResult<SessionDetail> {
        let session = self.get_session(user_id, id).await?;
        let messages = chat_messages::Entity::find()
            .filter(chat_messages::Column::SessionId.eq(session.id))
            .order_by_asc(chat_messages::Column::CreatedAt)
            .order_by_asc(chat_messages::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to get chat history").with_source(e))?;
        Ok(SessionDetail {
            session,
            messages: messages.into_iter().map(MessageView::from).collect(),
        })
    }

    /// Append a message and bump the session's `updated_at`
    pub async fn add_message(
        &self,
        user_id: i32,
        session_id: i32,
        text: String,
        is_user: bool,
        metadata: Option<serde_json::Value>,
    ) -> CoreResult<chat_messages::Model> {
        let session = self.get_session(user_id, session_id).await?;
        if text.trim().is_empty() {
            return Err(CoreError::validation("text is required").with_field("field", "text"));
        }
        let metadata_json = metadata
            .filter(|value| !value.is_null())
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(|e| CoreError::internal("Failed to encode message metadata").with_source(e))?;

        let now = chrono::Utc::now();
        let message = chat_messages::ActiveModel {
            session_id: Set(session.id),
            text: Set(text),
            is_user: Set(is_user),
            metadata_json: Set(metadata_json),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::internal("Failed to store chat message").with_source(e))?;

        let mut session_active: chat_sessions::ActiveModel = session.into();
        session_active.updated_at = Set(now);
        session_active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to update session activity").with_source(e))?;

        Ok(message)
    }

    pub async fn delete_session(&self, user_id: i32, id: i32) -> CoreResult<()> {
        let session = self.get_session(user_id, id).await?;
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::internal("Failed to start transaction").with_source(e))?;
        Self::remove(&txn, session.id).await?;
        txn.commit()
            .await
            .map_err(|e| CoreError::internal("Failed to commit session removal").with_source(e))
    }

    /// Messages first, then the session row
    async fn remove(txn: &DatabaseTransaction, id: i32) -> CoreResult<()> {
        chat_messages::Entity::delete_many()
            .filter(chat_messages::Column::SessionId.eq(id))
            .exec(txn)
            .await
            .map_err(|e| CoreError::internal("Failed to delete messages").with_source(e))?;
        chat_sessions::Entity::delete_by_id(id)
            .exec(txn)
            .await
            .map_err(|e| CoreError::internal("Failed to delete session").with_source(e))?;
        Ok(())
    }
}
