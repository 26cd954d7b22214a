//! # TicketCommentRepository
//!
//! チケットコメントの永続化を担当するリポジトリ。コメントは追記のみ。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ticketdesk_domain::{
    ticket::{CommentBody, NewTicketComment, TicketComment, TicketCommentId, TicketId},
    user::UserId,
};
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// コメントリポジトリトレイト
#[async_trait]
pub trait TicketCommentRepository: Send + Sync {
    /// コメントを登録する
    async fn insert(&self, tx: &mut TxContext, comment: &TicketComment) -> Result<(), InfraError>;

    /// チケットのコメントを投稿順に取得
    async fn find_by_ticket(&self, ticket_id: &TicketId) -> Result<Vec<TicketComment>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct TicketCommentRow {
    id:          Uuid,
    ticket_id:   Uuid,
    author_id:   Uuid,
    author_name: String,
    body:        String,
    created_at:  DateTime<Utc>,
}

impl TryFrom<TicketCommentRow> for TicketComment {
    type Error = InfraError;

    fn try_from(row: TicketCommentRow) -> Result<Self, Self::Error> {
        Ok(TicketComment::new(NewTicketComment {
            id:          TicketCommentId::from_uuid(row.id),
            ticket_id:   TicketId::from_uuid(row.ticket_id),
            author_id:   UserId::from_uuid(row.author_id),
            author_name: row.author_name,
            body:        CommentBody::new(row.body)?,
            now:         row.created_at,
        }))
    }
}

/// PostgreSQL 実装の TicketCommentRepository
#[derive(Debug, Clone)]
pub struct PostgresTicketCommentRepository {
    pool: PgPool,
}

impl PostgresTicketCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketCommentRepository for PostgresTicketCommentRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(id = %comment.id()))]
    async fn insert(&self, tx: &mut TxContext, comment: &TicketComment) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO ticket_comments (id, ticket_id, author_id, author_name, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(comment.id().as_uuid())
        .bind(comment.ticket_id().as_uuid())
        .bind(comment.author_id().as_uuid())
        .bind(comment.author_name())
        .bind(comment.body().as_str())
        .bind(comment.created_at())
        .execute(tx.conn()?)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%ticket_id))]
    async fn find_by_ticket(&self, ticket_id: &TicketId) -> Result<Vec<TicketComment>, InfraError> {
        let rows = sqlx::query_as::<_, TicketCommentRow>(
            r#"
            SELECT id, ticket_id, author_id, author_name, body, created_at
            FROM ticket_comments
            WHERE ticket_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(ticket_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TicketComment::try_from).collect()
    }
}
