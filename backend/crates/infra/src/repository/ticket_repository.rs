//! # TicketRepository
//!
//! チケットの永続化を担当するリポジトリ。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ticketdesk_domain::{
    tenant::TenantId,
    ticket::{Ticket, TicketId, TicketTitle},
    user::UserId,
};
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// チケットリポジトリトレイト
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// チケットを登録する
    async fn insert(&self, tx: &mut TxContext, ticket: &Ticket) -> Result<(), InfraError>;

    /// 状態・優先度・部署・カテゴリ・公開設定を更新する
    async fn update(&self, tx: &mut TxContext, ticket: &Ticket) -> Result<(), InfraError>;

    /// ID でチケットを検索（テナント内）
    async fn find_by_id(
        &self,
        id: &TicketId,
        tenant_id: &TenantId,
    ) -> Result<Option<Ticket>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    description: String,
    priority: String,
    status: String,
    is_public: bool,
    department: String,
    category: String,
    reported_by: Uuid,
    reported_by_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = InfraError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket::from_db(
            TicketId::from_uuid(row.id),
            TenantId::from_uuid(row.tenant_id),
            TicketTitle::new(row.title)?,
            row.description,
            row.priority
                .parse()
                .map_err(|e| InfraError::corrupt_row("priority", &row.priority, e))?,
            row.status
                .parse()
                .map_err(|e| InfraError::corrupt_row("status", &row.status, e))?,
            row.is_public,
            row.department,
            row.category,
            UserId::from_uuid(row.reported_by),
            row.reported_by_name,
            row.created_at,
            row.updated_at,
        ))
    }
}

/// PostgreSQL 実装の TicketRepository
#[derive(Debug, Clone)]
pub struct PostgresTicketRepository {
    pool: PgPool,
}

impl PostgresTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for PostgresTicketRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(id = %ticket.id()))]
    async fn insert(&self, tx: &mut TxContext, ticket: &Ticket) -> Result<(), InfraError> {
        let priority: &'static str = ticket.priority().into();
        let status: &'static str = ticket.status().into();
        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, tenant_id, title, description, priority, status, is_public,
                department, category, reported_by, reported_by_name, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(ticket.id().as_uuid())
        .bind(ticket.tenant_id().as_uuid())
        .bind(ticket.title().as_str())
        .bind(ticket.description())
        .bind(priority)
        .bind(status)
        .bind(ticket.is_public())
        .bind(ticket.department())
        .bind(ticket.category())
        .bind(ticket.reported_by().as_uuid())
        .bind(ticket.reported_by_name())
        .bind(ticket.created_at())
        .bind(ticket.updated_at())
        .execute(tx.conn()?)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(id = %ticket.id()))]
    async fn update(&self, tx: &mut TxContext, ticket: &Ticket) -> Result<(), InfraError> {
        let priority: &'static str = ticket.priority().into();
        let status: &'static str = ticket.status().into();
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET priority = $3, status = $4, is_public = $5, department = $6,
                category = $7, updated_at = $8
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(ticket.id().as_uuid())
        .bind(ticket.tenant_id().as_uuid())
        .bind(priority)
        .bind(status)
        .bind(ticket.is_public())
        .bind(ticket.department())
        .bind(ticket.category())
        .bind(ticket.updated_at())
        .execute(tx.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::missing_row("チケット", ticket.id()));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(
        &self,
        id: &TicketId,
        tenant_id: &TenantId,
    ) -> Result<Option<Ticket>, InfraError> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, tenant_id, title, description, priority, status, is_public,
                   department, category, reported_by, reported_by_name, created_at, updated_at
            FROM tickets
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ticket::try_from).transpose()
    }
}
