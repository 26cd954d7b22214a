//! # DeliveryLogRepository
//!
//! メール配信記録（組織ごとの追記専用ログ）の永続化を担当するリポジトリ。
//!
//! 送信成功・失敗・SMTP 未設定・本文生成失敗のいずれも 1 試行 1 行で記録する。
//! 記録済みの行は更新・削除しない。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ticketdesk_domain::{
    notification::{DeliveryAttempt, DeliveryAttemptId},
    tenant::TenantId,
};
use uuid::Uuid;

use crate::error::InfraError;

/// 配信記録リポジトリトレイト
#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    /// 配信記録を追記する
    async fn insert(&self, attempt: &DeliveryAttempt) -> Result<(), InfraError>;

    /// 組織の配信記録を新しい順に最大 `limit` 件取得
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct DeliveryAttemptRow {
    id:        Uuid,
    tenant_id: Uuid,
    recipient: String,
    subject:   String,
    status:    String,
    error:     Option<String>,
    sent_at:   DateTime<Utc>,
}

impl TryFrom<DeliveryAttemptRow> for DeliveryAttempt {
    type Error = InfraError;

    fn try_from(row: DeliveryAttemptRow) -> Result<Self, Self::Error> {
        Ok(DeliveryAttempt {
            id:        DeliveryAttemptId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            to:        row.recipient,
            subject:   row.subject,
            status:    row
                .status
                .parse()
                .map_err(|e| InfraError::corrupt_row("status", &row.status, e))?,
            error:     row.error,
            sent_at:   row.sent_at,
        })
    }
}

/// PostgreSQL 実装の DeliveryLogRepository
#[derive(Debug, Clone)]
pub struct PostgresDeliveryLogRepository {
    pool: PgPool,
}

impl PostgresDeliveryLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLogRepository for PostgresDeliveryLogRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(tenant_id = %attempt.tenant_id))]
    async fn insert(&self, attempt: &DeliveryAttempt) -> Result<(), InfraError> {
        let status: &'static str = attempt.status.into();
        sqlx::query(
            r#"
            INSERT INTO email_logs (id, tenant_id, recipient, subject, status, error, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.tenant_id.as_uuid())
        .bind(&attempt.to)
        .bind(&attempt.subject)
        .bind(status)
        .bind(attempt.error.as_deref())
        .bind(attempt.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id))]
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>, InfraError> {
        let rows = sqlx::query_as::<_, DeliveryAttemptRow>(
            r#"
            SELECT id, tenant_id, recipient, subject, status, error, sent_at
            FROM email_logs
            WHERE tenant_id = $1
            ORDER BY sent_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeliveryAttempt::try_from).collect()
    }
}
