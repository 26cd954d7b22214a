//! # UserProfileRepository
//!
//! ユーザープロファイル（ロール・部署・状態・通知設定）の永続化を担当するリポジトリ。
//!
//! 通知設定は JSONB 列に項目ごとの `Option<bool>` として保存する。
//! 未設定の項目は列に現れず、読み出し時に `None` として復元される。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};
use ticketdesk_domain::{
    tenant::TenantId,
    user::{Email, NotificationPreferences, UserId, UserName, UserProfile, UserRole},
};
use uuid::Uuid;

use crate::{db::TxContext, error::InfraError};

/// ユーザープロファイルリポジトリトレイト
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    /// ID でプロファイルを検索
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, InfraError>;

    /// テナント内の指定ロールのプロファイルをすべて取得
    async fn find_by_tenant_and_role(
        &self,
        tenant_id: &TenantId,
        role: UserRole,
    ) -> Result<Vec<UserProfile>, InfraError>;

    /// プロファイルを登録する
    async fn insert(&self, tx: &mut TxContext, profile: &UserProfile) -> Result<(), InfraError>;

    /// ロール・部署・状態・通知設定を更新する
    async fn update(&self, tx: &mut TxContext, profile: &UserProfile) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct UserProfileRow {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    name: String,
    role: String,
    status: String,
    department: Option<String>,
    notification_preferences: Json<NotificationPreferences>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserProfileRow> for UserProfile {
    type Error = InfraError;

    fn try_from(row: UserProfileRow) -> Result<Self, Self::Error> {
        Ok(UserProfile::from_db(
            UserId::from_uuid(row.id),
            TenantId::from_uuid(row.tenant_id),
            Email::new(row.email)?,
            UserName::new(row.name)?,
            row.role
                .parse()
                .map_err(|e| InfraError::corrupt_row("role", &row.role, e))?,
            row.status
                .parse()
                .map_err(|e| InfraError::corrupt_row("status", &row.status, e))?,
            row.department,
            row.notification_preferences.0,
            row.created_at,
        ))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, tenant_id, email, name, role, status, department,
           notification_preferences, created_at
    FROM user_profiles
"#;

/// PostgreSQL 実装の UserProfileRepository
#[derive(Debug, Clone)]
pub struct PostgresUserProfileRepository {
    pool: PgPool,
}

impl PostgresUserProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserProfileRepository for PostgresUserProfileRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, InfraError> {
        let row = sqlx::query_as::<_, UserProfileRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserProfile::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id, %role))]
    async fn find_by_tenant_and_role(
        &self,
        tenant_id: &TenantId,
        role: UserRole,
    ) -> Result<Vec<UserProfile>, InfraError> {
        let role: &'static str = role.into();
        let rows = sqlx::query_as::<_, UserProfileRow>(&format!(
            "{SELECT_COLUMNS} WHERE tenant_id = $1 AND role = $2 ORDER BY created_at"
        ))
        .bind(tenant_id.as_uuid())
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(id = %profile.id()))]
    async fn insert(&self, tx: &mut TxContext, profile: &UserProfile) -> Result<(), InfraError> {
        let role: &'static str = profile.role().into();
        let status: &'static str = profile.status().into();
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                id, tenant_id, email, name, role, status, department,
                notification_preferences, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(profile.id().as_uuid())
        .bind(profile.tenant_id().as_uuid())
        .bind(profile.email().as_str())
        .bind(profile.name().as_str())
        .bind(role)
        .bind(status)
        .bind(profile.department())
        .bind(Json(profile.notification_preferences()))
        .bind(profile.created_at())
        .execute(tx.conn()?)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(id = %profile.id()))]
    async fn update(&self, tx: &mut TxContext, profile: &UserProfile) -> Result<(), InfraError> {
        let role: &'static str = profile.role().into();
        let status: &'static str = profile.status().into();
        let result = sqlx::query(
            r#"
            UPDATE user_profiles
            SET role = $2, status = $3, department = $4, notification_preferences = $5
            WHERE id = $1 AND tenant_id = $6
            "#,
        )
        .bind(profile.id().as_uuid())
        .bind(role)
        .bind(status)
        .bind(profile.department())
        .bind(Json(profile.notification_preferences()))
        .bind(profile.tenant_id().as_uuid())
        .execute(tx.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::missing_row("プロファイル", profile.id()));
        }

        Ok(())
    }
}
