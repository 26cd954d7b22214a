//! # OrganizationRepository
//!
//! 組織（テナント）レコードの取得を担当するリポジトリ。
//! 組織ごとの SMTP 認証情報もこのレコードが保持する。

use async_trait::async_trait;
use sqlx::PgPool;
use ticketdesk_domain::tenant::{Organization, SmtpSettings, TenantId, TenantName};
use uuid::Uuid;

use crate::error::InfraError;

/// 組織リポジトリトレイト
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// ID で組織を検索
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Organization>, InfraError>;

    /// 組織を登録する
    async fn insert(&self, organization: &Organization) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id:        Uuid,
    name:      String,
    smtp_host: Option<String>,
    smtp_port: Option<i32>,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    smtp_from: Option<String>,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = InfraError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        // 一部だけ設定された SMTP 設定もそのまま復元し、送信可否は
        // `Organization::mail_credentials` で判定する
        let smtp = match (&row.smtp_host, &row.smtp_user, &row.smtp_pass) {
            (None, None, None) => None,
            _ => Some(SmtpSettings {
                host:         row.smtp_host.unwrap_or_default(),
                port:         row.smtp_port.and_then(|port| u16::try_from(port).ok()),
                username:     row.smtp_user.unwrap_or_default(),
                password:     row.smtp_pass.unwrap_or_default(),
                from_address: row.smtp_from,
            }),
        };

        Ok(Organization::from_db(
            TenantId::from_uuid(row.id),
            TenantName::new(row.name)?,
            smtp,
        ))
    }
}

/// PostgreSQL 実装の OrganizationRepository
#[derive(Debug, Clone)]
pub struct PostgresOrganizationRepository {
    pool: PgPool,
}

impl PostgresOrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Organization>, InfraError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT id, name, smtp_host, smtp_port, smtp_user, smtp_pass, smtp_from
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Organization::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(id = %organization.id()))]
    async fn insert(&self, organization: &Organization) -> Result<(), InfraError> {
        let smtp = organization.smtp();
        sqlx::query(
            r#"
            INSERT INTO organizations (
                id, name, smtp_host, smtp_port, smtp_user, smtp_pass, smtp_from
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(organization.id().as_uuid())
        .bind(organization.name().as_str())
        .bind(smtp.map(|s| s.host.clone()))
        .bind(smtp.and_then(|s| s.port).map(i32::from))
        .bind(smtp.map(|s| s.username.clone()))
        .bind(smtp.map(|s| s.password.clone()))
        .bind(smtp.and_then(|s| s.from_address.clone()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(host: Option<&str>, port: Option<i32>) -> OrganizationRow {
        OrganizationRow {
            id:        Uuid::now_v7(),
            name:      "Acme".to_string(),
            smtp_host: host.map(str::to_string),
            smtp_port: port,
            smtp_user: host.map(|_| "noreply@acme.test".to_string()),
            smtp_pass: host.map(|_| "secret".to_string()),
            smtp_from: None,
        }
    }

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresOrganizationRepository>();
    }

    #[test]
    fn test_smtp列がすべてnullなら設定なしとして復元する() {
        let org = Organization::try_from(row(None, None)).unwrap();
        assert!(org.smtp().is_none());
    }

    #[test]
    fn test_範囲外のポート番号は未指定として扱う() {
        let org = Organization::try_from(row(Some("smtp.acme.test"), Some(70_000))).unwrap();
        let smtp = org.mail_credentials().unwrap();

        assert_eq!(smtp.port, None);
        assert_eq!(smtp.effective_port(), 587);
    }

    #[test]
    fn test_差出人アドレス列を復元する() {
        let org = Organization::try_from(OrganizationRow {
            smtp_user: Some("apikey".to_string()),
            smtp_from: Some("noreply@acme.test".to_string()),
            ..row(Some("smtp.sendgrid.net"), None)
        })
        .unwrap();

        assert_eq!(
            org.sender_mailbox().as_deref(),
            Some("\"Acme\" <noreply@acme.test>")
        );
    }
}
