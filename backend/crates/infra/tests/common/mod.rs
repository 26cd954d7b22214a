//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用するエンティティ生成・シードデータ作成ヘルパー。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use ticketdesk_domain::{
    notification::{NotificationPayload, NotificationRecord},
    tenant::{Organization, SmtpSettings, TenantId, TenantName},
    ticket::TicketId,
    user::{Email, NewUserProfile, UserId, UserName, UserProfile, UserRole, UserStatus},
};
use ticketdesk_infra::{
    db::{PgTransactionManager, TransactionManager},
    repository::{
        OrganizationRepository,
        PostgresOrganizationRepository,
        PostgresUserProfileRepository,
        UserProfileRepository,
    },
};

/// テスト用の固定日時
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// SMTP 設定付きの組織を作成する
pub fn test_organization() -> Organization {
    Organization::from_db(
        TenantId::new(),
        TenantName::new("Acme").unwrap(),
        Some(SmtpSettings {
            host:         "smtp.acme.test".to_string(),
            port:         Some(465),
            username:     "noreply@acme.test".to_string(),
            password:     "secret".to_string(),
            from_address: Some("support@acme.test".to_string()),
        }),
    )
}

/// テスト用プロファイルを作成する（未保存）
pub fn test_profile(tenant_id: &TenantId, email: &str, role: UserRole) -> UserProfile {
    UserProfile::new(NewUserProfile {
        id: UserId::new(),
        tenant_id: tenant_id.clone(),
        email: Email::new(email).unwrap(),
        name: UserName::new("山田花子").unwrap(),
        role,
        status: UserStatus::Active,
        department: Some("総務".to_string()),
        now: test_now(),
    })
}

/// 組織とユーザーを DB に作成する
pub async fn setup_test_data(pool: &PgPool) -> (Organization, UserProfile) {
    let organization = test_organization();
    PostgresOrganizationRepository::new(pool.clone())
        .insert(&organization)
        .await
        .expect("組織作成に失敗");

    let profile =
        insert_profile(pool, organization.id(), "hanako@acme.test", UserRole::Employee).await;

    (organization, profile)
}

/// プロファイルを DB に作成する
pub async fn insert_profile(
    pool: &PgPool,
    tenant_id: &TenantId,
    email: &str,
    role: UserRole,
) -> UserProfile {
    let profile = test_profile(tenant_id, email, role);
    let mut tx = PgTransactionManager::new(pool.clone())
        .begin()
        .await
        .expect("トランザクション開始に失敗");
    PostgresUserProfileRepository::new(pool.clone())
        .insert(&mut tx, &profile)
        .await
        .expect("プロファイル作成に失敗");
    tx.commit().await.expect("コミットに失敗");
    profile
}

/// `minutes_ago` 分前に作成された未読の解決通知
pub fn resolved_record(user_id: &UserId, title: &str, minutes_ago: i64) -> NotificationRecord {
    NotificationRecord::unread(
        user_id.clone(),
        NotificationPayload::TicketResolved {
            ticket_id:    TicketId::new(),
            ticket_title: title.to_string(),
        }
        .classify(),
        test_now() - Duration::minutes(minutes_ago),
    )
}
