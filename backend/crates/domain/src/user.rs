//! # ユーザープロファイル
//!
//! 組織に所属するユーザーと、その通知設定を定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`UserProfile`] | ユーザープロファイル | ロール・部署・状態・通知設定を持つ |
//! | [`UserRole`] | ロール | 管理者 / 部署責任者 / 従業員 |
//! | [`UserStatus`] | ユーザー状態 | 有効 / 承認待ち / 無効 |
//! | [`NotificationPreferences`] | 通知設定 | メール通知の種別ごとの ON/OFF |
//! | [`PreferenceKey`] | 通知設定キー | 通知イベントがどの設定項目に従うか |
//!
//! ## 通知設定の既定値
//!
//! 各項目は独立した `Option<bool>` で保持する。未設定（`None`）の場合、
//! `ticket_updates` と `new_comments` は ON、`user_approvals` は OFF として扱う。
//! プロファイル作成時の初期値はロールによって異なる（[`NotificationPreferences::for_role`]）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, tenant::TenantId};

define_uuid_id! {
    /// ユーザー ID（一意識別子）
    pub struct UserId;
}

define_validated_string! {
    /// ユーザー表示名
    pub struct UserName {
        label: "ユーザー名",
        max_length: 100,
    }
}

/// メールアドレス（値オブジェクト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - `local@domain` の形式
    /// - 最大 255 文字
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザーロール
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    /// 管理者: 組織全体の管理、ユーザー承認
    Admin,
    /// 部署責任者: 担当部署のチケット対応
    Supervisor,
    /// 従業員: チケットの起票
    Employee,
}

/// ユーザーステータス
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserStatus {
    /// 有効
    Active,
    /// 管理者の承認待ち（自己登録直後）
    Pending,
    /// 無効（停止中）
    Inactive,
}

/// 通知設定キー
///
/// 通知イベントの種別ごとに、受信者のどの設定項目を参照するかを表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum PreferenceKey {
    TicketUpdates,
    NewComments,
    UserApprovals,
}

/// メール通知設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_updates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_comments:   Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_approvals: Option<bool>,
}

impl NotificationPreferences {
    /// プロファイル作成時の初期値
    ///
    /// 管理者は 3 項目すべて ON。それ以外は `user_approvals` を設定しない。
    pub fn for_role(role: UserRole) -> Self {
        Self {
            ticket_updates: Some(true),
            new_comments:   Some(true),
            user_approvals: match role {
                UserRole::Admin => Some(true),
                UserRole::Supervisor | UserRole::Employee => None,
            },
        }
    }

    /// 指定キーのメール通知が許可されているか
    pub fn allows(&self, key: PreferenceKey) -> bool {
        match key {
            PreferenceKey::TicketUpdates => self.ticket_updates.unwrap_or(true),
            PreferenceKey::NewComments => self.new_comments.unwrap_or(true),
            PreferenceKey::UserApprovals => self.user_approvals.unwrap_or(false),
        }
    }
}

/// 新規プロファイルの作成パラメータ
pub struct NewUserProfile {
    pub id:         UserId,
    pub tenant_id:  TenantId,
    pub email:      Email,
    pub name:       UserName,
    pub role:       UserRole,
    pub status:     UserStatus,
    pub department: Option<String>,
    pub now:        DateTime<Utc>,
}

/// ユーザープロファイルエンティティ
///
/// # 不変条件
///
/// - `tenant_id` は作成後に変わらない
/// - 通知設定は項目ごとに独立して変更される
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    id: UserId,
    tenant_id: TenantId,
    email: Email,
    name: UserName,
    role: UserRole,
    status: UserStatus,
    department: Option<String>,
    notification_preferences: NotificationPreferences,
    created_at: DateTime<Utc>,
}

impl UserProfile {
    /// 新しいプロファイルを作成する（通知設定はロールに応じた初期値）
    pub fn new(params: NewUserProfile) -> Self {
        Self {
            notification_preferences: NotificationPreferences::for_role(params.role),
            id: params.id,
            tenant_id: params.tenant_id,
            email: params.email,
            name: params.name,
            role: params.role,
            status: params.status,
            department: params.department,
            created_at: params.now,
        }
    }

    /// 永続化層からプロファイルを復元する
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: UserId,
        tenant_id: TenantId,
        email: Email,
        name: UserName,
        role: UserRole,
        status: UserStatus,
        department: Option<String>,
        notification_preferences: NotificationPreferences,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            email,
            name,
            role,
            status,
            department,
            notification_preferences,
            created_at,
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> &UserName {
        &self.name
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    pub fn notification_preferences(&self) -> &NotificationPreferences {
        &self.notification_preferences
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// チケットの状態・担当部署を変更できるか（管理者と責任者）
    pub fn can_manage_tickets(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Supervisor)
    }

    /// 承認待ちのユーザーを有効化する
    pub fn approve(self) -> Result<Self, DomainError> {
        if self.status != UserStatus::Pending {
            return Err(DomainError::InvalidTransition(format!(
                "承認待ちではないユーザーは承認できません（現在: {}）",
                self.status
            )));
        }
        Ok(Self {
            status: UserStatus::Active,
            ..self
        })
    }

    /// ロールと部署を変更する
    ///
    /// 戻り値の `bool` はいずれかが実際に変わったかどうか。
    pub fn reassign(self, role: UserRole, department: Option<String>) -> (Self, bool) {
        let changed = self.role != role || self.department != department;
        (
            Self {
                role,
                department,
                ..self
            },
            changed,
        )
    }

    /// 通知設定を置き換える
    pub fn with_notification_preferences(self, preferences: NotificationPreferences) -> Self {
        Self {
            notification_preferences: preferences,
            ..self
        }
    }
}
