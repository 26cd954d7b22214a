//! # 通知
//!
//! ドメインイベントから利用者への通知（アプリ内通知 + メール）を組み立てるための
//! ドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`NotificationEvent`] | 通知イベント | 受信者・テナント・種別ごとのペイロード |
//! | [`NotificationPayload`] | 通知ペイロード | 7 種類のイベント種別 |
//! | [`NotificationTemplate`] | アプリ内通知テンプレート | 件名・説明・リンク・アイコン |
//! | [`NotificationRecord`] | アプリ内通知 | 受信者ごとに永続化される通知。既読フラグのみ変更可能 |
//! | [`DeliveryAttempt`] | 配信記録 | メール送信試行 1 回ごとの監査ログ（追記のみ） |
//! | [`EmailDraftInput`] | メール生成入力 | テキスト生成器に渡す構造化データ |
//!
//! ## 設計方針
//!
//! - **全域的な分類**: [`NotificationPayload::classify`] と
//!   [`NotificationPayload::preference_key`] は網羅的な `match` で実装する。
//!   イベント種別を追加するとコンパイルエラーになり、分類の追加漏れを防ぐ
//! - **チャネルの独立**: アプリ内通知は常に作成し、メールは通知設定・
//!   生成能力・組織の SMTP 設定に応じて条件付きで送信する

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::{
    tenant::TenantId,
    ticket::TicketId,
    user::{PreferenceKey, UserId},
};

define_uuid_id! {
    /// アプリ内通知 ID
    pub struct NotificationId;
}

define_uuid_id! {
    /// 配信記録 ID
    pub struct DeliveryAttemptId;
}

/// 通知送信エラー
#[derive(Debug, Error)]
pub enum NotificationError {
    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// 組織の SMTP 設定が無い
    #[error("SMTP settings not configured")]
    NotConfigured,

    /// メール本文の生成に失敗
    #[error("メール本文の生成に失敗: {0}")]
    GenerationFailed(String),

    /// テンプレートの登録・レンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),

    /// アプリ内通知の保存に失敗
    #[error("アプリ内通知の保存に失敗: {0}")]
    StoreFailed(String),

    /// 受信者プロファイル・組織の取得に失敗
    #[error("受信者情報の取得に失敗: {0}")]
    RecipientLookupFailed(String),
}

/// 通知イベント種別
///
/// 永続化・生成器への入力で使う識別子。camelCase でシリアライズされる。
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
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum NotificationKind {
    NewUserPending,
    TicketCreated,
    TicketComment,
    TicketResolved,
    UserApproved,
    TicketAssigned,
    UserProfileUpdated,
}

/// アプリ内通知のアイコン種別
///
/// 画面側が参照するアイコン名でシリアライズする。
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
pub enum IconKind {
    #[serde(rename = "shieldAlert")]
    #[strum(serialize = "shieldAlert")]
    Alert,
    #[serde(rename = "messageSquare")]
    #[strum(serialize = "messageSquare")]
    Message,
    #[serde(rename = "checkCircle")]
    #[strum(serialize = "checkCircle")]
    Check,
    #[serde(rename = "userPlus")]
    #[strum(serialize = "userPlus")]
    UserPlus,
    #[serde(rename = "userCheck")]
    #[strum(serialize = "userCheck")]
    UserCheck,
}

/// 通知イベント種別ごとのペイロード
///
/// 各バリアントは表示に必要なフィールドのみを持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPayload {
    /// 新規ユーザーの承認待ち → 組織の全管理者へ
    NewUserPending { new_user_name: String },
    /// チケット起票 → 担当部署の責任者へ
    TicketCreated {
        ticket_id:    TicketId,
        ticket_title: String,
    },
    /// コメント投稿 → 起票者へ（本人のコメントを除く）
    TicketComment {
        ticket_id:      TicketId,
        ticket_title:   String,
        commenter_name: String,
    },
    /// チケット解決 → 起票者へ
    TicketResolved {
        ticket_id:    TicketId,
        ticket_title: String,
    },
    /// アカウント承認 → 本人へ
    UserApproved,
    /// 部署の付け替え → 新しい部署の責任者へ
    TicketAssigned {
        ticket_id:    TicketId,
        ticket_title: String,
    },
    /// ロール・部署の変更 → 本人へ
    UserProfileUpdated,
}

/// アプリ内通知テンプレート（分類結果）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplate {
    pub title:       String,
    pub description: String,
    pub link:        String,
    pub icon:        IconKind,
}

fn ticket_link(ticket_id: &TicketId) -> String {
    format!("/dashboard/tickets/{ticket_id}")
}

impl NotificationPayload {
    /// イベント種別を返す
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::NewUserPending { .. } => NotificationKind::NewUserPending,
            Self::TicketCreated { .. } => NotificationKind::TicketCreated,
            Self::TicketComment { .. } => NotificationKind::TicketComment,
            Self::TicketResolved { .. } => NotificationKind::TicketResolved,
            Self::UserApproved => NotificationKind::UserApproved,
            Self::TicketAssigned { .. } => NotificationKind::TicketAssigned,
            Self::UserProfileUpdated => NotificationKind::UserProfileUpdated,
        }
    }

    /// メール送信可否の判定に使う通知設定キー
    pub fn preference_key(&self) -> PreferenceKey {
        match self {
            Self::NewUserPending { .. } => PreferenceKey::UserApprovals,
            Self::TicketComment { .. } => PreferenceKey::NewComments,
            Self::TicketCreated { .. }
            | Self::TicketResolved { .. }
            | Self::UserApproved
            | Self::TicketAssigned { .. }
            | Self::UserProfileUpdated => PreferenceKey::TicketUpdates,
        }
    }

    /// アプリ内通知のテンプレートに分類する
    ///
    /// 純粋関数。すべての種別について空でない件名・説明・リンクを返す。
    pub fn classify(&self) -> NotificationTemplate {
        match self {
            Self::TicketCreated {
                ticket_id,
                ticket_title,
            } => NotificationTemplate {
                title:       format!("New Ticket: \"{ticket_title}\""),
                description: "A new ticket has been created in your department.".to_string(),
                link:        ticket_link(ticket_id),
                icon:        IconKind::Alert,
            },
            Self::TicketComment {
                ticket_id,
                ticket_title,
                commenter_name,
            } => NotificationTemplate {
                title:       format!("New Comment on \"{ticket_title}\""),
                description: format!("{commenter_name} added a new comment."),
                link:        ticket_link(ticket_id),
                icon:        IconKind::Message,
            },
            Self::TicketResolved {
                ticket_id,
                ticket_title,
            } => NotificationTemplate {
                title:       format!("Ticket Resolved: \"{ticket_title}\""),
                description: "Your ticket has been marked as resolved.".to_string(),
                link:        ticket_link(ticket_id),
                icon:        IconKind::Check,
            },
            Self::UserApproved => NotificationTemplate {
                title:       "Account Approved".to_string(),
                description: "Your account has been approved. Welcome aboard!".to_string(),
                link:        "/dashboard".to_string(),
                icon:        IconKind::UserPlus,
            },
            Self::NewUserPending { new_user_name } => NotificationTemplate {
                title:       "New User Pending Approval".to_string(),
                description: format!("{new_user_name} has registered and is awaiting approval."),
                link:        "/dashboard/admin/users".to_string(),
                icon:        IconKind::UserCheck,
            },
            Self::TicketAssigned {
                ticket_id,
                ticket_title,
            } => NotificationTemplate {
                title:       format!("Ticket Assigned: \"{ticket_title}\""),
                description: "A ticket has been assigned to your department.".to_string(),
                link:        ticket_link(ticket_id),
                icon:        IconKind::Alert,
            },
            Self::UserProfileUpdated => NotificationTemplate {
                title:       "Your Profile Was Updated".to_string(),
                description: "An administrator has updated your role or department.".to_string(),
                link:        "/dashboard/settings".to_string(),
                icon:        IconKind::UserCheck,
            },
        }
    }

    /// 対象チケットの ID と件名
    pub fn ticket(&self) -> Option<(&TicketId, &str)> {
        match self {
            Self::TicketCreated {
                ticket_id,
                ticket_title,
            }
            | Self::TicketComment {
                ticket_id,
                ticket_title,
                ..
            }
            | Self::TicketResolved {
                ticket_id,
                ticket_title,
            }
            | Self::TicketAssigned {
                ticket_id,
                ticket_title,
            } => Some((ticket_id, ticket_title)),
            Self::NewUserPending { .. } | Self::UserApproved | Self::UserProfileUpdated => None,
        }
    }
}

/// 通知イベント
///
/// 受信者 1 名・テナント 1 つに対する 1 回分のディスパッチ要求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub recipient_user_id: UserId,
    pub tenant_id:         TenantId,
    pub payload:           NotificationPayload,
}

impl NotificationEvent {
    pub fn new(
        recipient_user_id: UserId,
        tenant_id: TenantId,
        payload: NotificationPayload,
    ) -> Self {
        Self {
            recipient_user_id,
            tenant_id,
            payload,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }
}

/// アプリ内通知レコード
///
/// 受信者ごとに 1 ディスパッチ 1 件作成される。作成後に変更できるのは `read` のみ。
/// フィールド名は画面側が参照するため camelCase で固定する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id:          NotificationId,
    pub user_id:     UserId,
    pub title:       String,
    pub description: String,
    pub link:        String,
    #[serde(rename = "iconName")]
    pub icon:        IconKind,
    pub read:        bool,
    pub created_at:  DateTime<Utc>,
}

impl NotificationRecord {
    /// テンプレートから未読のレコードを作成する
    pub fn unread(user_id: UserId, template: NotificationTemplate, now: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            title: template.title,
            description: template.description,
            link: template.link,
            icon: template.icon,
            read: false,
            created_at: now,
        }
    }

    /// テンプレート部分を取り出す
    pub fn template(&self) -> NotificationTemplate {
        NotificationTemplate {
            title:       self.title.clone(),
            description: self.description.clone(),
            link:        self.link.clone(),
            icon:        self.icon,
        }
    }
}

/// 配信結果
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
pub enum DeliveryStatus {
    Success,
    Failure,
    /// 送信を行わないバックエンド（Noop）で処理された
    Skipped,
}

/// メール配信記録（組織ごとの追記専用ログ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAttempt {
    pub id:        DeliveryAttemptId,
    pub tenant_id: TenantId,
    pub to:        String,
    pub subject:   String,
    pub status:    DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:     Option<String>,
    pub sent_at:   DateTime<Utc>,
}

impl DeliveryAttempt {
    pub fn success(
        tenant_id: TenantId,
        to: impl Into<String>,
        subject: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeliveryAttemptId::new(),
            tenant_id,
            to: to.into(),
            subject: subject.into(),
            status: DeliveryStatus::Success,
            error: None,
            sent_at,
        }
    }

    pub fn failure(
        tenant_id: TenantId,
        to: impl Into<String>,
        subject: impl Into<String>,
        error: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeliveryAttemptId::new(),
            tenant_id,
            to: to.into(),
            subject: subject.into(),
            status: DeliveryStatus::Failure,
            error: Some(error.into()),
            sent_at,
        }
    }

    pub fn skipped(
        tenant_id: TenantId,
        to: impl Into<String>,
        subject: impl Into<String>,
        reason: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: DeliveryStatus::Skipped,
            ..Self::failure(tenant_id, to, subject, reason, sent_at)
        }
    }
}

/// メールメッセージ
///
/// テキスト生成の出力を宛先と組み合わせたもの。`MailTransport` に渡される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
}

/// テキスト生成器の出力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    /// HTML 本文
    pub body:    String,
}

/// テキスト生成器への入力
///
/// 通知ペイロードを受信者名・組織名と合わせて平坦化したもの。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraftInput {
    pub notification_type: NotificationKind,
    pub user_name:         String,
    pub org_name:          String,
    /// アプリ内通知と同じ遷移先（相対パス）
    pub link:              String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id:         Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_title:      Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commenter_name:    Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_user_name:     Option<String>,
}

impl EmailDraftInput {
    pub fn new(
        payload: &NotificationPayload,
        user_name: impl Into<String>,
        org_name: impl Into<String>,
    ) -> Self {
        let (ticket_id, ticket_title) = payload
            .ticket()
            .map(|(id, title)| (Some(id.to_string()), Some(title.to_string())))
            .unwrap_or((None, None));

        Self {
            notification_type: payload.kind(),
            user_name: user_name.into(),
            org_name: org_name.into(),
            link: payload.classify().link,
            ticket_id,
            ticket_title,
            commenter_name: match payload {
                NotificationPayload::TicketComment { commenter_name, .. } => {
                    Some(commenter_name.clone())
                }
                _ => None,
            },
            new_user_name: match payload {
                NotificationPayload::NewUserPending { new_user_name } => {
                    Some(new_user_name.clone())
                }
                _ => None,
            },
        }
    }
}
