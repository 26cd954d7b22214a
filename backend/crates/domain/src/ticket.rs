//! # チケット
//!
//! 苦情・問い合わせチケットと、その担当部署・コメントを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`Ticket`] | チケット | 従業員が起票する苦情・問い合わせ |
//! | [`TicketStatus`] | チケット状態 | 未対応 → 対応中 → 解決済み |
//! | [`Department`] | 部署 | チケットの担当単位。責任者（supervisor）を 1 名持てる |
//! | [`TicketComment`] | コメント | チケット上のやり取り |
//! | [`TicketChange`] | 変更差分 | 更新前後の比較結果。通知の要否判定に使う |
//!
//! ## 設計方針
//!
//! 通知の要否は「更新後の値」ではなく「更新前後の差分」で判定する。
//! 解決済みのチケットを再度解決済みにしても、解決通知は送らない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{tenant::TenantId, user::UserId};

define_uuid_id! {
    /// チケット ID
    pub struct TicketId;
}

define_uuid_id! {
    /// 部署 ID
    pub struct DepartmentId;
}

define_uuid_id! {
    /// コメント ID
    pub struct TicketCommentId;
}

define_validated_string! {
    /// チケット件名
    pub struct TicketTitle {
        label: "件名",
        max_length: 200,
    }
}

define_validated_string! {
    /// コメント本文
    pub struct CommentBody {
        label: "コメント本文",
        max_length: 5000,
    }
}

/// チケット状態
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

/// チケット優先度
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// 部署
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    pub id:              DepartmentId,
    pub tenant_id:       TenantId,
    pub name:            String,
    pub supervisor_id:   Option<UserId>,
    pub supervisor_name: Option<String>,
}

/// 新規チケットの作成パラメータ
pub struct NewTicket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub title: TicketTitle,
    pub description: String,
    pub priority: TicketPriority,
    pub is_public: bool,
    pub department: String,
    pub category: String,
    pub reported_by: UserId,
    pub reported_by_name: String,
    pub now: DateTime<Utc>,
}

/// チケットの部分更新
///
/// `None` の項目は変更しない。
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status:     Option<TicketStatus>,
    pub priority:   Option<TicketPriority>,
    pub department: Option<String>,
    pub category:   Option<String>,
    pub is_public:  Option<bool>,
}

/// チケットエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    tenant_id: TenantId,
    title: TicketTitle,
    description: String,
    priority: TicketPriority,
    status: TicketStatus,
    is_public: bool,
    department: String,
    category: String,
    reported_by: UserId,
    reported_by_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Ticket {
    /// 新しいチケットを作成する（状態は `Open`）
    pub fn new(params: NewTicket) -> Self {
        Self {
            id: params.id,
            tenant_id: params.tenant_id,
            title: params.title,
            description: params.description,
            priority: params.priority,
            status: TicketStatus::Open,
            is_public: params.is_public,
            department: params.department,
            category: params.category,
            reported_by: params.reported_by,
            reported_by_name: params.reported_by_name,
            created_at: params.now,
            updated_at: params.now,
        }
    }

    /// 永続化層からチケットを復元する
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: TicketId,
        tenant_id: TenantId,
        title: TicketTitle,
        description: String,
        priority: TicketPriority,
        status: TicketStatus,
        is_public: bool,
        department: String,
        category: String,
        reported_by: UserId,
        reported_by_name: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            title,
            description,
            priority,
            status,
            is_public,
            department,
            category,
            reported_by,
            reported_by_name,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &TicketId {
        &self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn title(&self) -> &TicketTitle {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> TicketPriority {
        self.priority
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn reported_by(&self) -> &UserId {
        &self.reported_by
    }

    pub fn reported_by_name(&self) -> &str {
        &self.reported_by_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 部分更新を適用し、更新後のチケットと変更差分を返す
    pub fn apply(self, update: TicketUpdate, now: DateTime<Utc>) -> (Self, TicketChange) {
        let change = TicketChange {
            previous_status:     self.status,
            current_status:      update.status.unwrap_or(self.status),
            previous_department: self.department.clone(),
            current_department:  update
                .department
                .clone()
                .unwrap_or_else(|| self.department.clone()),
        };

        let updated = Self {
            status:     change.current_status,
            priority:   update.priority.unwrap_or(self.priority),
            department: change.current_department.clone(),
            category:   update.category.unwrap_or(self.category),
            is_public:  update.is_public.unwrap_or(self.is_public),
            updated_at: now,
            ..self
        };

        (updated, change)
    }
}

/// チケット更新の前後差分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketChange {
    pub previous_status:     TicketStatus,
    pub current_status:      TicketStatus,
    pub previous_department: String,
    pub current_department:  String,
}

impl TicketChange {
    /// 未解決 → 解決済みへの遷移か
    pub fn is_resolution(&self) -> bool {
        self.previous_status != TicketStatus::Resolved
            && self.current_status == TicketStatus::Resolved
    }

    /// 担当部署が変わった場合、新しい部署名を返す
    pub fn reassigned_department(&self) -> Option<&str> {
        (self.previous_department != self.current_department)
            .then_some(self.current_department.as_str())
    }
}

/// 新規コメントの作成パラメータ
pub struct NewTicketComment {
    pub id:          TicketCommentId,
    pub ticket_id:   TicketId,
    pub author_id:   UserId,
    pub author_name: String,
    pub body:        CommentBody,
    pub now:         DateTime<Utc>,
}

/// チケットコメント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketComment {
    id:          TicketCommentId,
    ticket_id:   TicketId,
    author_id:   UserId,
    author_name: String,
    body:        CommentBody,
    created_at:  DateTime<Utc>,
}

impl TicketComment {
    pub fn new(params: NewTicketComment) -> Self {
        Self {
            id:          params.id,
            ticket_id:   params.ticket_id,
            author_id:   params.author_id,
            author_name: params.author_name,
            body:        params.body,
            created_at:  params.now,
        }
    }

    pub fn id(&self) -> &TicketCommentId {
        &self.id
    }

    pub fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }

    pub fn author_id(&self) -> &UserId {
        &self.author_id
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn body(&self) -> &CommentBody {
        &self.body
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
