//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! 既存の `tracing::error!` / `tracing::warn!` に `error.category` + `error.kind`
//! フィールドを直接追加する。定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.tenant_id`: テナント ID
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者 ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const NOTIFICATION: &str = "notification";
        pub const TICKET: &str = "ticket";
        pub const USER: &str = "user";
    }

    /// イベントアクション
    pub mod action {
        // 通知
        pub const NOTIFICATION_CREATED: &str = "notification.created";
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
        pub const NOTIFICATION_SKIPPED: &str = "notification.skipped";
        pub const NOTIFICATIONS_READ: &str = "notification.read_all";
        pub const TEST_EMAIL_SENT: &str = "notification.test_email_sent";
        pub const CUSTOM_EMAIL_SENT: &str = "notification.custom_email_sent";

        // チケット
        pub const TICKET_CREATED: &str = "ticket.created";
        pub const TICKET_UPDATED: &str = "ticket.updated";
        pub const TICKET_COMMENTED: &str = "ticket.commented";

        // ユーザー
        pub const USER_REGISTERED: &str = "user.registered";
        pub const USER_APPROVED: &str = "user.approved";
        pub const USER_PROFILE_UPDATED: &str = "user.profile_updated";
        pub const PREFERENCES_UPDATED: &str = "user.preferences_updated";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const TICKET: &str = "ticket";
        pub const TICKET_COMMENT: &str = "ticket_comment";
        pub const USER: &str = "user";
        pub const NOTIFICATION: &str = "notification";
        pub const DELIVERY_LOG: &str = "delivery_log";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
        pub const SKIPPED: &str = "skipped";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB、通知購読）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（SMTP、テキスト生成 API）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const INTERNAL: &str = "internal";
        pub const MAIL_DELIVERY: &str = "mail_delivery";
        pub const TEXT_GENERATION: &str = "text_generation";
        pub const NOTIFICATION_STORE: &str = "notification_store";
        pub const DELIVERY_LOG: &str = "delivery_log";
        pub const RECIPIENT_LOOKUP: &str = "recipient_lookup";
    }
}
