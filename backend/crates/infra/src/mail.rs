//! # メール送信
//!
//! メール送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: [`MailTransport`] でメール送信を抽象化
//! - **組織ごとの認証情報**: 送信には組織レコードの SMTP 設定を使う。
//!   プロセス全体で共有する SMTP 設定は持たない
//! - **2 つの実装**: SMTP（本番・開発）、Noop（ログ出力のみ）
//! - **環境変数切替**: `MAIL_BACKEND` でランタイム選択

mod noop;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopMailTransport;
pub use smtp::SmtpMailTransport;
use ticketdesk_domain::{
    notification::{EmailMessage, NotificationError},
    tenant::Organization,
};

/// 送信の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// SMTP サーバーが受け付けた
    Sent,
    /// バックエンドが送信しなかった（Noop）
    Skipped,
}

/// メール送信トレイト
///
/// 送信元の組織（テナント）の認証情報を使ってメールを 1 通送信する。
/// 組織に SMTP 設定が無い場合は [`NotificationError::NotConfigured`] を返す。
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        organization: &Organization,
        email: &EmailMessage,
    ) -> Result<SendOutcome, NotificationError>;
}
