//! # 通知ユースケース
//!
//! ドメインイベントに伴うアプリ内通知とメール通知を統合する。
//!
//! ## モジュール構成
//!
//! - [`dispatcher`] - 通知イベント 1 件をメール + アプリ内通知に変換する
//! - [`mailer`] - メール送信と配信記録、カスタムメール
//! - [`template_renderer`] - tera テンプレートによるメール生成
//! - [`recipient`] - イベントごとの受信者の決定
//! - [`inbox`] - アプリ内通知の購読・既読化

pub mod dispatcher;
pub mod inbox;
pub mod mailer;
pub mod recipient;
pub mod template_renderer;

pub use dispatcher::{DispatchOutcome, EmailOutcome, NotificationDispatcher};
pub use inbox::{MarkReadPolicy, NotificationInbox, PendingMarkRead};
pub use mailer::{CustomEmailReport, Mailer};
pub use template_renderer::TemplateTextGenerator;
