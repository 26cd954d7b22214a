//! # TicketDesk ドメイン層
//!
//! 苦情・問い合わせ管理の中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: Ticket, UserProfile）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: TenantId, TicketTitle）
//! - **純粋な分類**: 通知イベントからアプリ内通知への変換は副作用を持たない
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! core-service → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、SMTP、外部 API）に一切依存しない。
//!
//! ## モジュール構成
//!
//! - [`clock`] - 時刻プロバイダ
//! - [`error`] - ドメイン層で発生するエラーの定義
//! - [`notification`] - 通知イベントの分類とアプリ内通知・配信記録
//! - [`tenant`] - 組織と組織ごとのメール送信設定
//! - [`ticket`] - チケット・部署・コメント
//! - [`user`] - ユーザープロファイルと通知設定
//!
//! ## 使用例
//!
//! ```rust
//! use ticketdesk_domain::{
//!     notification::{IconKind, NotificationPayload},
//!     user::PreferenceKey,
//! };
//!
//! let payload = NotificationPayload::UserApproved;
//! let template = payload.classify();
//!
//! assert_eq!(template.link, "/dashboard");
//! assert_eq!(template.icon, IconKind::UserPlus);
//! assert_eq!(payload.preference_key(), PreferenceKey::TicketUpdates);
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod notification;
pub mod tenant;
pub mod ticket;
pub mod user;

pub use error::DomainError;
