//! # TicketDesk インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とマイグレーション
//! - **リポジトリ実装**: 組織・ユーザー・部署・チケット・通知・配信記録の永続化
//! - **メール送信**: 組織ごとの SMTP 設定による送信（lettre）
//! - **テキスト生成**: 生成 API によるメール本文の作成（reqwest）
//!
//! ## 依存関係
//!
//! ```text
//! core-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`mail`] - メール送信
//! - [`repository`] - リポジトリ実装
//! - [`text_generation`] - メール本文のテキスト生成
//! - `mock` - テスト用インメモリ実装（`test-utils` feature）
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use ticketdesk_infra::{db, repository::PostgresNotificationRepository};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/ticketdesk").await?;
//!     db::run_migrations(&pool).await?;
//!
//!     let notifications = PostgresNotificationRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod mail;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;
pub mod text_generation;

pub use error::InfraError;
