//! # リポジトリ実装
//!
//! 組織・ユーザー・部署・チケット・通知の保存先を trait で抽象化し、
//! PostgreSQL による具体的な実装を提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: ユースケース層は trait にのみ依存する
//! - **データベース抽象化**: sqlx を使用し、PostgreSQL 固有の処理をカプセル化
//! - **テスタビリティ**: インメモリ実装は [`crate::mock`] にある

pub mod delivery_log_repository;
pub mod department_repository;
pub mod notification_repository;
pub mod organization_repository;
pub mod ticket_comment_repository;
pub mod ticket_repository;
pub mod user_profile_repository;

pub use delivery_log_repository::{DeliveryLogRepository, PostgresDeliveryLogRepository};
pub use department_repository::{DepartmentRepository, PostgresDepartmentRepository};
pub use notification_repository::{
    NOTIFICATION_CHANNEL,
    NotificationFeed,
    NotificationRepository,
    PostgresNotificationRepository,
};
pub use organization_repository::{OrganizationRepository, PostgresOrganizationRepository};
pub use ticket_comment_repository::{PostgresTicketCommentRepository, TicketCommentRepository};
pub use ticket_repository::{PostgresTicketRepository, TicketRepository};
pub use user_profile_repository::{PostgresUserProfileRepository, UserProfileRepository};
