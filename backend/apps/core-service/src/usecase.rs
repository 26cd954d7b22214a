//! # ユースケース層
//!
//! Core Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリを `Arc<dyn Trait>` で外部から注入
//! - **主処理を先にコミット**: 通知は主処理のコミット後に送り、失敗してもユースケースは成功とする
//!
//! ## モジュール構成
//!
//! - `notification`: 通知のディスパッチ・メール・受信箱
//! - `ticket`: チケットの起票・更新・コメント
//! - `user`: ユーザーの登録・承認・プロファイル更新・カスタムメール

pub(crate) mod helpers;

pub mod notification;
pub mod ticket;
pub mod user;

pub use ticket::{
    CreateTicketInput,
    PostCommentInput,
    TicketUseCaseDeps,
    TicketUseCaseImpl,
    UpdateTicketInput,
};
pub use user::{
    ApproveUserInput,
    RegisterEmployeeInput,
    SendCustomEmailInput,
    UpdateUserProfileInput,
    UserUseCaseImpl,
};
