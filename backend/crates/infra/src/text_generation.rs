//! # メール本文のテキスト生成
//!
//! 通知ペイロードからメールの件名と HTML 本文を生成する能力を抽象化する。
//!
//! 生成器は任意の能力として扱う。未設定の場合、通知のメール経路は
//! 実行されない（アプリ内通知は常に作成される）。
//! 決定的なテンプレート実装は core-service 側にある。

mod gemini;

use async_trait::async_trait;
pub use gemini::{DEFAULT_GEMINI_MODEL, GeminiTextGenerator};
use ticketdesk_domain::notification::{EmailDraftInput, GeneratedEmail, NotificationError};

/// テキスト生成トレイト
///
/// 失敗は [`NotificationError::GenerationFailed`] で返す。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, input: &EmailDraftInput) -> Result<GeneratedEmail, NotificationError>;
}
