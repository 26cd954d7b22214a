//! # ドメイン層エラー定義
//!
//! ビジネスルール違反やドメイン固有の例外状態を表現するエラー型。
//!
//! ## 設計方針
//!
//! - **型による分類**: エラーの種類を列挙型で明示し、パターンマッチで処理可能に
//! - **thiserror 活用**: `#[error(...)]` マクロでエラーメッセージを自動生成
//!
//! 通知配信に固有のエラーは [`NotificationError`](crate::notification::NotificationError)
//! として別に定義する。
//!
//! ## 使用例
//!
//! ```rust
//! use ticketdesk_domain::DomainError;
//!
//! fn validate_title(title: &str) -> Result<(), DomainError> {
//!     if title.is_empty() {
//!         return Err(DomainError::Validation("件名は必須です".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 入力値がビジネスルールに違反している場合に使用する。
    ///
    /// # 例
    ///
    /// - 必須フィールドが未入力
    /// - 文字数制限の超過
    /// - 不正な列挙値（DB から読み出した文字列など）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// エンティティが見つからない
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        /// エンティティの種類（"Ticket", "UserProfile" など）
        entity_type: &'static str,
        /// 検索に使用した識別子
        id:          String,
    },

    /// 不正な状態遷移
    ///
    /// 例: 承認待ちでないユーザーの承認。
    #[error("不正な状態遷移: {0}")]
    InvalidTransition(String),

    /// 権限エラー
    #[error("権限がありません: {0}")]
    Forbidden(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_foundのメッセージにエンティティ種別とidが含まれる() {
        let err = DomainError::NotFound {
            entity_type: "Ticket",
            id:          "T-1".to_string(),
        };

        assert_eq!(err.to_string(), "Ticket が見つかりません: T-1");
    }
}
