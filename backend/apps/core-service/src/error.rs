//! # Core Service エラー定義
//!
//! ユースケース層で発生するエラーを定義する。
//!
//! 通知の失敗はここには現れない。通知はユースケースの主処理がコミットされた後に
//! 実行され、失敗してもログに残すだけで呼び出し元には返さない。

use thiserror::Error;

/// Core Service で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] ticketdesk_infra::InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<ticketdesk_domain::DomainError> for CoreError {
    fn from(e: ticketdesk_domain::DomainError) -> Self {
        use ticketdesk_domain::DomainError;

        match e {
            DomainError::NotFound { .. } => CoreError::NotFound(e.to_string()),
            DomainError::Forbidden(msg) => CoreError::Forbidden(msg),
            other => CoreError::BadRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ticketdesk_domain::DomainError;

    use super::*;

    #[test]
    fn test_ドメインエラーは不正なリクエストに変換される() {
        let error = CoreError::from(DomainError::Validation("件名は必須です".to_string()));

        assert!(matches!(error, CoreError::BadRequest(msg) if msg.contains("件名は必須です")));
    }
}
