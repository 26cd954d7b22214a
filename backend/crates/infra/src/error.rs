//! # インフラ層エラー
//!
//! PostgreSQL・LISTEN/NOTIFY・JSONB 変換で発生する失敗を [`InfraError`] にまとめる。
//!
//! [`InfraError`] は種別（[`InfraErrorKind`]）に加えて生成時点の [`SpanTrace`] を持つ。
//! `From` 変換と `InfraError::*` コンストラクタはどちらも生成時にスパンを捕捉するので、
//! ディスパッチャのログからどのリポジトリ呼び出しで失敗したかを辿れる。

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
#[derive(Debug, Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// クエリ実行・接続・LISTEN の失敗
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// 通知設定（JSONB）の変換失敗
    #[error("シリアライズエラー: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 保存済みの列値を列挙型などに復元できない
    #[error("{column} の保存値 {value:?} を復元できません: {reason}")]
    CorruptRow {
        column: &'static str,
        value:  String,
        reason: String,
    },

    /// 更新対象の行が存在しない（並行して削除された等）
    #[error("更新対象の{entity}が存在しません: {id}")]
    MissingRow { entity: &'static str, id: String },

    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    fn capture(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// 列値の復元失敗
    ///
    /// ```ignore
    /// row.status.parse().map_err(|e| InfraError::corrupt_row("status", &row.status, e))?
    /// ```
    pub fn corrupt_row(
        column: &'static str,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::capture(InfraErrorKind::CorruptRow {
            column,
            value: value.into(),
            reason: reason.to_string(),
        })
    }

    /// UPDATE の影響行数が 0 だった
    pub fn missing_row(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::capture(InfraErrorKind::MissingRow {
            entity,
            id: id.to_string(),
        })
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Unexpected(msg.into()))
    }

    /// 更新対象が消えていた場合に `true`
    pub fn is_missing_row(&self) -> bool {
        matches!(self.kind, InfraErrorKind::MissingRow { .. })
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self::capture(InfraErrorKind::Database(source))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(source: serde_json::Error) -> Self {
        Self::capture(InfraErrorKind::Serialization(source))
    }
}

/// 保存済みのメールアドレスや件名がドメインの検証を通らない場合
impl From<ticketdesk_domain::DomainError> for InfraError {
    fn from(source: ticketdesk_domain::DomainError) -> Self {
        Self::unexpected(format!("保存済みデータがドメイン制約を満たさない: {source}"))
    }
}
