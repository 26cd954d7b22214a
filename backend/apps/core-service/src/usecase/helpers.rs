//! ユースケース層の共通ヘルパー
//!
//! リポジトリ呼び出し結果の変換など、複数のユースケースで繰り返されるパターンを共通化する。

use ticketdesk_infra::{
    InfraError,
    db::{TransactionManager, TxContext},
};

use crate::error::CoreError;

/// リポジトリの `Result<Option<T>, InfraError>` を `Result<T, CoreError>` に変換する
///
/// `find_by_id` 等の `Option` を返すリポジトリメソッドの結果を、
/// `CoreError::NotFound` または `CoreError::Internal` に変換する。
///
/// ```ignore
/// let ticket = self.ticket_repo.find_by_id(&ticket_id, &tenant_id).await
///     .or_not_found("チケット")?;
/// ```
pub(crate) trait FindResultExt<T> {
    /// `None` の場合は `CoreError::NotFound`、`InfraError` の場合は `CoreError::Internal` を返す
    fn or_not_found(self, entity_name: &str) -> Result<T, CoreError>;
}

impl<T> FindResultExt<T> for Result<Option<T>, InfraError> {
    fn or_not_found(self, entity_name: &str) -> Result<T, CoreError> {
        self.map_err(|e| CoreError::Internal(format!("{}の取得に失敗: {}", entity_name, e)))?
            .ok_or_else(|| CoreError::NotFound(format!("{}が見つかりません", entity_name)))
    }
}

/// トランザクションを開始する
pub(crate) async fn begin_tx(tx_manager: &dyn TransactionManager) -> Result<TxContext, CoreError> {
    tx_manager
        .begin()
        .await
        .map_err(|e| CoreError::Internal(format!("トランザクション開始に失敗: {}", e)))
}

/// トランザクションをコミットする
pub(crate) async fn commit_tx(tx: TxContext) -> Result<(), CoreError> {
    tx.commit()
        .await
        .map_err(|e| CoreError::Internal(format!("トランザクションコミットに失敗: {}", e)))
}
