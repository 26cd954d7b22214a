//! # NotificationRepository
//!
//! アプリ内通知レコードの永続化と、受信箱の購読を担当するリポジトリ。
//!
//! ## 購読
//!
//! `notifications` テーブルのトリガーが、レコードの追加・更新のたびに
//! チャネル [`NOTIFICATION_CHANNEL`] へ受信者のユーザー ID を通知する。
//! [`NotificationRepository::subscribe`] は LISTEN 用の専用接続を張り、
//! 対象ユーザー宛ての通知を受けるたびに全件（新しい順）を読み直して配信する。
//! 接続断や読み直しの失敗では配信を止めず、回復後に全件を配信し直す。
//! 配信が終わるのは購読の解除（またはプールのクローズ）のときだけ。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use ticketdesk_domain::{
    notification::{IconKind, NotificationId, NotificationRecord},
    user::UserId,
};
use ticketdesk_shared::event_log::error as log_error;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{db, error::InfraError};

/// 通知変更を伝える LISTEN/NOTIFY チャネル名（ペイロードは受信者のユーザー ID）
pub const NOTIFICATION_CHANNEL: &str = "user_notifications";

/// 購読 1 件あたりに溜められるスナップショット数
const FEED_BUFFER: usize = 16;

/// LISTEN 接続のエラー後に再試行するまでの待ち時間
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// 受信箱の購読ハンドル
///
/// 購読開始時点の全件を最初に配信し、以降は変更のたびに全件を配信する。
/// 一時的な DB エラーでは終了しない。ドロップ（または [`unsubscribe`](Self::unsubscribe)）すると配信タスクを停止し、
/// それ以降スナップショットは届かない。
pub struct NotificationFeed {
    receiver: mpsc::Receiver<Vec<NotificationRecord>>,
    task:     JoinHandle<()>,
}

impl NotificationFeed {
    /// 配信タスクと受信側チャネルから購読ハンドルを組み立てる
    pub fn new(receiver: mpsc::Receiver<Vec<NotificationRecord>>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    /// 次のスナップショット（新しい順）を待つ
    ///
    /// 配信タスクが終了した場合は `None`。
    pub async fn next(&mut self) -> Option<Vec<NotificationRecord>> {
        self.receiver.recv().await
    }

    /// 購読を解除する
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for NotificationFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// アプリ内通知リポジトリトレイト
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 通知レコードを追加する
    async fn insert(&self, record: &NotificationRecord) -> Result<(), InfraError>;

    /// ユーザーの通知を新しい順に取得
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<NotificationRecord>, InfraError>;

    /// 未読件数を数える
    async fn count_unread(&self, user_id: &UserId) -> Result<u64, InfraError>;

    /// 未読の通知をすべて既読にする（単一の更新で一括）
    ///
    /// 戻り値は既読にした件数。未読が無ければ 0。
    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, InfraError>;

    /// ユーザーの受信箱を購読する
    async fn subscribe(&self, user_id: &UserId) -> Result<NotificationFeed, InfraError>;
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id:          Uuid,
    user_id:     Uuid,
    title:       String,
    description: String,
    link:        String,
    icon_name:   String,
    read:        bool,
    created_at:  DateTime<Utc>,
}

impl TryFrom<NotificationRow> for NotificationRecord {
    type Error = InfraError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let icon: IconKind = row
            .icon_name
            .parse()
            .map_err(|e| InfraError::corrupt_row("icon_name", &row.icon_name, e))?;

        Ok(NotificationRecord {
            id: NotificationId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            title: row.title,
            description: row.description,
            link: row.link,
            icon,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

async fn fetch_by_user(
    pool: &PgPool,
    user_id: &UserId,
) -> Result<Vec<NotificationRecord>, InfraError> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, user_id, title, description, link, icon_name, read, created_at
        FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(NotificationRecord::try_from).collect()
}

/// PostgreSQL 実装の NotificationRepository
#[derive(Debug, Clone)]
pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(user_id = %record.user_id))]
    async fn insert(&self, record: &NotificationRecord) -> Result<(), InfraError> {
        let icon_name: &'static str = record.icon.into();
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, title, description, link, icon_name, read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.link)
        .bind(icon_name)
        .bind(record.read)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<NotificationRecord>, InfraError> {
        fetch_by_user(&self.pool, user_id).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
    async fn count_unread(&self, user_id: &UserId) -> Result<u64, InfraError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
                .bind(user_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, InfraError> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
                .bind(user_id.as_uuid())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
    async fn subscribe(&self, user_id: &UserId) -> Result<NotificationFeed, InfraError> {
        // 初回スナップショットより先に LISTEN し、その間の変更を取りこぼさない
        let mut listener = db::listen(&self.pool, NOTIFICATION_CHANNEL).await?;

        let initial = fetch_by_user(&self.pool, user_id).await?;
        let (sender, receiver) = mpsc::channel(FEED_BUFFER);
        sender
            .try_send(initial)
            .map_err(|e| InfraError::unexpected(format!("初回スナップショットの配信に失敗: {e}")))?;

        let pool = self.pool.clone();
        let user_id = user_id.clone();
        let target = user_id.to_string();
        let task = tokio::spawn(async move {
            // 直前の再読み込みに失敗していれば、次の通知の宛先に関係なく読み直す
            let mut stale = false;
            loop {
                let reload = match listener.try_recv().await {
                    Ok(Some(notification)) => stale || notification.payload() == target,
                    // 切断中の変更は届かないため、再接続後に全件を読み直す
                    Ok(None) => {
                        tracing::warn!(%user_id, "受信箱の購読が切断されたため再接続した");
                        true
                    }
                    // プールが閉じられた（シャットダウン）
                    Err(sqlx::Error::PoolClosed) => break,
                    Err(e) => {
                        tracing::error!(
                            error.category = log_error::category::INFRASTRUCTURE,
                            error.kind = log_error::kind::DATABASE,
                            %user_id,
                            "受信箱の購読でエラー、再試行する: {e}"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        true
                    }
                };
                if !reload {
                    continue;
                }

                match fetch_by_user(&pool, &user_id).await {
                    Ok(records) => {
                        stale = false;
                        if sender.send(records).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            error.category = log_error::category::INFRASTRUCTURE,
                            error.kind = log_error::kind::DATABASE,
                            %user_id,
                            "受信箱の再読み込みに失敗: {e}"
                        );
                        stale = true;
                    }
                }
            }
        });

        Ok(NotificationFeed::new(receiver, task))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn row(icon_name: &str) -> NotificationRow {
        NotificationRow {
            id:          Uuid::now_v7(),
            user_id:     Uuid::now_v7(),
            title:       "Account Approved".to_string(),
            description: "Your account has been approved. Welcome aboard!".to_string(),
            link:        "/dashboard".to_string(),
            icon_name:   icon_name.to_string(),
            read:        false,
            created_at:  Utc::now(),
        }
    }

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresNotificationRepository>();
    }

    #[test]
    fn test_アイコン名からアイコン種別を復元できる() {
        let record = NotificationRecord::try_from(row("userPlus")).unwrap();
        assert_eq!(record.icon, IconKind::UserPlus);
    }

    #[test]
    fn test_未知のアイコン名は予期しないエラーになる() {
        assert!(NotificationRecord::try_from(row("bell")).is_err());
    }

    #[tokio::test]
    async fn test_購読を解除すると配信タスクが停止する() {
        let (_sender, receiver) = mpsc::channel::<Vec<NotificationRecord>>(1);
        let (alive, stopped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await;
        });

        NotificationFeed::new(receiver, task).unsubscribe();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), stopped).await;
        assert!(matches!(result, Ok(Err(_))), "タスクが停止していない");
    }
}
