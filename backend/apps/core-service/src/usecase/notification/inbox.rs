//! # 通知受信箱
//!
//! アプリ内通知の読み取り側。購読・件数取得・全件既読化を提供する。
//!
//! 受信箱を開いたときの全件既読化は、未読バッジを一瞬見せるために
//! [`MarkReadPolicy`] の遅延を置いてから実行する。

use std::{sync::Arc, time::Duration};

use ticketdesk_domain::user::UserId;
use ticketdesk_infra::repository::{NotificationFeed, NotificationRepository};
use ticketdesk_shared::{event_log::event, log_business_event};
use tokio::task::JoinHandle;

use crate::{config::DEFAULT_MARK_READ_DELAY_MS, error::CoreError};

/// 全件既読化の遅延ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkReadPolicy {
    pub delay: Duration,
}

impl MarkReadPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MarkReadPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_MARK_READ_DELAY_MS))
    }
}

/// 予約された全件既読化
///
/// 遅延が経過する前に [`PendingMarkRead::cancel`] すれば既読化されない。
pub struct PendingMarkRead {
    handle: JoinHandle<Result<u64, CoreError>>,
}

impl PendingMarkRead {
    /// 既読化の完了を待ち、既読にした件数を返す
    pub async fn wait(self) -> Result<u64, CoreError> {
        self.handle
            .await
            .map_err(|e| CoreError::Internal(format!("既読化タスクが中断された: {}", e)))?
    }

    /// 予約を取り消す
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// 通知受信箱
pub struct NotificationInbox {
    notifications: Arc<dyn NotificationRepository>,
    policy:        MarkReadPolicy,
}

impl NotificationInbox {
    pub fn new(notifications: Arc<dyn NotificationRepository>, policy: MarkReadPolicy) -> Self {
        Self {
            notifications,
            policy,
        }
    }

    /// ユーザーの通知を購読する
    ///
    /// 最初に現在の全件（新しい順）が届き、以降は変更のたびに全件が届く。
    /// [`NotificationFeed::unsubscribe`] するまで配信が続く。
    pub async fn subscribe(&self, user_id: &UserId) -> Result<NotificationFeed, CoreError> {
        Ok(self.notifications.subscribe(user_id).await?)
    }

    /// 未読件数
    pub async fn unread_count(&self, user_id: &UserId) -> Result<u64, CoreError> {
        Ok(self.notifications.count_unread(user_id).await?)
    }

    /// 未読の通知をすべて既読にする
    ///
    /// 未読が無ければ何もせず 0 を返す。
    pub async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, CoreError> {
        mark_all_read(self.notifications.as_ref(), user_id).await
    }

    /// ポリシーの遅延後に全件既読化する
    pub fn schedule_mark_all_read(&self, user_id: UserId) -> PendingMarkRead {
        let notifications = Arc::clone(&self.notifications);
        let delay = self.policy.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mark_all_read(notifications.as_ref(), &user_id).await
        });
        PendingMarkRead { handle }
    }
}

async fn mark_all_read(
    notifications: &dyn NotificationRepository,
    user_id: &UserId,
) -> Result<u64, CoreError> {
    let touched = notifications.mark_all_read(user_id).await?;
    if touched > 0 {
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATIONS_READ,
            event.entity_type = event::entity_type::NOTIFICATION,
            event.actor_id = %user_id,
            event.result = event::result::SUCCESS,
            notification.count = touched,
            "通知を全件既読化"
        );
    }
    Ok(touched)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use pretty_assertions::assert_eq;
    use ticketdesk_domain::notification::{NotificationPayload, NotificationRecord};
    use ticketdesk_infra::mock::MockNotificationRepository;

    use super::*;

    fn record(user_id: &UserId, minutes: i64) -> NotificationRecord {
        NotificationRecord::unread(
            user_id.clone(),
            NotificationPayload::UserProfileUpdated.classify(),
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
                + ChronoDuration::minutes(minutes),
        )
    }

    fn make_inbox(repo: &MockNotificationRepository) -> NotificationInbox {
        NotificationInbox::new(Arc::new(repo.clone()), MarkReadPolicy::default())
    }

    #[tokio::test]
    async fn test_全件既読化の2回目は何もしない() {
        let repo = MockNotificationRepository::new();
        let user_id = UserId::new();
        repo.insert(&record(&user_id, 0)).await.unwrap();
        repo.insert(&record(&user_id, 1)).await.unwrap();
        let sut = make_inbox(&repo);

        assert_eq!(sut.mark_all_read(&user_id).await.unwrap(), 2);
        assert_eq!(sut.mark_all_read(&user_id).await.unwrap(), 0);
        assert_eq!(sut.unread_count(&user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_他のユーザーの通知は既読にしない() {
        let repo = MockNotificationRepository::new();
        let me = UserId::new();
        let other = UserId::new();
        repo.insert(&record(&me, 0)).await.unwrap();
        repo.insert(&record(&other, 0)).await.unwrap();
        let sut = make_inbox(&repo);

        sut.mark_all_read(&me).await.unwrap();

        assert_eq!(sut.unread_count(&other).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_購読は新しい順の全件から始まり変更を配信する() {
        let repo = MockNotificationRepository::new();
        let user_id = UserId::new();
        let older = record(&user_id, 0);
        let newer = record(&user_id, 5);
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();
        let sut = make_inbox(&repo);

        let mut feed = sut.subscribe(&user_id).await.unwrap();
        assert_eq!(feed.next().await.unwrap(), vec![newer.clone(), older.clone()]);

        sut.mark_all_read(&user_id).await.unwrap();
        let updated = feed.next().await.unwrap();
        assert!(updated.iter().all(|r| r.read));
        assert_eq!(updated.len(), 2);

        feed.unsubscribe();
    }

    #[tokio::test(start_paused = true)]
    async fn test_遅延の経過後に全件既読化する() {
        let repo = MockNotificationRepository::new();
        let user_id = UserId::new();
        repo.insert(&record(&user_id, 0)).await.unwrap();
        let sut = make_inbox(&repo);

        let pending = sut.schedule_mark_all_read(user_id.clone());
        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(sut.unread_count(&user_id).await.unwrap(), 1);

        assert_eq!(pending.wait().await.unwrap(), 1);
        assert_eq!(sut.unread_count(&user_id).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_取り消した既読化は実行されない() {
        let repo = MockNotificationRepository::new();
        let user_id = UserId::new();
        repo.insert(&record(&user_id, 0)).await.unwrap();
        let sut = NotificationInbox::new(
            Arc::new(repo.clone()),
            MarkReadPolicy::new(Duration::from_millis(100)),
        );

        sut.schedule_mark_all_read(user_id.clone()).cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(sut.unread_count(&user_id).await.unwrap(), 1);
    }
}
