//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのリポジトリ・メール送信・テキスト生成器。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! ticketdesk-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 各モックは `Clone` で内部状態を共有する。テストはクローンを保持しておき、
//! ユースケース実行後に記録内容を検証する。失敗注入用のメソッドも備える。

use std::{
    collections::HashSet,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use ticketdesk_domain::{
    notification::{
        DeliveryAttempt,
        EmailDraftInput,
        EmailMessage,
        GeneratedEmail,
        NotificationError,
        NotificationRecord,
    },
    tenant::{Organization, TenantId},
    ticket::{Department, Ticket, TicketComment, TicketId},
    user::{UserId, UserProfile, UserRole},
};
use tokio::sync::{broadcast, mpsc};

use crate::{
    db::{TransactionManager, TxContext},
    error::InfraError,
    mail::{MailTransport, SendOutcome},
    repository::{
        DeliveryLogRepository,
        DepartmentRepository,
        NotificationFeed,
        NotificationRepository,
        OrganizationRepository,
        TicketCommentRepository,
        TicketRepository,
        UserProfileRepository,
    },
    text_generation::TextGenerator,
};

// ===== MockTransactionManager =====

#[derive(Clone, Default)]
pub struct MockTransactionManager;

#[async_trait]
impl TransactionManager for MockTransactionManager {
    async fn begin(&self) -> Result<TxContext, InfraError> {
        Ok(TxContext::mock())
    }
}

// ===== MockOrganizationRepository =====

#[derive(Clone, Default)]
pub struct MockOrganizationRepository {
    organizations: Arc<Mutex<Vec<Organization>>>,
}

impl MockOrganizationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_organization(&self, organization: Organization) {
        self.organizations.lock().unwrap().push(organization);
    }
}

#[async_trait]
impl OrganizationRepository for MockOrganizationRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Organization>, InfraError> {
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id() == id)
            .cloned())
    }

    async fn insert(&self, organization: &Organization) -> Result<(), InfraError> {
        self.add_organization(organization.clone());
        Ok(())
    }
}

// ===== MockUserProfileRepository =====

#[derive(Clone, Default)]
pub struct MockUserProfileRepository {
    profiles:       Arc<Mutex<Vec<UserProfile>>>,
    failing_lookup: Arc<Mutex<HashSet<UserId>>>,
}

impl MockUserProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, profile: UserProfile) {
        self.profiles.lock().unwrap().push(profile);
    }

    /// 指定ユーザーの `find_by_id` をデータベースエラーにする
    pub fn fail_lookup_for(&self, user_id: &UserId) {
        self.failing_lookup.lock().unwrap().insert(user_id.clone());
    }

    pub fn profile(&self, user_id: &UserId) -> Option<UserProfile> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id() == user_id)
            .cloned()
    }
}

#[async_trait]
impl UserProfileRepository for MockUserProfileRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, InfraError> {
        if self.failing_lookup.lock().unwrap().contains(id) {
            return Err(InfraError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(self.profile(id))
    }

    async fn find_by_tenant_and_role(
        &self,
        tenant_id: &TenantId,
        role: UserRole,
    ) -> Result<Vec<UserProfile>, InfraError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.tenant_id() == tenant_id && p.role() == role)
            .cloned()
            .collect())
    }

    async fn insert(&self, _tx: &mut TxContext, profile: &UserProfile) -> Result<(), InfraError> {
        self.add_profile(profile.clone());
        Ok(())
    }

    async fn update(&self, _tx: &mut TxContext, profile: &UserProfile) -> Result<(), InfraError> {
        let mut profiles = self.profiles.lock().unwrap();
        let Some(existing) = profiles.iter_mut().find(|p| p.id() == profile.id()) else {
            return Err(InfraError::missing_row("プロファイル", profile.id()));
        };
        *existing = profile.clone();
        Ok(())
    }
}

// ===== MockDepartmentRepository =====

#[derive(Clone, Default)]
pub struct MockDepartmentRepository {
    departments: Arc<Mutex<Vec<Department>>>,
}

impl MockDepartmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_department(&self, department: Department) {
        self.departments.lock().unwrap().push(department);
    }
}

#[async_trait]
impl DepartmentRepository for MockDepartmentRepository {
    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<Department>, InfraError> {
        Ok(self
            .departments
            .lock()
            .unwrap()
            .iter()
            .find(|d| &d.tenant_id == tenant_id && d.name == name)
            .cloned())
    }
}

// ===== MockTicketRepository =====

#[derive(Clone, Default)]
pub struct MockTicketRepository {
    tickets: Arc<Mutex<Vec<Ticket>>>,
}

impl MockTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ticket(&self, ticket: Ticket) {
        self.tickets.lock().unwrap().push(ticket);
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets.lock().unwrap().clone()
    }
}

#[async_trait]
impl TicketRepository for MockTicketRepository {
    async fn insert(&self, _tx: &mut TxContext, ticket: &Ticket) -> Result<(), InfraError> {
        self.add_ticket(ticket.clone());
        Ok(())
    }

    async fn update(&self, _tx: &mut TxContext, ticket: &Ticket) -> Result<(), InfraError> {
        let mut tickets = self.tickets.lock().unwrap();
        let Some(existing) = tickets.iter_mut().find(|t| t.id() == ticket.id()) else {
            return Err(InfraError::missing_row("チケット", ticket.id()));
        };
        *existing = ticket.clone();
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &TicketId,
        tenant_id: &TenantId,
    ) -> Result<Option<Ticket>, InfraError> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id() == id && t.tenant_id() == tenant_id)
            .cloned())
    }
}

// ===== MockTicketCommentRepository =====

#[derive(Clone, Default)]
pub struct MockTicketCommentRepository {
    comments: Arc<Mutex<Vec<TicketComment>>>,
}

impl MockTicketCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> Vec<TicketComment> {
        self.comments.lock().unwrap().clone()
    }
}

#[async_trait]
impl TicketCommentRepository for MockTicketCommentRepository {
    async fn insert(&self, _tx: &mut TxContext, comment: &TicketComment) -> Result<(), InfraError> {
        self.comments.lock().unwrap().push(comment.clone());
        Ok(())
    }

    async fn find_by_ticket(&self, ticket_id: &TicketId) -> Result<Vec<TicketComment>, InfraError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.ticket_id() == ticket_id)
            .cloned()
            .collect())
    }
}

// ===== MockNotificationRepository =====

/// インメモリの通知ストア
///
/// 追加・既読化のたびに購読者へ受信者 ID を通知し、購読タスクが全件を配信し直す。
#[derive(Clone)]
pub struct MockNotificationRepository {
    records:      Arc<Mutex<Vec<NotificationRecord>>>,
    changes:      broadcast::Sender<UserId>,
    fail_inserts: Arc<AtomicBool>,
}

impl Default for MockNotificationRepository {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            records: Arc::default(),
            changes,
            fail_inserts: Arc::default(),
        }
    }
}

impl MockNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の `insert` を保存失敗にする
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    /// 保存されたすべての通知（保存順）
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_for(&self, user_id: &UserId) -> Vec<NotificationRecord> {
        self.records()
            .into_iter()
            .filter(|r| &r.user_id == user_id)
            .collect()
    }

    fn snapshot(
        records: &Mutex<Vec<NotificationRecord>>,
        user_id: &UserId,
    ) -> Vec<NotificationRecord> {
        let mut snapshot: Vec<NotificationRecord> = records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        snapshot.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.id.as_uuid().cmp(a.id.as_uuid()))
        });
        snapshot
    }
}

#[async_trait]
impl NotificationRepository for MockNotificationRepository {
    async fn insert(&self, record: &NotificationRecord) -> Result<(), InfraError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(InfraError::from(sqlx::Error::PoolClosed));
        }
        self.records.lock().unwrap().push(record.clone());
        let _ = self.changes.send(record.user_id.clone());
        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<NotificationRecord>, InfraError> {
        Ok(Self::snapshot(&self.records, user_id))
    }

    async fn count_unread(&self, user_id: &UserId) -> Result<u64, InfraError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.user_id == user_id && !r.read)
            .count() as u64)
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, InfraError> {
        let mut touched = 0;
        for record in self
            .records
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|r| &r.user_id == user_id && !r.read)
        {
            record.read = true;
            touched += 1;
        }
        if touched > 0 {
            let _ = self.changes.send(user_id.clone());
        }
        Ok(touched)
    }

    async fn subscribe(&self, user_id: &UserId) -> Result<NotificationFeed, InfraError> {
        let mut changes = self.changes.subscribe();
        let (sender, receiver) = mpsc::channel(16);
        sender
            .try_send(Self::snapshot(&self.records, user_id))
            .map_err(|e| InfraError::unexpected(e.to_string()))?;

        let records = Arc::clone(&self.records);
        let user_id = user_id.clone();
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(changed) if changed != user_id => continue,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let snapshot = Self::snapshot(&records, &user_id);
                        if sender.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(NotificationFeed::new(receiver, task))
    }
}

// ===== MockDeliveryLogRepository =====

#[derive(Clone, Default)]
pub struct MockDeliveryLogRepository {
    attempts:     Arc<Mutex<Vec<DeliveryAttempt>>>,
    fail_inserts: Arc<AtomicBool>,
}

impl MockDeliveryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の `insert` を失敗させる
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<DeliveryAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryLogRepository for MockDeliveryLogRepository {
    async fn insert(&self, attempt: &DeliveryAttempt) -> Result<(), InfraError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(InfraError::from(sqlx::Error::PoolClosed));
        }
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>, InfraError> {
        let mut attempts: Vec<DeliveryAttempt> = self
            .attempts()
            .into_iter()
            .filter(|a| &a.tenant_id == tenant_id)
            .collect();
        attempts.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        attempts.truncate(usize::try_from(limit).unwrap_or_default());
        Ok(attempts)
    }
}

// ===== MockMailTransport =====

/// 送信内容を記録するメール送信
///
/// SMTP 実装と同様に、SMTP 設定の無い組織への送信は `NotConfigured` を返す。
#[derive(Clone, Default)]
pub struct MockMailTransport {
    sent:       Arc<Mutex<Vec<(TenantId, EmailMessage)>>>,
    failure:    Arc<Mutex<Option<String>>>,
    failing_to: Arc<Mutex<HashSet<String>>>,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の送信を指定メッセージで失敗させる
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(message.into());
    }

    /// 指定した宛先への送信だけを失敗させる
    pub fn fail_for(&self, to: &str) {
        self.failing_to.lock().unwrap().insert(to.to_string());
    }

    pub fn sent(&self) -> Vec<(TenantId, EmailMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(
        &self,
        organization: &Organization,
        email: &EmailMessage,
    ) -> Result<SendOutcome, NotificationError> {
        if organization.mail_credentials().is_none() {
            return Err(NotificationError::NotConfigured);
        }
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(NotificationError::SendFailed(message));
        }
        if self.failing_to.lock().unwrap().contains(&email.to) {
            return Err(NotificationError::SendFailed(format!(
                "recipient rejected: {}",
                email.to
            )));
        }
        self.sent
            .lock()
            .unwrap()
            .push((organization.id().clone(), email.clone()));
        Ok(SendOutcome::Sent)
    }
}

// ===== MockTextGenerator =====

/// 入力から決定的な件名・本文を返すテキスト生成器
#[derive(Clone, Default)]
pub struct MockTextGenerator {
    calls: Arc<AtomicUsize>,
    fail:  Arc<AtomicBool>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の生成を失敗させる
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, input: &EmailDraftInput) -> Result<GeneratedEmail, NotificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::GenerationFailed(
                "生成 API が利用できない".to_string(),
            ));
        }
        Ok(GeneratedEmail {
            subject: format!("[{}] {}", input.org_name, input.notification_type),
            body:    format!("<p>Hi {}</p>", input.user_name),
        })
    }
}
