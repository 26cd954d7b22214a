//! 通知テストビルダー
//!
//! 通知まわりのユースケーステストで繰り返し出てくるセットアップをまとめる。
//! 組織 1 件とモック一式を用意し、ディスパッチャと各ユースケースを組み立てる。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ticketdesk_domain::{
    clock::{Clock, FixedClock},
    notification::{NotificationEvent, NotificationPayload},
    tenant::{Organization, SmtpSettings, TenantId, TenantName},
    ticket::{Department, DepartmentId, NewTicket, Ticket, TicketId, TicketPriority, TicketTitle},
    user::{
        Email,
        NewUserProfile,
        NotificationPreferences,
        UserId,
        UserName,
        UserProfile,
        UserRole,
        UserStatus,
    },
};
use ticketdesk_infra::{
    mock::{
        MockDeliveryLogRepository,
        MockDepartmentRepository,
        MockMailTransport,
        MockNotificationRepository,
        MockOrganizationRepository,
        MockTextGenerator,
        MockTicketCommentRepository,
        MockTicketRepository,
        MockTransactionManager,
        MockUserProfileRepository,
    },
    text_generation::TextGenerator,
};

use crate::usecase::{
    notification::{Mailer, MarkReadPolicy, NotificationDispatcher, NotificationInbox},
    ticket::{TicketUseCaseDeps, TicketUseCaseImpl},
    user::UserUseCaseImpl,
};

/// 通知テストのセットアップ
///
/// ディスパッチャと、検証に使うモックのクローンを保持する。
pub struct NotificationTestSetup {
    pub dispatcher:        Arc<NotificationDispatcher>,
    pub mailer:            Arc<Mailer>,
    pub clock:             Arc<dyn Clock>,
    pub organization:      Organization,
    pub organization_repo: MockOrganizationRepository,
    pub profile_repo:      MockUserProfileRepository,
    pub department_repo:   MockDepartmentRepository,
    pub ticket_repo:       MockTicketRepository,
    pub comment_repo:      MockTicketCommentRepository,
    pub notification_repo: MockNotificationRepository,
    pub delivery_log:      MockDeliveryLogRepository,
    pub mail_transport:    MockMailTransport,
    pub text_generator:    MockTextGenerator,
}

impl NotificationTestSetup {
    /// セットアップのモックを使うチケットユースケース
    pub fn ticket_usecase(&self) -> TicketUseCaseImpl {
        TicketUseCaseImpl::new(TicketUseCaseDeps {
            ticket_repo:     Arc::new(self.ticket_repo.clone()),
            comment_repo:    Arc::new(self.comment_repo.clone()),
            department_repo: Arc::new(self.department_repo.clone()),
            profile_repo:    Arc::new(self.profile_repo.clone()),
            tx_manager:      Arc::new(MockTransactionManager),
            clock:           self.clock.clone(),
            dispatcher:      self.dispatcher.clone(),
        })
    }

    /// セットアップのモックを使うユーザー管理ユースケース
    pub fn user_usecase(&self) -> UserUseCaseImpl {
        UserUseCaseImpl::new(
            Arc::new(self.profile_repo.clone()),
            Arc::new(self.organization_repo.clone()),
            Arc::new(MockTransactionManager),
            self.clock.clone(),
            self.dispatcher.clone(),
            self.mailer.clone(),
        )
    }

    /// 既定の遅延ポリシーの受信箱
    pub fn inbox(&self) -> NotificationInbox {
        self.inbox_with_policy(MarkReadPolicy::default())
    }

    pub fn inbox_with_policy(&self, policy: MarkReadPolicy) -> NotificationInbox {
        NotificationInbox::new(Arc::new(self.notification_repo.clone()), policy)
    }
}

/// 通知テストビルダー
///
/// # 使用例
///
/// ```ignore
/// use ticketdesk_core_service::test_utils::NotificationTestBuilder;
///
/// #[tokio::test]
/// async fn test_example() {
///     let builder = NotificationTestBuilder::new();
///     let setup = builder.build();
///     let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);
///
///     setup
///         .dispatcher
///         .dispatch(&builder.event(&user, NotificationPayload::UserApproved))
///         .await
///         .unwrap();
///
///     assert_eq!(setup.notification_repo.records_for(user.id()).len(), 1);
/// }
/// ```
pub struct NotificationTestBuilder {
    tenant_id:      TenantId,
    now:            DateTime<Utc>,
    smtp:           bool,
    text_generator: bool,
}

impl NotificationTestBuilder {
    /// デフォルト値で新しいビルダーを作成
    ///
    /// 組織は SMTP 設定済み、テキスト生成器はモックを使う。
    pub fn new() -> Self {
        Self {
            tenant_id:      TenantId::new(),
            now:            Utc::now(),
            smtp:           true,
            text_generator: true,
        }
    }

    /// 組織の SMTP 設定を無しにする
    pub fn without_smtp(mut self) -> Self {
        self.smtp = false;
        self
    }

    /// テキスト生成能力を無しにする
    pub fn without_text_generator(mut self) -> Self {
        self.text_generator = false;
        self
    }

    /// 現在時刻を指定
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// モック一式とディスパッチャを構築する
    pub fn build(&self) -> NotificationTestSetup {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(self.now));
        let organization = Organization::from_db(
            self.tenant_id.clone(),
            TenantName::new("Acme").unwrap(),
            self.smtp.then(|| SmtpSettings {
                host:         "smtp.acme.test".to_string(),
                port:         Some(587),
                username:     "noreply@acme.test".to_string(),
                password:     "secret".to_string(),
                from_address: None,
            }),
        );

        let organization_repo = MockOrganizationRepository::new();
        organization_repo.add_organization(organization.clone());
        let profile_repo = MockUserProfileRepository::new();
        let notification_repo = MockNotificationRepository::new();
        let delivery_log = MockDeliveryLogRepository::new();
        let mail_transport = MockMailTransport::new();
        let text_generator = MockTextGenerator::new();

        let mailer = Arc::new(Mailer::new(
            Arc::new(mail_transport.clone()),
            Arc::new(delivery_log.clone()),
            clock.clone(),
        ));
        let generator: Option<Arc<dyn TextGenerator>> = self
            .text_generator
            .then(|| Arc::new(text_generator.clone()) as Arc<dyn TextGenerator>);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(profile_repo.clone()),
            Arc::new(organization_repo.clone()),
            Arc::new(notification_repo.clone()),
            generator,
            mailer.clone(),
            clock.clone(),
        ));

        NotificationTestSetup {
            dispatcher,
            mailer,
            clock,
            organization,
            organization_repo,
            profile_repo,
            department_repo: MockDepartmentRepository::new(),
            ticket_repo: MockTicketRepository::new(),
            comment_repo: MockTicketCommentRepository::new(),
            notification_repo,
            delivery_log,
            mail_transport,
            text_generator,
        }
    }

    /// 有効なユーザーを登録する（通知設定はロールの初期値）
    ///
    /// 表示名はメールアドレスのローカル部。
    pub fn add_profile(
        &self,
        setup: &NotificationTestSetup,
        email: &str,
        role: UserRole,
    ) -> UserProfile {
        let profile = self.profile(email, role, UserStatus::Active);
        setup.profile_repo.add_profile(profile.clone());
        profile
    }

    /// 通知設定を指定して有効なユーザーを登録する
    pub fn add_profile_with_preferences(
        &self,
        setup: &NotificationTestSetup,
        email: &str,
        role: UserRole,
        preferences: NotificationPreferences,
    ) -> UserProfile {
        let profile = self
            .profile(email, role, UserStatus::Active)
            .with_notification_preferences(preferences);
        setup.profile_repo.add_profile(profile.clone());
        profile
    }

    /// 承認待ちの従業員を登録する
    pub fn add_pending_profile(&self, setup: &NotificationTestSetup, email: &str) -> UserProfile {
        let profile = self.profile(email, UserRole::Employee, UserStatus::Pending);
        setup.profile_repo.add_profile(profile.clone());
        profile
    }

    /// 部署を登録する
    pub fn add_department(
        &self,
        setup: &NotificationTestSetup,
        name: &str,
        supervisor: Option<&UserProfile>,
    ) -> Department {
        let department = Department {
            id:              DepartmentId::new(),
            tenant_id:       self.tenant_id.clone(),
            name:            name.to_string(),
            supervisor_id:   supervisor.map(|s| s.id().clone()),
            supervisor_name: supervisor.map(|s| s.name().as_str().to_string()),
        };
        setup.department_repo.add_department(department.clone());
        department
    }

    /// 未解決のチケットを登録する
    pub fn add_ticket(
        &self,
        setup: &NotificationTestSetup,
        reporter: &UserProfile,
        title: &str,
        department: &str,
    ) -> Ticket {
        let ticket = Ticket::new(NewTicket {
            id: TicketId::new(),
            tenant_id: self.tenant_id.clone(),
            title: TicketTitle::new(title).unwrap(),
            description: "テスト用のチケット".to_string(),
            priority: TicketPriority::Medium,
            is_public: false,
            department: department.to_string(),
            category: "その他".to_string(),
            reported_by: reporter.id().clone(),
            reported_by_name: reporter.name().as_str().to_string(),
            now: self.now,
        });
        setup.ticket_repo.add_ticket(ticket.clone());
        ticket
    }

    /// ビルダーのテナントで通知イベントを作る
    pub fn event(
        &self,
        recipient: &UserProfile,
        payload: NotificationPayload,
    ) -> NotificationEvent {
        NotificationEvent::new(recipient.id().clone(), self.tenant_id.clone(), payload)
    }

    fn profile(&self, email: &str, role: UserRole, status: UserStatus) -> UserProfile {
        let name = email.split('@').next().unwrap_or(email);
        UserProfile::new(NewUserProfile {
            id: UserId::new(),
            tenant_id: self.tenant_id.clone(),
            email: Email::new(email).unwrap(),
            name: UserName::new(name).unwrap(),
            role,
            status,
            department: None,
            now: self.now,
        })
    }
}

impl Default for NotificationTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
