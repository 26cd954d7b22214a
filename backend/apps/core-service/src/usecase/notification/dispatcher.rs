//! # 通知ディスパッチャ
//!
//! 通知イベント 1 件を「メール 0〜1 通 + アプリ内通知 1 件」に変換する。
//!
//! ## 処理フロー
//!
//! 1. 受信者プロファイルと組織を取得する。どちらかが無ければ何も作成せずに終わる
//! 2. イベントを分類してアプリ内通知のテンプレートを得る
//! 3. 通知設定とテキスト生成能力を確認し、条件を満たせばメールを生成・送信する
//! 4. アプリ内通知を必ず 1 件保存する
//!
//! メール経路の失敗はすべてこのモジュール内で回収し、アプリ内通知の作成を妨げない。
//! 呼び出し元に返るエラーは受信者情報の取得失敗とアプリ内通知の保存失敗のみ。
//! ユースケースは [`NotificationDispatcher::notify`] / [`NotificationDispatcher::notify_all`]
//! を使い、これらのエラーもログに残すだけにする。

use std::sync::Arc;

use futures::future::join_all;
use ticketdesk_domain::{
    clock::Clock,
    notification::{
        EmailDraftInput,
        EmailMessage,
        NotificationError,
        NotificationEvent,
        NotificationPayload,
        NotificationRecord,
        NotificationTemplate,
    },
    tenant::Organization,
    user::UserProfile,
};
use ticketdesk_infra::{
    mail::SendOutcome,
    repository::{NotificationRepository, OrganizationRepository, UserProfileRepository},
    text_generation::TextGenerator,
};
use ticketdesk_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};

use super::Mailer;

/// メール経路の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailOutcome {
    /// 送信した
    Sent,
    /// 送信しないバックエンドで処理した（配信記録にスキップとして残る）
    Skipped,
    /// 生成または送信に失敗した（配信記録に失敗として残る）
    Failed(String),
    /// 受信者の通知設定で無効
    OptedOut,
    /// テキスト生成能力が無い
    GeneratorUnavailable,
}

/// ディスパッチ結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// アプリ内通知を作成した
    Delivered {
        record: NotificationRecord,
        email:  EmailOutcome,
    },
    /// 受信者または組織が見つからず、何も作成しなかった
    RecipientUnavailable,
}

impl DispatchOutcome {
    /// 作成されたアプリ内通知
    pub fn record(&self) -> Option<&NotificationRecord> {
        match self {
            Self::Delivered { record, .. } => Some(record),
            Self::RecipientUnavailable => None,
        }
    }
}

/// 通知ディスパッチャ
///
/// すべてのユースケースの通知はここを通る。
pub struct NotificationDispatcher {
    profiles:      Arc<dyn UserProfileRepository>,
    organizations: Arc<dyn OrganizationRepository>,
    notifications: Arc<dyn NotificationRepository>,
    generator:     Option<Arc<dyn TextGenerator>>,
    mailer:        Arc<Mailer>,
    clock:         Arc<dyn Clock>,
}

impl NotificationDispatcher {
    /// ディスパッチャを作成する
    ///
    /// `generator` が `None` の場合、メール経路は実行しない。
    pub fn new(
        profiles: Arc<dyn UserProfileRepository>,
        organizations: Arc<dyn OrganizationRepository>,
        notifications: Arc<dyn NotificationRepository>,
        generator: Option<Arc<dyn TextGenerator>>,
        mailer: Arc<Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            organizations,
            notifications,
            generator,
            mailer,
            clock,
        }
    }

    /// 通知イベントを 1 件処理する
    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(
            kind = %event.kind(),
            recipient = %event.recipient_user_id,
            tenant_id = %event.tenant_id
        )
    )]
    pub async fn dispatch(
        &self,
        event: &NotificationEvent,
    ) -> Result<DispatchOutcome, NotificationError> {
        let Some((profile, organization)) = self.load_recipient(event).await? else {
            return Ok(DispatchOutcome::RecipientUnavailable);
        };

        let template = event.payload.classify();
        let email = self
            .send_email(&profile, &organization, &event.payload, &template)
            .await;

        let record = NotificationRecord::unread(profile.id().clone(), template, self.clock.now());
        if let Err(e) = self.notifications.insert(&record).await {
            tracing::error!(
                error.category = log_error::category::INFRASTRUCTURE,
                error.kind = log_error::kind::NOTIFICATION_STORE,
                error = %e,
                "アプリ内通知の保存に失敗"
            );
            return Err(NotificationError::StoreFailed(e.to_string()));
        }

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_CREATED,
            event.entity_type = event::entity_type::NOTIFICATION,
            event.entity_id = %record.id,
            event.tenant_id = %organization.id(),
            event.result = event::result::SUCCESS,
            notification.kind = %event.kind(),
            "アプリ内通知を作成"
        );

        Ok(DispatchOutcome::Delivered { record, email })
    }

    /// 複数の通知イベントを並行に処理する
    ///
    /// すべての結果を集める。1 件の失敗が他のイベントの処理を止めることはない。
    pub async fn dispatch_all(
        &self,
        events: &[NotificationEvent],
    ) -> Vec<Result<DispatchOutcome, NotificationError>> {
        join_all(events.iter().map(|event| self.dispatch(event))).await
    }

    /// 通知を送る（fire-and-forget）
    ///
    /// 失敗はログに残すだけで返さない。
    pub async fn notify(&self, event: NotificationEvent) {
        let result = self.dispatch(&event).await;
        log_failure(&event, result);
    }

    /// 複数の受信者に通知を送る（fire-and-forget）
    pub async fn notify_all(&self, events: Vec<NotificationEvent>) {
        let results = self.dispatch_all(&events).await;
        for (event, result) in events.iter().zip(results) {
            log_failure(event, result);
        }
    }

    async fn load_recipient(
        &self,
        event: &NotificationEvent,
    ) -> Result<Option<(UserProfile, Organization)>, NotificationError> {
        let profile = self
            .profiles
            .find_by_id(&event.recipient_user_id)
            .await
            .map_err(|e| NotificationError::RecipientLookupFailed(e.to_string()))?;
        let Some(profile) = profile.filter(|p| p.tenant_id() == &event.tenant_id) else {
            tracing::warn!(
                error.category = log_error::category::INFRASTRUCTURE,
                error.kind = log_error::kind::RECIPIENT_LOOKUP,
                "受信者のプロファイルが見つからないため通知しない"
            );
            return Ok(None);
        };

        let organization = self
            .organizations
            .find_by_id(&event.tenant_id)
            .await
            .map_err(|e| NotificationError::RecipientLookupFailed(e.to_string()))?;
        let Some(organization) = organization else {
            tracing::warn!(
                error.category = log_error::category::INFRASTRUCTURE,
                error.kind = log_error::kind::RECIPIENT_LOOKUP,
                "組織が見つからないため通知しない"
            );
            return Ok(None);
        };

        Ok(Some((profile, organization)))
    }

    async fn send_email(
        &self,
        profile: &UserProfile,
        organization: &Organization,
        payload: &NotificationPayload,
        template: &NotificationTemplate,
    ) -> EmailOutcome {
        let preference_key = payload.preference_key();
        if !profile.notification_preferences().allows(preference_key) {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_SKIPPED,
                event.tenant_id = %organization.id(),
                event.result = event::result::SKIPPED,
                notification.preference = %preference_key,
                "通知設定によりメールを送信しない"
            );
            return EmailOutcome::OptedOut;
        }

        let Some(generator) = &self.generator else {
            tracing::debug!("テキスト生成能力が無いためメールを送信しない");
            return EmailOutcome::GeneratorUnavailable;
        };

        let to = profile.email().as_str();
        let input = EmailDraftInput::new(
            payload,
            profile.name().as_str(),
            organization.name().as_str(),
        );

        let generated = match generator.generate(&input).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::warn!(
                    error.category = log_error::category::EXTERNAL_SERVICE,
                    error.kind = log_error::kind::TEXT_GENERATION,
                    error = %e,
                    "メール本文の生成に失敗"
                );
                self.mailer
                    .record_failure(organization, to, &template.title, &e)
                    .await;
                return EmailOutcome::Failed(e.to_string());
            }
        };

        let email = EmailMessage {
            to:        to.to_string(),
            subject:   generated.subject,
            html_body: generated.body,
        };
        match self.mailer.deliver(organization, &email).await {
            Ok(SendOutcome::Sent) => EmailOutcome::Sent,
            Ok(SendOutcome::Skipped) => EmailOutcome::Skipped,
            Err(e) => {
                tracing::warn!(
                    error.category = log_error::category::EXTERNAL_SERVICE,
                    error.kind = log_error::kind::MAIL_DELIVERY,
                    error = %e,
                    "通知メールの送信に失敗"
                );
                EmailOutcome::Failed(e.to_string())
            }
        }
    }
}

fn log_failure(event: &NotificationEvent, result: Result<DispatchOutcome, NotificationError>) {
    if let Err(e) = result {
        tracing::error!(
            error.category = log_error::category::INFRASTRUCTURE,
            error.kind = log_error::kind::NOTIFICATION_STORE,
            error = %e,
            notification.kind = %event.kind(),
            recipient = %event.recipient_user_id,
            tenant_id = %event.tenant_id,
            "通知のディスパッチに失敗"
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use ticketdesk_domain::{
        notification::{DeliveryStatus, IconKind},
        ticket::TicketId,
        user::{NotificationPreferences, UserId, UserRole},
    };

    use super::*;
    use crate::test_utils::NotificationTestBuilder;

    fn resolved(ticket_id: &TicketId) -> NotificationPayload {
        NotificationPayload::TicketResolved {
            ticket_id:    ticket_id.clone(),
            ticket_title: "空調が効かない".to_string(),
        }
    }

    #[tokio::test]
    async fn test_メールとアプリ内通知の両方を作成する() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);
        let ticket_id = TicketId::new();

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&user, resolved(&ticket_id)))
            .await
            .unwrap();

        let DispatchOutcome::Delivered { record, email } = outcome else {
            panic!("アプリ内通知が作成されていない");
        };
        assert_eq!(email, EmailOutcome::Sent);
        assert_eq!(record.title, "Ticket Resolved: \"空調が効かない\"");
        assert_eq!(record.link, format!("/dashboard/tickets/{ticket_id}"));
        assert_eq!(record.icon, IconKind::Check);
        assert!(!record.read);
        assert_eq!(record.created_at, builder.now());
        assert_eq!(setup.notification_repo.records_for(user.id()), vec![record]);

        let sent = setup.mail_transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.to, "hanako@acme.test");
        assert_eq!(setup.delivery_log.attempts()[0].status, DeliveryStatus::Success);
    }

    #[tokio::test]
    async fn test_通知設定がオフならメールを送らずアプリ内通知のみ作成する() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        let user = builder.add_profile_with_preferences(
            &setup,
            "hanako@acme.test",
            UserRole::Employee,
            NotificationPreferences {
                ticket_updates: Some(false),
                ..NotificationPreferences::default()
            },
        );

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&user, resolved(&TicketId::new())))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DispatchOutcome::Delivered {
                email: EmailOutcome::OptedOut,
                ..
            }
        ));
        assert_eq!(setup.notification_repo.records_for(user.id()).len(), 1);
        assert!(setup.mail_transport.sent().is_empty());
        assert_eq!(setup.text_generator.call_count(), 0);
        assert!(setup.delivery_log.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_生成に失敗してもアプリ内通知を作成し失敗を配信記録に残す() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        setup.text_generator.fail();
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&user, resolved(&TicketId::new())))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DispatchOutcome::Delivered {
                email: EmailOutcome::Failed(_),
                ..
            }
        ));
        assert_eq!(setup.notification_repo.records_for(user.id()).len(), 1);
        assert!(setup.mail_transport.sent().is_empty());
        let attempts = setup.delivery_log.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, DeliveryStatus::Failure);
        assert_eq!(attempts[0].subject, "Ticket Resolved: \"空調が効かない\"");
    }

    #[tokio::test]
    async fn test_送信に失敗してもアプリ内通知を作成する() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        setup.mail_transport.fail_with("connection refused");
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&user, resolved(&TicketId::new())))
            .await
            .unwrap();

        assert!(outcome.record().is_some());
        assert_eq!(setup.delivery_log.attempts()[0].status, DeliveryStatus::Failure);
    }

    #[tokio::test]
    async fn test_smtp未設定の組織でもアプリ内通知を作成し設定なしを記録する() {
        let builder = NotificationTestBuilder::new().without_smtp();
        let setup = builder.build();
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&user, NotificationPayload::UserApproved))
            .await
            .unwrap();

        assert!(outcome.record().is_some());
        assert!(setup.mail_transport.sent().is_empty());
        assert_eq!(
            setup.delivery_log.attempts()[0].error.as_deref(),
            Some("SMTP settings not configured")
        );
    }

    #[tokio::test]
    async fn test_生成能力が無ければメールを試行しない() {
        let builder = NotificationTestBuilder::new().without_text_generator();
        let setup = builder.build();
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&user, NotificationPayload::UserApproved))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            DispatchOutcome::Delivered {
                email: EmailOutcome::GeneratorUnavailable,
                ..
            }
        ));
        assert!(setup.delivery_log.attempts().is_empty());
        assert_eq!(setup.notification_repo.records().len(), 1);
    }

    #[tokio::test]
    async fn test_受信者が見つからなければ何も作成しない() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        let event = NotificationEvent::new(
            UserId::new(),
            builder.tenant_id().clone(),
            NotificationPayload::UserApproved,
        );

        let outcome = setup.dispatcher.dispatch(&event).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::RecipientUnavailable);
        assert!(setup.notification_repo.records().is_empty());
        assert!(setup.mail_transport.sent().is_empty());
        assert_eq!(setup.text_generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_別テナントの受信者には通知しない() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        let other_tenant = NotificationTestBuilder::new();
        let outsider = other_tenant.add_profile(&setup, "out@other.test", UserRole::Employee);

        let outcome = setup
            .dispatcher
            .dispatch(&builder.event(&outsider, NotificationPayload::UserApproved))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::RecipientUnavailable);
        assert!(setup.notification_repo.records().is_empty());
    }

    #[tokio::test]
    async fn test_保存失敗は呼び出し元に返る() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        setup.notification_repo.fail_inserts();
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);

        let result = setup
            .dispatcher
            .dispatch(&builder.event(&user, NotificationPayload::UserApproved))
            .await;

        assert!(matches!(result, Err(NotificationError::StoreFailed(_))));
    }

    #[tokio::test]
    async fn test_一括ディスパッチは一件の失敗で他を止めない() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        let admins: Vec<_> = ["a1@acme.test", "a2@acme.test", "a3@acme.test"]
            .into_iter()
            .map(|email| builder.add_profile(&setup, email, UserRole::Admin))
            .collect();
        setup.profile_repo.fail_lookup_for(admins[1].id());
        let events: Vec<_> = admins
            .iter()
            .map(|admin| {
                builder.event(
                    admin,
                    NotificationPayload::NewUserPending {
                        new_user_name: "新人".to_string(),
                    },
                )
            })
            .collect();

        let results = setup.dispatcher.dispatch_all(&events).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(NotificationError::RecipientLookupFailed(_))
        ));
        assert!(results[2].is_ok());
        assert_eq!(setup.notification_repo.records_for(admins[0].id()).len(), 1);
        assert!(setup.notification_repo.records_for(admins[1].id()).is_empty());
        assert_eq!(setup.notification_repo.records_for(admins[2].id()).len(), 1);
    }

    #[tokio::test]
    async fn test_notifyは失敗してもパニックしない() {
        let builder = NotificationTestBuilder::new();
        let setup = builder.build();
        setup.notification_repo.fail_inserts();
        let user = builder.add_profile(&setup, "hanako@acme.test", UserRole::Employee);

        // notify() は () を返す
        setup
            .dispatcher
            .notify(builder.event(&user, NotificationPayload::UserProfileUpdated))
            .await;

        assert!(setup.notification_repo.records().is_empty());
    }
}
