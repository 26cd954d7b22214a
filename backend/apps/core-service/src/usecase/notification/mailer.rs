//! # メーラー
//!
//! 通知のメール経路。組織の SMTP 設定の確認 → 送信 → 配信記録を行う。
//!
//! 送信の試行 1 回につき配信記録を必ず 1 件書き込む。SMTP 設定が無い組織への
//! 送信は試行せず、「設定なし」の失敗として記録する。送信しないバックエンド
//! （Noop）で処理した試行はスキップとして記録する。配信記録の書き込み失敗は
//! ログに残して握りつぶす。
//!
//! 管理者が選んだ宛先へのカスタムメール（[`Mailer::send_custom_email`]）も
//! 宛先ごとに同じ経路で送る。

use std::sync::Arc;

use futures::future::join_all;
use ticketdesk_domain::{
    clock::Clock,
    notification::{DeliveryAttempt, EmailMessage, NotificationError},
    tenant::Organization,
};
use ticketdesk_infra::{
    mail::{MailTransport, SendOutcome},
    repository::DeliveryLogRepository,
};
use ticketdesk_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};

/// テストメールの件名
pub const TEST_EMAIL_SUBJECT: &str = "Test Email from Complaint Management System";

/// 送信しないバックエンドで処理した試行の記録理由
const SKIPPED_REASON: &str = "mail backend does not deliver (noop)";

/// カスタムメールの宛先ごとの結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomEmailReport {
    /// 送信できた宛先
    pub sent:    Vec<String>,
    /// 送信しないバックエンドで処理された宛先
    pub skipped: Vec<String>,
    /// 送信に失敗した宛先とエラー内容
    pub failed:  Vec<(String, String)>,
}

/// カスタムメールの本文を HTML にする
///
/// `<` で始まる本文は HTML とみなしてそのまま使う。それ以外は `<p>` で囲み、
/// 改行を `<br>` に置き換える。
pub fn custom_email_html(body: &str) -> String {
    if body.trim_start().starts_with('<') {
        body.to_string()
    } else {
        format!("<p>{}</p>", body.replace("\r\n", "\n").replace('\n', "<br>"))
    }
}

/// メーラー
pub struct Mailer {
    transport:    Arc<dyn MailTransport>,
    delivery_log: Arc<dyn DeliveryLogRepository>,
    clock:        Arc<dyn Clock>,
}

impl Mailer {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        delivery_log: Arc<dyn DeliveryLogRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            delivery_log,
            clock,
        }
    }

    /// メールを 1 通送信し、結果を配信記録に残す
    ///
    /// 送信結果はそのまま返す。呼び出し側で握りつぶすかどうかを決める。
    pub async fn deliver(
        &self,
        organization: &Organization,
        email: &EmailMessage,
    ) -> Result<SendOutcome, NotificationError> {
        let result = if organization.mail_credentials().is_none() {
            Err(NotificationError::NotConfigured)
        } else {
            self.transport.send(organization, email).await
        };

        match &result {
            Ok(SendOutcome::Sent) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SENT,
                    event.tenant_id = %organization.id(),
                    event.entity_type = event::entity_type::DELIVERY_LOG,
                    event.result = event::result::SUCCESS,
                    notification.recipient = %email.to,
                    "通知メール送信成功"
                );
                self.record(DeliveryAttempt::success(
                    organization.id().clone(),
                    &email.to,
                    &email.subject,
                    self.clock.now(),
                ))
                .await;
            }
            Ok(SendOutcome::Skipped) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SKIPPED,
                    event.tenant_id = %organization.id(),
                    event.entity_type = event::entity_type::DELIVERY_LOG,
                    event.result = event::result::SKIPPED,
                    notification.recipient = %email.to,
                    "メール送信をスキップ"
                );
                self.record(DeliveryAttempt::skipped(
                    organization.id().clone(),
                    &email.to,
                    &email.subject,
                    SKIPPED_REASON,
                    self.clock.now(),
                ))
                .await;
            }
            Err(e) => self.record_failure(organization, &email.to, &email.subject, e).await,
        }

        result
    }

    /// 選択した宛先にカスタムメールを送る
    ///
    /// 宛先ごとに個別に送信し、それぞれ配信記録を 1 件残す。
    /// 1 件の失敗は他の宛先への送信を止めない。
    pub async fn send_custom_email(
        &self,
        organization: &Organization,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> CustomEmailReport {
        let html_body = custom_email_html(body);
        let results = join_all(recipients.iter().map(|to| {
            let email = EmailMessage {
                to:        to.clone(),
                subject:   subject.to_string(),
                html_body: html_body.clone(),
            };
            async move {
                let result = self.deliver(organization, &email).await;
                (email.to, result)
            }
        }))
        .await;

        let mut report = CustomEmailReport::default();
        for (to, result) in results {
            match result {
                Ok(SendOutcome::Sent) => report.sent.push(to),
                Ok(SendOutcome::Skipped) => report.skipped.push(to),
                Err(e) => {
                    tracing::warn!(
                        error.category = log_error::category::EXTERNAL_SERVICE,
                        error.kind = log_error::kind::MAIL_DELIVERY,
                        error = %e,
                        tenant_id = %organization.id(),
                        recipient = %to,
                        "カスタムメールの送信に失敗"
                    );
                    report.failed.push((to, e.to_string()));
                }
            }
        }
        report
    }

    /// 送信に至らなかった試行を失敗として記録する
    pub async fn record_failure(
        &self,
        organization: &Organization,
        to: &str,
        subject: &str,
        error: &NotificationError,
    ) {
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_FAILED,
            event.tenant_id = %organization.id(),
            event.entity_type = event::entity_type::DELIVERY_LOG,
            event.result = event::result::FAILURE,
            notification.recipient = %to,
            error = %error,
            "通知メール送信失敗"
        );
        self.record(DeliveryAttempt::failure(
            organization.id().clone(),
            to,
            subject,
            error.to_string(),
            self.clock.now(),
        ))
        .await;
    }

    /// 組織の SMTP 設定を確認するためのテストメールを送る
    ///
    /// 通知と異なり、送信失敗は呼び出し元に返す。
    pub async fn send_test_email(
        &self,
        organization: &Organization,
        to: &str,
    ) -> Result<(), NotificationError> {
        let email = EmailMessage {
            to:        to.to_string(),
            subject:   TEST_EMAIL_SUBJECT.to_string(),
            html_body: format!(
                "<p>This is a test email from <strong>{}</strong>.</p>\
                 <p>If you received this message, your SMTP settings are working correctly.</p>",
                organization.name().as_str()
            ),
        };

        self.deliver(organization, &email).await?;

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::TEST_EMAIL_SENT,
            event.tenant_id = %organization.id(),
            event.result = event::result::SUCCESS,
            "テストメール送信"
        );
        Ok(())
    }

    async fn record(&self, attempt: DeliveryAttempt) {
        if let Err(e) = self.delivery_log.insert(&attempt).await {
            tracing::error!(
                error.category = log_error::category::INFRASTRUCTURE,
                error.kind = log_error::kind::DELIVERY_LOG,
                error = %e,
                tenant_id = %attempt.tenant_id,
                "配信記録の書き込みに失敗"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use ticketdesk_domain::{
        clock::FixedClock,
        notification::DeliveryStatus,
        tenant::{SmtpSettings, TenantId, TenantName},
    };
    use ticketdesk_infra::{
        mail::NoopMailTransport,
        mock::{MockDeliveryLogRepository, MockMailTransport},
    };

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn organization(configured: bool) -> Organization {
        Organization::from_db(
            TenantId::new(),
            TenantName::new("Acme").unwrap(),
            configured.then(|| SmtpSettings {
                host:         "smtp.acme.test".to_string(),
                port:         None,
                username:     "noreply@acme.test".to_string(),
                password:     "secret".to_string(),
                from_address: None,
            }),
        )
    }

    fn email() -> EmailMessage {
        EmailMessage {
            to:        "hanako@acme.test".to_string(),
            subject:   "[Acme] Account Approved".to_string(),
            html_body: "<p>Hi</p>".to_string(),
        }
    }

    fn make_mailer(
        transport: MockMailTransport,
        delivery_log: MockDeliveryLogRepository,
    ) -> Mailer {
        Mailer::new(
            Arc::new(transport),
            Arc::new(delivery_log),
            Arc::new(FixedClock::new(now())),
        )
    }

    #[tokio::test]
    async fn test_送信成功時に成功の配信記録を残す() {
        let transport = MockMailTransport::new();
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = make_mailer(transport.clone(), delivery_log.clone());
        let org = organization(true);

        let outcome = sut.deliver(&org, &email()).await.unwrap();

        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(transport.sent(), vec![(org.id().clone(), email())]);
        let attempts = delivery_log.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, DeliveryStatus::Success);
        assert_eq!(attempts[0].to, "hanako@acme.test");
        assert_eq!(attempts[0].sent_at, now());
    }

    #[tokio::test]
    async fn test_smtp未設定の組織には送信せず設定なしとして記録する() {
        let transport = MockMailTransport::new();
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = make_mailer(transport.clone(), delivery_log.clone());

        let result = sut.deliver(&organization(false), &email()).await;

        assert!(matches!(result, Err(NotificationError::NotConfigured)));
        assert!(transport.sent().is_empty());
        let attempts = delivery_log.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, DeliveryStatus::Failure);
        assert_eq!(
            attempts[0].error.as_deref(),
            Some("SMTP settings not configured")
        );
    }

    #[tokio::test]
    async fn test_送信失敗時にエラー内容を記録して返す() {
        let transport = MockMailTransport::new();
        transport.fail_with("connection refused");
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = make_mailer(transport, delivery_log.clone());

        let result = sut.deliver(&organization(true), &email()).await;

        assert!(matches!(result, Err(NotificationError::SendFailed(_))));
        let attempts = delivery_log.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(
            attempts[0]
                .error
                .as_deref()
                .unwrap()
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn test_配信記録の書き込み失敗は送信結果に影響しない() {
        let delivery_log = MockDeliveryLogRepository::new();
        delivery_log.fail_inserts();
        let sut = make_mailer(MockMailTransport::new(), delivery_log.clone());

        let result = sut.deliver(&organization(true), &email()).await;

        assert!(result.is_ok());
        assert!(delivery_log.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_テストメールは固定の件名で送信される() {
        let transport = MockMailTransport::new();
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = make_mailer(transport.clone(), delivery_log.clone());

        sut.send_test_email(&organization(true), "admin@acme.test")
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.subject, TEST_EMAIL_SUBJECT);
        assert_eq!(sent[0].1.to, "admin@acme.test");
        assert_eq!(delivery_log.attempts()[0].subject, TEST_EMAIL_SUBJECT);
    }

    #[tokio::test]
    async fn test_テストメールの送信失敗は呼び出し元に返る() {
        let sut = make_mailer(MockMailTransport::new(), MockDeliveryLogRepository::new());

        let result = sut.send_test_email(&organization(false), "admin@acme.test").await;

        assert!(matches!(result, Err(NotificationError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_送信しないバックエンドではスキップとして記録する() {
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = Mailer::new(
            Arc::new(NoopMailTransport),
            Arc::new(delivery_log.clone()),
            Arc::new(FixedClock::new(now())),
        );

        let outcome = sut.deliver(&organization(true), &email()).await.unwrap();

        assert_eq!(outcome, SendOutcome::Skipped);
        let attempts = delivery_log.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, DeliveryStatus::Skipped);
        assert_eq!(attempts[0].error.as_deref(), Some(SKIPPED_REASON));
    }

    #[test]
    fn test_プレーンテキストの本文は段落と改行タグに変換される() {
        assert_eq!(
            custom_email_html("こんにちは\n来週メンテナンスがあります"),
            "<p>こんにちは<br>来週メンテナンスがあります</p>"
        );
        assert_eq!(
            custom_email_html("  <h1>お知らせ</h1>"),
            "  <h1>お知らせ</h1>"
        );
    }

    #[tokio::test]
    async fn test_カスタムメールは宛先ごとに送信し配信記録を残す() {
        let transport = MockMailTransport::new();
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = make_mailer(transport.clone(), delivery_log.clone());
        let recipients = vec!["a@acme.test".to_string(), "b@acme.test".to_string()];

        let report = sut
            .send_custom_email(&organization(true), &recipients, "お知らせ", "本文")
            .await;

        assert_eq!(report.sent, recipients);
        assert!(report.failed.is_empty());
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, email)| email.html_body == "<p>本文</p>"));
        let attempts = delivery_log.attempts();
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.subject == "お知らせ"));
    }

    #[tokio::test]
    async fn test_カスタムメールは1件の失敗で他の宛先を止めない() {
        let transport = MockMailTransport::new();
        transport.fail_for("b@acme.test");
        let delivery_log = MockDeliveryLogRepository::new();
        let sut = make_mailer(transport.clone(), delivery_log.clone());
        let recipients = vec![
            "a@acme.test".to_string(),
            "b@acme.test".to_string(),
            "c@acme.test".to_string(),
        ];

        let report = sut
            .send_custom_email(&organization(true), &recipients, "お知らせ", "本文")
            .await;

        assert_eq!(report.sent, vec!["a@acme.test", "c@acme.test"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b@acme.test");
        let mut statuses: Vec<_> = delivery_log
            .attempts()
            .into_iter()
            .map(|a| (a.to, a.status))
            .collect();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            statuses,
            vec![
                ("a@acme.test".to_string(), DeliveryStatus::Success),
                ("b@acme.test".to_string(), DeliveryStatus::Failure),
                ("c@acme.test".to_string(), DeliveryStatus::Success),
            ]
        );
    }
}
