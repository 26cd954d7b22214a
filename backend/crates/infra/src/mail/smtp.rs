//! SMTP メール送信実装
//!
//! lettre の `AsyncSmtpTransport` を組織の SMTP 設定から都度組み立てて送信する。
//! 465 番ポートは暗黙的 TLS、それ以外のポートは STARTTLS で接続する。

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Message, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use ticketdesk_domain::{
    notification::{EmailMessage, NotificationError},
    tenant::{Organization, SmtpSettings},
};

use super::{MailTransport, SendOutcome};

/// SMTP 接続のタイムアウト既定値
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP メール送信
#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    timeout: Duration,
}

impl Default for SmtpMailTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl SmtpMailTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_transport(
        &self,
        smtp: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let builder = if smtp.uses_implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        }
        .map_err(|e| NotificationError::SendFailed(format!("SMTP 接続設定が不正: {e}")))?;

        Ok(builder
            .port(smtp.effective_port())
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .timeout(Some(self.timeout))
            .build())
    }
}

/// 組織名を表示名とする差出人でメッセージを組み立てる
fn build_message(from: &str, email: &EmailMessage) -> Result<Message, NotificationError> {
    Message::builder()
        .from(
            from.parse()
                .map_err(|e| NotificationError::SendFailed(format!("送信元アドレス不正: {e}")))?,
        )
        .to(email
            .to
            .parse()
            .map_err(|e| NotificationError::SendFailed(format!("宛先アドレス不正: {e}")))?)
        .subject(&email.subject)
        .header(ContentType::TEXT_HTML)
        .body(email.html_body.clone())
        .map_err(|e| NotificationError::SendFailed(format!("メッセージ構築失敗: {e}")))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(
        &self,
        organization: &Organization,
        email: &EmailMessage,
    ) -> Result<SendOutcome, NotificationError> {
        let (Some(smtp), Some(from)) = (
            organization.mail_credentials(),
            organization.sender_mailbox(),
        ) else {
            return Err(NotificationError::NotConfigured);
        };

        let message = build_message(&from, email)?;
        self.build_transport(smtp)?
            .send(message)
            .await
            .map_err(|e| NotificationError::SendFailed(format!("SMTP 送信失敗: {e}")))?;

        Ok(SendOutcome::Sent)
    }
}
