//! Noop メール送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! 開発環境やメール送信を止めたい環境で使用する。
//! 結果は [`SendOutcome::Skipped`] となり、配信記録にもスキップとして残る。

use async_trait::async_trait;
use ticketdesk_domain::{
    notification::{EmailMessage, NotificationError},
    tenant::Organization,
};

use super::{MailTransport, SendOutcome};

/// Noop メール送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopMailTransport;

#[async_trait]
impl MailTransport for NoopMailTransport {
    async fn send(
        &self,
        organization: &Organization,
        email: &EmailMessage,
    ) -> Result<SendOutcome, NotificationError> {
        tracing::info!(
            tenant_id = %organization.id(),
            to = %email.to,
            subject = %email.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(SendOutcome::Skipped)
    }
}
