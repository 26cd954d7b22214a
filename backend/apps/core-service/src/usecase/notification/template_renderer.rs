//! # テンプレートによるメール生成
//!
//! tera テンプレートエンジンで通知メールの件名と HTML 本文を生成する。
//! 生成 API を使わない環境（開発・API キー未設定）向けの決定的な [`TextGenerator`] 実装。
//!
//! ## 設計方針
//!
//! - **`include_str!` によるコンパイル時埋め込み**: テンプレートはバイナリに埋め込まれる
//! - **共通レイアウト**: `layout.html` を各種別のテンプレートが継承する
//! - **件名パターン**: `[{組織名}] {アプリ内通知と同じ件名}`
//! - **リンク**: アプリ内通知の相対リンクを `{base_url}{link}` の絶対 URL にして渡す

use async_trait::async_trait;
use tera::{Context, Tera};
use ticketdesk_domain::notification::{
    EmailDraftInput,
    GeneratedEmail,
    NotificationError,
    NotificationKind,
};
use ticketdesk_infra::text_generation::TextGenerator;

/// テンプレートによるテキスト生成器
pub struct TemplateTextGenerator {
    engine:   Tera,
    base_url: String,
}

impl TemplateTextGenerator {
    /// 新しい生成器を作成する
    ///
    /// `include_str!` で埋め込んだテンプレートを tera に登録する。
    pub fn new(base_url: impl Into<String>) -> Result<Self, NotificationError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(vec![
                (
                    "layout.html",
                    include_str!("../../../templates/notifications/layout.html"),
                ),
                (
                    "newUserPending.html",
                    include_str!("../../../templates/notifications/newUserPending.html"),
                ),
                (
                    "ticketCreated.html",
                    include_str!("../../../templates/notifications/ticketCreated.html"),
                ),
                (
                    "ticketComment.html",
                    include_str!("../../../templates/notifications/ticketComment.html"),
                ),
                (
                    "ticketResolved.html",
                    include_str!("../../../templates/notifications/ticketResolved.html"),
                ),
                (
                    "userApproved.html",
                    include_str!("../../../templates/notifications/userApproved.html"),
                ),
                (
                    "ticketAssigned.html",
                    include_str!("../../../templates/notifications/ticketAssigned.html"),
                ),
                (
                    "userProfileUpdated.html",
                    include_str!("../../../templates/notifications/userProfileUpdated.html"),
                ),
            ])
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self {
            engine,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// 生成入力からメールを組み立てる
    pub fn render(&self, input: &EmailDraftInput) -> Result<GeneratedEmail, NotificationError> {
        let mut context = Context::new();
        context.insert("org_name", &input.org_name);
        context.insert("user_name", &input.user_name);
        context.insert("action_url", &format!("{}{}", self.base_url, input.link));
        context.insert("ticket_title", input.ticket_title.as_deref().unwrap_or_default());
        context.insert(
            "commenter_name",
            input.commenter_name.as_deref().unwrap_or_default(),
        );
        context.insert(
            "new_user_name",
            input.new_user_name.as_deref().unwrap_or_default(),
        );

        let body = self
            .engine
            .render(&format!("{}.html", input.notification_type), &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(GeneratedEmail {
            subject: subject(input),
            body,
        })
    }
}

fn subject(input: &EmailDraftInput) -> String {
    let ticket_title = input.ticket_title.as_deref().unwrap_or_default();
    let headline = match input.notification_type {
        NotificationKind::NewUserPending => format!(
            "New User Pending Approval: {}",
            input.new_user_name.as_deref().unwrap_or_default()
        ),
        NotificationKind::TicketCreated => format!("New Ticket: \"{ticket_title}\""),
        NotificationKind::TicketComment => format!("New Comment on \"{ticket_title}\""),
        NotificationKind::TicketResolved => format!("Ticket Resolved: \"{ticket_title}\""),
        NotificationKind::UserApproved => "Account Approved".to_string(),
        NotificationKind::TicketAssigned => format!("Ticket Assigned: \"{ticket_title}\""),
        NotificationKind::UserProfileUpdated => "Your Profile Was Updated".to_string(),
    };
    format!("[{}] {headline}", input.org_name)
}

#[async_trait]
impl TextGenerator for TemplateTextGenerator {
    async fn generate(&self, input: &EmailDraftInput) -> Result<GeneratedEmail, NotificationError> {
        self.render(input)
    }
}
