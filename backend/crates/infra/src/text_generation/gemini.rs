//! Gemini API によるメール本文生成
//!
//! `generateContent` エンドポイントに JSON 出力を指定して呼び出し、
//! `{ "subject": ..., "body": ... }` を受け取る。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ticketdesk_domain::notification::{
    EmailDraftInput,
    GeneratedEmail,
    NotificationError,
    NotificationKind,
};

use super::TextGenerator;

/// モデル名の既定値
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 生成 API 呼び出しのタイムアウト
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini テキスト生成器
#[derive(Clone)]
pub struct GeminiTextGenerator {
    base_url: String,
    api_key:  String,
    model:    String,
    client:   reqwest::Client,
}

impl std::fmt::Debug for GeminiTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTextGenerator")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiTextGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, model)
    }

    /// 接続先を指定して作成する（プロキシ経由の利用など）
    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// 通知種別ごとのメールの目的
fn purpose(input: &EmailDraftInput) -> String {
    let ticket = format!(
        "{}: {}",
        input.ticket_id.as_deref().unwrap_or_default(),
        input.ticket_title.as_deref().unwrap_or_default()
    );
    match input.notification_type {
        NotificationKind::NewUserPending => format!(
            "Tell an administrator that a new user ({}) is waiting for approval.",
            input.new_user_name.as_deref().unwrap_or_default()
        ),
        NotificationKind::TicketCreated => format!(
            "Tell a supervisor that a new ticket ({ticket}) was created in their department."
        ),
        NotificationKind::TicketComment => format!(
            "Tell the ticket owner that {} commented on ticket {ticket}.",
            input.commenter_name.as_deref().unwrap_or_default()
        ),
        NotificationKind::TicketResolved => {
            format!("Tell the reporter that their ticket {ticket} has been resolved.")
        }
        NotificationKind::UserApproved => format!(
            "Tell the user that their account for {} has been approved.",
            input.org_name
        ),
        NotificationKind::TicketAssigned => {
            format!("Tell a supervisor that ticket {ticket} was assigned to their department.")
        }
        NotificationKind::UserProfileUpdated => {
            "Tell the user that an administrator changed their role or department.".to_string()
        }
    }
}

/// 生成 API に渡すプロンプトを組み立てる
fn build_prompt(input: &EmailDraftInput) -> Result<String, NotificationError> {
    let data = serde_json::to_string_pretty(input)
        .map_err(|e| NotificationError::GenerationFailed(format!("入力のシリアライズに失敗: {e}")))?;

    Ok(format!(
        "You write professional transactional HTML emails for a complaint management system.\n\
         Return JSON with a `subject` line and an HTML `body`.\n\
         Rules for the body: inline CSS only (no <style> blocks); a header showing the \
         organization name \"{org}\"; a greeting to {user}; short, clear paragraphs; a footer \
         stating that this is an automated notification and should not be replied to.\n\n\
         Purpose: {purpose}\n\n\
         Notification data:\n{data}\n",
        org = input.org_name,
        user = input.user_name,
        purpose = purpose(input),
    ))
}

/// 生成 API の応答から件名と本文を取り出す
fn parse_response(response: GenerateContentResponse) -> Result<GeneratedEmail, NotificationError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .map(|candidate| {
            candidate
                .content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect()
        })
        .ok_or_else(|| NotificationError::GenerationFailed("候補が返されなかった".to_string()))?;

    let email: GeneratedEmail = serde_json::from_str(text.trim())
        .map_err(|e| NotificationError::GenerationFailed(format!("応答の形式が不正: {e}")))?;

    if email.subject.trim().is_empty() || email.body.trim().is_empty() {
        return Err(NotificationError::GenerationFailed(
            "件名または本文が空".to_string(),
        ));
    }

    Ok(email)
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    #[tracing::instrument(skip_all, level = "debug", fields(kind = %input.notification_type))]
    async fn generate(&self, input: &EmailDraftInput) -> Result<GeneratedEmail, NotificationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = json!({
            "contents": [{ "role": "user", "parts": [{ "text": build_prompt(input)? }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "subject": { "type": "STRING" },
                        "body": { "type": "STRING" }
                    },
                    "required": ["subject", "body"]
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::GenerationFailed(format!("生成 API 呼び出し失敗: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::GenerationFailed(format!(
                "予期しないステータス {status}: {body}"
            )));
        }

        let body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| NotificationError::GenerationFailed(format!("応答の読み取り失敗: {e}")))?;

        parse_response(body)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use ticketdesk_domain::{notification::NotificationPayload, ticket::TicketId};

    use super::*;

    fn comment_input() -> EmailDraftInput {
        EmailDraftInput::new(
            &NotificationPayload::TicketComment {
                ticket_id:      TicketId::new(),
                ticket_title:   "空調が効かない".to_string(),
                commenter_name: "鈴木一郎".to_string(),
            },
            "山田花子",
            "Acme",
        )
    }

    fn response(text: &str) -> GenerateContentResponse {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .unwrap()
    }

    #[test]
    fn test_プロンプトに組織名と受信者名と目的が入る() {
        let prompt = build_prompt(&comment_input()).unwrap();

        assert!(prompt.contains("\"Acme\""));
        assert!(prompt.contains("山田花子"));
        assert!(prompt.contains("鈴木一郎 commented on ticket"));
        assert!(prompt.contains("\"notificationType\": \"ticketComment\""));
    }

    #[test]
    fn test_応答のjsonから件名と本文を取り出す() {
        let email = parse_response(response(
            r#"{"subject": "New comment", "body": "<div>hi</div>"}"#,
        ))
        .unwrap();

        assert_eq!(
            email,
            GeneratedEmail {
                subject: "New comment".to_string(),
                body:    "<div>hi</div>".to_string(),
            }
        );
    }

    #[test]
    fn test_候補が無い応答は生成失敗になる() {
        let result = parse_response(GenerateContentResponse { candidates: vec![] });
        assert!(matches!(result, Err(NotificationError::GenerationFailed(_))));
    }

    #[test]
    fn test_jsonでない応答は生成失敗になる() {
        let result = parse_response(response("Sure! Here is your email"));
        assert!(matches!(result, Err(NotificationError::GenerationFailed(_))));
    }

    #[test]
    fn test_空の件名は生成失敗になる() {
        let result = parse_response(response(r#"{"subject": " ", "body": "<p>x</p>"}"#));
        assert!(matches!(result, Err(NotificationError::GenerationFailed(_))));
    }

    #[test]
    fn test_debug出力でapiキーがマスクされる() {
        let generator = GeminiTextGenerator::new("secret-key", DEFAULT_GEMINI_MODEL);
        let debug = format!("{generator:?}");

        assert!(!debug.contains("secret-key"));
        assert!(debug.contains(DEFAULT_GEMINI_MODEL));
    }
}
