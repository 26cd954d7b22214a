//! # Core Service 設定
//!
//! 環境変数から通知サブシステムとログ出力の設定を読み込む。
//!
//! 設定はプロセス起動時に一度だけ読み込み、構造体としてコンストラクタに渡す。
//! ユースケースやディスパッチャが環境変数を直接参照することはない。
//!
//! 組織ごとの SMTP 認証情報はここでは扱わない（組織レコードが保持する）。

use std::{env, time::Duration};

use thiserror::Error;
use ticketdesk_infra::text_generation::DEFAULT_GEMINI_MODEL;
use ticketdesk_shared::observability::{LogFormat, TracingConfig};

/// 既読化までの既定の遅延（ミリ秒）
pub const DEFAULT_MARK_READ_DELAY_MS: u64 = 2000;

/// メール内リンクの既定のベース URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:9002";

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 必須の環境変数が未設定
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    /// 値を解釈できない
    #[error("{name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Core Service の設定
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// データベース接続 URL
    pub database_url: String,
    /// 通知設定
    pub notification: NotificationConfig,
    /// ログ出力設定
    pub log:          LogConfig,
}

/// ログ出力設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `LOG_FORMAT`（`json` / `pretty`）
    pub format: LogFormat,
    /// `RUST_LOG`。未設定なら既定のフィルタを使う。
    pub filter: Option<String>,
}

/// メール送信バックエンド（`MAIL_BACKEND`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    /// 組織ごとの SMTP 設定で送信する
    Smtp,
    /// 送信しない（ログ出力のみ）
    Noop,
}

/// メール本文の生成バックエンド（`TEXT_GENERATION_BACKEND`）
#[derive(Clone, PartialEq, Eq)]
pub enum TextGenerationBackend {
    /// Gemini API で生成する
    Gemini { api_key: String, model: String },
    /// tera テンプレートで決定的に生成する
    Template,
    /// 生成能力なし（メール経路は無効）
    Disabled,
}

impl std::fmt::Debug for TextGenerationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini { model, .. } => f
                .debug_struct("Gemini")
                .field("api_key", &"[REDACTED]")
                .field("model", model)
                .finish(),
            Self::Template => f.write_str("Template"),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

/// 通知機能の設定
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub mail_backend:    MailBackend,
    pub text_generation: TextGenerationBackend,
    /// フロントエンドのベース URL（メール内リンク用）
    pub base_url:        String,
    /// 受信箱を開いてから全件既読にするまでの遅延
    pub mark_read_delay: Duration,
}

impl CoreConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            notification: NotificationConfig::from_lookup(&lookup)?,
            log:          LogConfig::from_lookup(&lookup)?,
        })
    }

    /// バイナリ名を添えてトレーシング初期化設定を作る
    pub fn tracing_config(&self, service_name: &str) -> TracingConfig {
        let config = TracingConfig::new(service_name).with_format(self.log.format);
        match &self.log.filter {
            Some(filter) => config.with_filter(filter.as_str()),
            None => config,
        }
    }
}

impl LogConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let format = match lookup("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(value) => match LogFormat::from_name(&value) {
                Some(format) => format,
                None => {
                    return Err(ConfigError::Invalid {
                        name: "LOG_FORMAT",
                        value,
                    });
                }
            },
        };

        Ok(Self {
            format,
            filter: lookup("RUST_LOG").filter(|filter| !filter.trim().is_empty()),
        })
    }
}

impl NotificationConfig {
    /// 環境変数から通知設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mail_backend = match lookup("MAIL_BACKEND").as_deref() {
            None | Some("smtp") => MailBackend::Smtp,
            Some("noop") => MailBackend::Noop,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name:  "MAIL_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let text_generation = match lookup("TEXT_GENERATION_BACKEND").as_deref() {
            None | Some("template") => TextGenerationBackend::Template,
            Some("none") => TextGenerationBackend::Disabled,
            Some("gemini") => match lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty()) {
                Some(api_key) => TextGenerationBackend::Gemini {
                    api_key,
                    model: lookup("GEMINI_MODEL")
                        .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                },
                // API キーが無ければ生成能力なしとして扱う
                None => TextGenerationBackend::Disabled,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name:  "TEXT_GENERATION_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let mark_read_delay_ms = match lookup("NOTIFICATION_MARK_READ_DELAY_MS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "NOTIFICATION_MARK_READ_DELAY_MS",
                value,
            })?,
            None => DEFAULT_MARK_READ_DELAY_MS,
        };

        Ok(Self {
            mail_backend,
            text_generation,
            base_url: lookup("NOTIFICATION_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            mark_read_delay: Duration::from_millis(mark_read_delay_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_未設定の項目は既定値になる() {
        let config =
            CoreConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/td")]))
                .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/td");
        assert_eq!(config.notification.mail_backend, MailBackend::Smtp);
        assert_eq!(
            config.notification.text_generation,
            TextGenerationBackend::Template
        );
        assert_eq!(config.notification.base_url, "http://localhost:9002");
        assert_eq!(
            config.notification.mark_read_delay,
            Duration::from_millis(2000)
        );
        assert_eq!(
            config.log,
            LogConfig {
                format: LogFormat::Pretty,
                filter: None,
            }
        );
    }

    #[test]
    fn test_database_urlが無いとエラーになる() {
        let result = CoreConfig::from_lookup(lookup_from(&[]));

        assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_geminiはapiキーとモデルを読み込む() {
        let config = NotificationConfig::from_lookup(lookup_from(&[
            ("TEXT_GENERATION_BACKEND", "gemini"),
            ("GEMINI_API_KEY", "key-123"),
        ]))
        .unwrap();

        assert_eq!(
            config.text_generation,
            TextGenerationBackend::Gemini {
                api_key: "key-123".to_string(),
                model:   "gemini-2.0-flash".to_string(),
            }
        );
    }

    #[test]
    fn test_apiキーの無いgeminiは生成能力なしになる() {
        let config =
            NotificationConfig::from_lookup(lookup_from(&[("TEXT_GENERATION_BACKEND", "gemini")]))
                .unwrap();

        assert_eq!(config.text_generation, TextGenerationBackend::Disabled);
    }

    #[test]
    fn test_不明なバックエンドはエラーになる() {
        let result = NotificationConfig::from_lookup(lookup_from(&[("MAIL_BACKEND", "ses")]));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid {
                name:  "MAIL_BACKEND",
                value: "ses".to_string(),
            }
        );
    }

    #[test]
    fn test_既読化の遅延とベースurlを読み込む() {
        let config = NotificationConfig::from_lookup(lookup_from(&[
            ("NOTIFICATION_MARK_READ_DELAY_MS", "500"),
            ("NOTIFICATION_BASE_URL", "https://desk.example.com/"),
            ("MAIL_BACKEND", "noop"),
        ]))
        .unwrap();

        assert_eq!(config.mark_read_delay, Duration::from_millis(500));
        assert_eq!(config.base_url, "https://desk.example.com");
        assert_eq!(config.mail_backend, MailBackend::Noop);
    }

    #[test]
    fn test_debug出力でapiキーがマスクされる() {
        let backend = TextGenerationBackend::Gemini {
            api_key: "secret-key".to_string(),
            model:   "gemini-2.0-flash".to_string(),
        };

        assert!(!format!("{backend:?}").contains("secret-key"));
    }

    #[test]
    fn test_ログ形式とフィルタをトレーシング設定に渡す() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/td"),
            ("LOG_FORMAT", "json"),
            ("RUST_LOG", "warn,ticketdesk_infra=debug"),
        ]))
        .unwrap();

        let tracing = config.tracing_config("send-test-email");

        assert_eq!(tracing.service_name, "send-test-email");
        assert_eq!(tracing.format, LogFormat::Json);
        assert_eq!(tracing.filter, "warn,ticketdesk_infra=debug");
    }

    #[test]
    fn test_rust_log未設定なら既定のフィルタを使う() {
        let config =
            CoreConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/td")]))
                .unwrap();

        assert_eq!(
            config.tracing_config("svc").filter,
            ticketdesk_shared::observability::DEFAULT_FILTER
        );
    }

    #[test]
    fn test_不明なログ形式はエラーになる() {
        let result = LogConfig::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")]));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid {
                name:  "LOG_FORMAT",
                value: "xml".to_string(),
            }
        );
    }
}
