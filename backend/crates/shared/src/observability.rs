//! # ログ出力の初期化
//!
//! 通知ディスパッチのログを JSON または Pretty で出力する subscriber を組み立てる。
//!
//! 形式とフィルタは呼び出し側の設定（core-service の `CoreConfig`）が決める。
//! このモジュールは環境変数を読まない。

/// フィルタ未指定時、または指定値を解釈できない時に使うディレクティブ
pub const DEFAULT_FILTER: &str = "info,ticketdesk=debug";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1 イベント 1 行の JSON（ログ収集基盤向け）
    Json,
    /// 人間が読みやすい形式
    #[default]
    Pretty,
}

impl LogFormat {
    /// 設定値からログ形式を解釈する
    ///
    /// 前後の空白と大文字小文字は無視する。解釈できなければ `None`。
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// 初期化ログに出すサービス名（バイナリ名）
    pub service_name: String,
    pub format:       LogFormat,
    /// `EnvFilter` 形式のディレクティブ（例: `"warn,ticketdesk_infra=debug"`）
    pub filter:       String,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            format:       LogFormat::default(),
            filter:       DEFAULT_FILTER.to_string(),
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// フィルタを差し替える。空白のみの値は無視して既定値のままにする。
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        if !filter.trim().is_empty() {
            self.filter = filter;
        }
        self
    }
}

/// 設定値からフィルタを作る。解釈できなければ既定値と解釈エラーを返す。
#[cfg(feature = "observability")]
fn build_filter(
    directives: &str,
) -> (
    tracing_subscriber::EnvFilter,
    Option<tracing_subscriber::filter::ParseError>,
) {
    use tracing_subscriber::EnvFilter;

    match EnvFilter::try_new(directives) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(e)),
    }
}

/// グローバル subscriber を登録する
///
/// `ErrorLayer` を含めるため、インフラ層のエラーが捕捉する `SpanTrace`
/// にはエラー発生時点のスパンが入る。
///
/// 既に subscriber が登録済みの場合はエラーを返す。
#[cfg(feature = "observability")]
pub fn init_tracing(
    config: &TracingConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let (filter, rejected) = build_filter(&config.filter);

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;

    if let Some(e) = rejected {
        tracing::warn!(
            filter = %config.filter,
            error = %e,
            fallback = DEFAULT_FILTER,
            "ログフィルタを解釈できないため既定値で出力します"
        );
    }
    tracing::debug!(
        service = %config.service_name,
        format = ?config.format,
        "トレーシングを初期化"
    );
    Ok(())
}
