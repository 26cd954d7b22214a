//! ID 型と検証付き文字列型を生成するマクロ

use crate::DomainError;

/// 前後の空白を除き、空でないことと最大文字数を確認する
///
/// 文字数は `chars().count()` で数える（件名やコメントは日本語が中心のため）。
pub(crate) fn normalize_text(
    label: &str,
    value: String,
    max_length: usize,
) -> Result<String, DomainError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{label}は必須です")));
    }
    if trimmed.chars().count() > max_length {
        return Err(DomainError::Validation(format!(
            "{label}は {max_length} 文字以内である必要があります"
        )));
    }

    Ok(trimmed.to_string())
}

/// UUID v7 の newtype ID を定義する
///
/// `new()` は時刻順に並ぶ UUID v7 を採番する。DB から復元する場合は `from_uuid()`、
/// コマンドライン引数や NOTIFY ペイロードからは `str::parse()` を使う。
///
/// ```rust
/// use ticketdesk_domain::tenant::TenantId;
///
/// let id = TenantId::new();
/// let parsed: TenantId = id.to_string().parse().unwrap();
/// assert_eq!(parsed, id);
/// assert!("tenant-1".parse::<TenantId>().is_err());
/// ```
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize,
            derive_more::Display,
        )]
        #[display("{_0}")]
        $vis struct $Name(uuid::Uuid);

        impl $Name {
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $Name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

/// 入力時に正規化・検証される文字列型を定義する
///
/// `new()` は `normalize_text` で前後の空白を除き、必須と最大文字数を検証する。
/// 上限は `MAX_LENGTH` として公開する。
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use ticketdesk_domain::ticket::TicketTitle;
///
/// let title = TicketTitle::new("  プリンターが動かない ")?;
/// assert_eq!(title.as_str(), "プリンターが動かない");
/// assert!(TicketTitle::new("   ").is_err());
/// assert!(TicketTitle::new("あ".repeat(TicketTitle::MAX_LENGTH + 1)).is_err());
/// # Ok(())
/// # }
/// ```
macro_rules! define_validated_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident {
            label: $label:expr,
            max_length: $max_length:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq,
            serde::Serialize, serde::Deserialize,
            derive_more::Display,
        )]
        #[display("{_0}")]
        $vis struct $Name(String);

        impl $Name {
            pub const MAX_LENGTH: usize = $max_length;

            pub fn new(value: impl Into<String>) -> Result<Self, $crate::DomainError> {
                $crate::macros::normalize_text($label, value.into(), Self::MAX_LENGTH).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }
    };
}
