//! # テナント（組織）
//!
//! マルチテナント構成における組織のモデル。ユーザー・部署・チケット・
//! メール送信設定はすべて組織単位で分離される。
//!
//! ## メール送信設定
//!
//! SMTP 認証情報はプロセスの環境変数ではなく組織レコードが保持する。
//! 送信時は組織ごとの [`SmtpSettings`] を使い、未設定の組織への送信は
//! 「設定なし」として扱う（送信を試みず、配信ログに失敗として残す）。

use serde::{Deserialize, Serialize};

define_uuid_id! {
    /// テナント（組織）の一意識別子
    ///
    /// すべてのビジネスエンティティはこの ID を持ち、テナント間のデータ分離を保証する。
    pub struct TenantId;
}

define_validated_string! {
    /// 組織名（値オブジェクト）
    ///
    /// メールの差出人表示名にも使用する。
    pub struct TenantName {
        label: "組織名",
        max_length: 255,
    }
}

/// SMTP ポート未指定時の既定値（STARTTLS）
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// 暗黙的 TLS（SMTPS）で接続するポート
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// 組織ごとの SMTP 送信設定
///
/// `Debug` 出力ではパスワードをマスクする。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host:         String,
    /// 未指定の場合は [`DEFAULT_SMTP_PORT`]
    pub port:         Option<u16>,
    pub username:     String,
    pub password:     String,
    /// 差出人アドレス。未指定の場合は `username` を使う
    ///
    /// ユーザー名がメールアドレスでないリレー（`apikey` など）で必要になる。
    pub from_address: Option<String>,
}

impl SmtpSettings {
    /// 送信に必要な項目（ホスト・ユーザー・パスワード）がすべて揃っているか
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.is_empty()
    }

    /// 実際に接続するポート番号
    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) if port != 0 => port,
            _ => DEFAULT_SMTP_PORT,
        }
    }

    /// 暗黙的 TLS で接続するか（465 番のみ。それ以外は STARTTLS）
    pub fn uses_implicit_tls(&self) -> bool {
        self.effective_port() == IMPLICIT_TLS_PORT
    }

    /// 差出人アドレス（空の `from_address` は未指定として扱う）
    pub fn sender_address(&self) -> &str {
        self.from_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .unwrap_or(&self.username)
    }
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// 組織エンティティ
#[derive(Debug, Clone)]
pub struct Organization {
    id:   TenantId,
    name: TenantName,
    smtp: Option<SmtpSettings>,
}

impl Organization {
    /// 永続化層から組織を復元する
    pub fn from_db(id: TenantId, name: TenantName, smtp: Option<SmtpSettings>) -> Self {
        Self { id, name, smtp }
    }

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    pub fn name(&self) -> &TenantName {
        &self.name
    }

    /// 保存されている SMTP 設定（不完全なものも含む）
    pub fn smtp(&self) -> Option<&SmtpSettings> {
        self.smtp.as_ref()
    }

    /// 送信に使える SMTP 設定
    ///
    /// 設定が無い、または必須項目が欠けている場合は `None`。
    pub fn mail_credentials(&self) -> Option<&SmtpSettings> {
        self.smtp.as_ref().filter(|smtp| smtp.is_configured())
    }

    /// 差出人（`"組織名" <差出人アドレス>`）
    pub fn sender_mailbox(&self) -> Option<String> {
        self.mail_credentials()
            .map(|smtp| format!("\"{}\" <{}>", self.name.as_str(), smtp.sender_address()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn smtp(host: &str, port: Option<u16>, username: &str, password: &str) -> SmtpSettings {
        SmtpSettings {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            from_address: None,
        }
    }

    #[test]
    fn test_組織名は前後の空白をトリミングする() {
        let name = TenantName::new("  Acme Corp  ").unwrap();
        assert_eq!(name.as_str(), "Acme Corp");
    }

    #[test]
    fn test_組織名は空文字列を拒否する() {
        assert!(TenantName::new("").is_err());
    }

    #[rstest]
    #[case(None, 587)]
    #[case(Some(0), 587)]
    #[case(Some(465), 465)]
    #[case(Some(2525), 2525)]
    fn test_ポート未指定時は587を使う(#[case] port: Option<u16>, #[case] expected: u16) {
        assert_eq!(
            smtp("smtp.example.com", port, "u", "p").effective_port(),
            expected
        );
    }

    #[test]
    fn test_465番ポートのみ暗黙的tlsを使う() {
        assert!(smtp("smtp.example.com", Some(465), "u", "p").uses_implicit_tls());
        assert!(!smtp("smtp.example.com", Some(587), "u", "p").uses_implicit_tls());
        assert!(!smtp("smtp.example.com", None, "u", "p").uses_implicit_tls());
    }

    #[rstest]
    #[case("", "user", "pass")]
    #[case("smtp.example.com", "", "pass")]
    #[case("smtp.example.com", "user", "")]
    fn test_必須項目が欠けたsmtp設定は未設定扱いになる(
        #[case] host: &str,
        #[case] username: &str,
        #[case] password: &str,
    ) {
        let org = Organization::from_db(
            TenantId::new(),
            TenantName::new("Acme").unwrap(),
            Some(smtp(host, None, username, password)),
        );

        assert!(org.mail_credentials().is_none());
        assert!(org.sender_mailbox().is_none());
    }

    #[test]
    fn test_差出人は組織名とsmtpユーザーで構成される() {
        let org = Organization::from_db(
            TenantId::new(),
            TenantName::new("Acme").unwrap(),
            Some(smtp("smtp.example.com", None, "noreply@acme.test", "secret")),
        );

        assert_eq!(
            org.sender_mailbox().as_deref(),
            Some("\"Acme\" <noreply@acme.test>")
        );
    }

    #[rstest]
    #[case(Some("support@acme.test"), "\"Acme\" <support@acme.test>")]
    #[case(Some("  "), "\"Acme\" <noreply@acme.test>")]
    #[case(None, "\"Acme\" <noreply@acme.test>")]
    fn test_差出人アドレスが指定されていればユーザー名より優先する(
        #[case] from_address: Option<&str>,
        #[case] expected: &str,
    ) {
        let org = Organization::from_db(
            TenantId::new(),
            TenantName::new("Acme").unwrap(),
            Some(SmtpSettings {
                from_address: from_address.map(str::to_string),
                ..smtp("smtp.example.com", None, "noreply@acme.test", "secret")
            }),
        );

        assert_eq!(org.sender_mailbox().as_deref(), Some(expected));
    }

    #[test]
    fn test_ユーザー名がアドレスでないリレーでも差出人アドレスを使える() {
        let org = Organization::from_db(
            TenantId::new(),
            TenantName::new("Acme").unwrap(),
            Some(SmtpSettings {
                from_address: Some("noreply@acme.test".to_string()),
                ..smtp("smtp.sendgrid.net", None, "apikey", "secret")
            }),
        );

        assert_eq!(
            org.sender_mailbox().as_deref(),
            Some("\"Acme\" <noreply@acme.test>")
        );
    }

    #[test]
    fn test_debug出力でパスワードがマスクされる() {
        let settings = smtp("smtp.example.com", None, "user", "secret");
        let debug = format!("{settings:?}");

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }
}
