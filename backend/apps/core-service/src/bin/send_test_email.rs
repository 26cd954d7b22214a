//! # テストメール送信
//!
//! 組織の SMTP 設定を確認するためにテストメールを 1 通送る。
//! 送信結果は通知と同じく配信記録に残る。
//!
//! ## 使い方
//!
//! ```bash
//! cargo run -p ticketdesk-core-service --bin send-test-email -- <組織 ID> <宛先>
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `MAIL_BACKEND` | No | `smtp`（デフォルト）または `noop` |
//! | `LOG_FORMAT` | No | `pretty`（デフォルト）または `json` |
//! | `RUST_LOG` | No | ログフィルタ（デフォルト: `info,ticketdesk=debug`） |

use anyhow::Context as _;
use ticketdesk_core_service::{bootstrap::CoreComponents, config::CoreConfig};
use ticketdesk_domain::tenant::TenantId;
use ticketdesk_infra::{
    db,
    repository::{OrganizationRepository, PostgresOrganizationRepository},
};
use ticketdesk_shared::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    let config = CoreConfig::from_env().context("設定の読み込みに失敗しました")?;
    init_tracing(&config.tracing_config("send-test-email"))
        .context("トレーシングの初期化に失敗しました")?;

    let mut args = std::env::args().skip(1);
    let (Some(tenant_id), Some(to)) = (args.next(), args.next()) else {
        anyhow::bail!("使い方: send-test-email <組織 ID> <宛先メールアドレス>");
    };
    let tenant_id: TenantId = tenant_id
        .parse()
        .with_context(|| format!("組織 ID が UUID ではありません: {tenant_id}"))?;

    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベース接続に失敗しました")?;

    let organization = PostgresOrganizationRepository::new(pool.clone())
        .find_by_id(&tenant_id)
        .await
        .context("組織の取得に失敗しました")?
        .with_context(|| format!("組織が見つかりません: {tenant_id}"))?;

    let components = CoreComponents::new(pool, &config)?;
    components
        .notifications
        .mailer
        .send_test_email(&organization, &to)
        .await
        .context("テストメールの送信に失敗しました")?;

    tracing::info!(tenant_id = %tenant_id, to = %to, "テストメールを送信しました");
    Ok(())
}
