//! チケット・コメント・部署リポジトリの統合テスト
//!
//! 実行前提:
//! - PostgreSQL が起動していること
//! - `DATABASE_URL` が設定されていること

mod common;

use chrono::Duration;
use common::{insert_profile, setup_test_data, test_now};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use ticketdesk_domain::{
    ticket::{
        CommentBody,
        NewTicket,
        NewTicketComment,
        Ticket,
        TicketComment,
        TicketCommentId,
        TicketId,
        TicketPriority,
        TicketStatus,
        TicketTitle,
        TicketUpdate,
    },
    user::{UserProfile, UserRole},
};
use ticketdesk_infra::{
    db::{PgTransactionManager, TransactionManager},
    repository::{
        DepartmentRepository,
        PostgresDepartmentRepository,
        PostgresTicketCommentRepository,
        PostgresTicketRepository,
        TicketCommentRepository,
        TicketRepository,
    },
};

fn new_ticket(reporter: &UserProfile, title: &str) -> Ticket {
    Ticket::new(NewTicket {
        id: TicketId::new(),
        tenant_id: reporter.tenant_id().clone(),
        title: TicketTitle::new(title).unwrap(),
        description: "3 階会議室の空調が止まっている".to_string(),
        priority: TicketPriority::High,
        is_public: true,
        department: "総務".to_string(),
        category: "設備".to_string(),
        reported_by: reporter.id().clone(),
        reported_by_name: reporter.name().as_str().to_string(),
        now: test_now(),
    })
}

async fn insert_ticket(pool: &PgPool, ticket: &Ticket) {
    let tx_manager = PgTransactionManager::new(pool.clone());
    let mut tx = tx_manager.begin().await.unwrap();
    PostgresTicketRepository::new(pool.clone())
        .insert(&mut tx, ticket)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_チケットを保存して取得できる(pool: PgPool) {
    let (_, reporter) = setup_test_data(&pool).await;
    let ticket = new_ticket(&reporter, "空調が効かない");
    insert_ticket(&pool, &ticket).await;

    let found = PostgresTicketRepository::new(pool.clone())
        .find_by_id(ticket.id(), reporter.tenant_id())
        .await
        .unwrap();

    assert_eq!(found, Some(ticket));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_別テナントのチケットは取得できない(pool: PgPool) {
    let (_, reporter) = setup_test_data(&pool).await;
    let (other_org, _) = setup_test_data(&pool).await;
    let ticket = new_ticket(&reporter, "空調が効かない");
    insert_ticket(&pool, &ticket).await;

    let found = PostgresTicketRepository::new(pool.clone())
        .find_by_id(ticket.id(), other_org.id())
        .await
        .unwrap();

    assert_eq!(found, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_状態と部署の更新が保存される(pool: PgPool) {
    let (_, reporter) = setup_test_data(&pool).await;
    let ticket = new_ticket(&reporter, "空調が効かない");
    insert_ticket(&pool, &ticket).await;
    let repo = PostgresTicketRepository::new(pool.clone());

    let (updated, _) = ticket.apply(
        TicketUpdate {
            status: Some(TicketStatus::InProgress),
            department: Some("情報システム".to_string()),
            ..TicketUpdate::default()
        },
        test_now() + Duration::minutes(10),
    );
    let tx_manager = PgTransactionManager::new(pool.clone());
    let mut tx = tx_manager.begin().await.unwrap();
    repo.update(&mut tx, &updated).await.unwrap();
    tx.commit().await.unwrap();

    let found = repo
        .find_by_id(updated.id(), reporter.tenant_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.status(), TicketStatus::InProgress);
    assert_eq!(found.department(), "情報システム");
    assert_eq!(found.updated_at(), test_now() + Duration::minutes(10));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_保存されていないチケットの更新は欠落エラーになる(pool: PgPool) {
    let (_, reporter) = setup_test_data(&pool).await;
    let ticket = new_ticket(&reporter, "空調が効かない");
    let repo = PostgresTicketRepository::new(pool.clone());

    let tx_manager = PgTransactionManager::new(pool.clone());
    let mut tx = tx_manager.begin().await.unwrap();
    let err = repo.update(&mut tx, &ticket).await.unwrap_err();

    assert!(err.is_missing_row(), "{err}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_コミットしないトランザクションの書き込みは残らない(pool: PgPool) {
    let (_, reporter) = setup_test_data(&pool).await;
    let ticket = new_ticket(&reporter, "空調が効かない");
    let repo = PostgresTicketRepository::new(pool.clone());

    let tx_manager = PgTransactionManager::new(pool.clone());
    let mut tx = tx_manager.begin().await.unwrap();
    repo.insert(&mut tx, &ticket).await.unwrap();
    drop(tx);

    let found = repo
        .find_by_id(ticket.id(), reporter.tenant_id())
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_コメントは投稿順に取得できる(pool: PgPool) {
    let (org, reporter) = setup_test_data(&pool).await;
    let staff = insert_profile(&pool, org.id(), "staff@acme.test", UserRole::Supervisor).await;
    let ticket = new_ticket(&reporter, "空調が効かない");
    insert_ticket(&pool, &ticket).await;
    let repo = PostgresTicketCommentRepository::new(pool.clone());

    let comment = |author: &UserProfile, body: &str, minutes: i64| {
        TicketComment::new(NewTicketComment {
            id:          TicketCommentId::new(),
            ticket_id:   ticket.id().clone(),
            author_id:   author.id().clone(),
            author_name: author.name().as_str().to_string(),
            body:        CommentBody::new(body).unwrap(),
            now:         test_now() + Duration::minutes(minutes),
        })
    };
    let later = comment(&reporter, "まだ直っていません", 30);
    let earlier = comment(&staff, "確認します", 5);

    let tx_manager = PgTransactionManager::new(pool.clone());
    let mut tx = tx_manager.begin().await.unwrap();
    repo.insert(&mut tx, &later).await.unwrap();
    repo.insert(&mut tx, &earlier).await.unwrap();
    tx.commit().await.unwrap();

    let comments = repo.find_by_ticket(ticket.id()).await.unwrap();

    assert_eq!(comments, vec![earlier, later]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_部署を名前で取得できる(pool: PgPool) {
    let (org, _) = setup_test_data(&pool).await;
    let supervisor = insert_profile(&pool, org.id(), "boss@acme.test", UserRole::Supervisor).await;
    sqlx::query(
        r#"
        INSERT INTO departments (id, tenant_id, name, supervisor_id, supervisor_name)
        VALUES (gen_random_uuid(), $1, $2, $3, $4), (gen_random_uuid(), $1, $5, NULL, NULL)
        "#,
    )
    .bind(org.id().as_uuid())
    .bind("総務")
    .bind(supervisor.id().as_uuid())
    .bind(supervisor.name().as_str())
    .bind("経理")
    .execute(&pool)
    .await
    .unwrap();
    let repo = PostgresDepartmentRepository::new(pool.clone());

    let general = repo.find_by_name(org.id(), "総務").await.unwrap().unwrap();
    let accounting = repo.find_by_name(org.id(), "経理").await.unwrap().unwrap();
    let missing = repo.find_by_name(org.id(), "法務").await.unwrap();

    assert_eq!(general.supervisor_id, Some(supervisor.id().clone()));
    assert_eq!(general.supervisor_name.as_deref(), Some("山田花子"));
    assert_eq!(accounting.supervisor_id, None);
    assert!(missing.is_none());
}
