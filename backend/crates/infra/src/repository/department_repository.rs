//! # DepartmentRepository
//!
//! 部署と責任者（supervisor）の取得を担当するリポジトリ。
//! チケットは部署を名前で参照するため、組織内の名前で検索する。

use async_trait::async_trait;
use sqlx::PgPool;
use ticketdesk_domain::{
    tenant::TenantId,
    ticket::{Department, DepartmentId},
    user::UserId,
};
use uuid::Uuid;

use crate::error::InfraError;

/// 部署リポジトリトレイト
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    /// 組織内の部署を名前で検索
    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<Department>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct DepartmentRow {
    id:              Uuid,
    tenant_id:       Uuid,
    name:            String,
    supervisor_id:   Option<Uuid>,
    supervisor_name: Option<String>,
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Self {
            id:              DepartmentId::from_uuid(row.id),
            tenant_id:       TenantId::from_uuid(row.tenant_id),
            name:            row.name,
            supervisor_id:   row.supervisor_id.map(UserId::from_uuid),
            supervisor_name: row.supervisor_name,
        }
    }
}

/// PostgreSQL 実装の DepartmentRepository
#[derive(Debug, Clone)]
pub struct PostgresDepartmentRepository {
    pool: PgPool,
}

impl PostgresDepartmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentRepository for PostgresDepartmentRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%tenant_id, department = name))]
    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<Option<Department>, InfraError> {
        let row = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, tenant_id, name, supervisor_id, supervisor_name
            FROM departments
            WHERE tenant_id = $1 AND name = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Department::from))
    }
}
