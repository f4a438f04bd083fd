//! PostgreSQL store: one JSONB `records` table keyed by tenant, entity and key

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Entity, RecordWrite, Store, StoreError};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const UPSERT: &str = r#"
    INSERT INTO records (tenant_id, entity, record_key, data, updated_at)
    VALUES ($1, $2, $3, $4, NOW())
    ON CONFLICT (tenant_id, entity, record_key)
    DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
"#;

/// Integrity and data errors are the server refusing the record; connection
/// problems are an outage.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            if code.starts_with("22") || code.starts_with("23") {
                StoreError::Rejected(db.message().to_string())
            } else {
                StoreError::Server(db.message().to_string())
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Server(err.to_string()),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_all(
        &self,
        tenant_id: Uuid,
        entity: Entity,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT data FROM records WHERE tenant_id = $1 AND entity = $2 ORDER BY seq ASC",
        )
        .bind(tenant_id)
        .bind(entity.as_str())
        .fetch_all(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn upsert(&self, tenant_id: Uuid, write: RecordWrite) -> Result<(), StoreError> {
        sqlx::query(UPSERT)
            .bind(tenant_id)
            .bind(write.entity.as_str())
            .bind(&write.key)
            .bind(&write.data)
            .execute(&self.db)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn apply(&self, tenant_id: Uuid, mut writes: Vec<RecordWrite>) -> Result<(), StoreError> {
        if writes.len() == 1 {
            if let Some(write) = writes.pop() {
                return self.upsert(tenant_id, write).await;
            }
        }

        let mut tx = self.db.begin().await.map_err(map_sqlx)?;
        for write in &writes {
            sqlx::query(UPSERT)
                .bind(tenant_id)
                .bind(write.entity.as_str())
                .bind(&write.key)
                .bind(&write.data)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        tracing::debug!(tenant = %tenant_id, writes = writes.len(), "Write set committed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
