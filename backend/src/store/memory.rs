//! In-process store used for tests and stand-alone operation

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Entity, RecordWrite, Store, StoreError};

type Table = Vec<(String, serde_json::Value)>;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<(Uuid, Entity), Table>>,
    /// While set, every write fails with this error
    failure: RwLock<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage or a rejecting server for subsequent writes
    pub async fn fail_writes(&self, failure: Option<StoreError>) {
        *self.failure.write().await = failure;
    }

    async fn check_failure(&self) -> Result<(), StoreError> {
        match self.failure.read().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn write_into(tables: &mut HashMap<(Uuid, Entity), Table>, tenant_id: Uuid, write: RecordWrite) {
    let table = tables.entry((tenant_id, write.entity)).or_default();
    match table.iter_mut().find(|(key, _)| *key == write.key) {
        Some((_, data)) => *data = write.data,
        None => table.push((write.key, write.data)),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_all(
        &self,
        tenant_id: Uuid,
        entity: Entity,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&(tenant_id, entity))
            .map(|table| table.iter().map(|(_, data)| data.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, tenant_id: Uuid, write: RecordWrite) -> Result<(), StoreError> {
        self.check_failure().await?;
        let mut tables = self.tables.write().await;
        write_into(&mut tables, tenant_id, write);
        Ok(())
    }

    async fn apply(&self, tenant_id: Uuid, writes: Vec<RecordWrite>) -> Result<(), StoreError> {
        self.check_failure().await?;
        let mut tables = self.tables.write().await;
        for write in writes {
            write_into(&mut tables, tenant_id, write);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
