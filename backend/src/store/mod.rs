//! Persistence collaborator
//!
//! The engine treats storage as a keyed record store: per tenant and entity it
//! can fetch every record and upsert one. `apply` commits a whole write set at
//! once so multi-record operations are all-or-nothing.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared::models::{
    AuxiliaryMaterial, BottlingLot, BulkExit, Delivery, MillingLot, NurseTransfer, PomaceExit,
    ProductionBatch, Tank, TankCycle, TankMovement,
};

pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{Repository, Snapshot};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Delivery,
    MillingLot,
    ProductionBatch,
    Tank,
    TankCycle,
    TankMovement,
    NurseTransfer,
    BottlingLot,
    BulkExit,
    PomaceExit,
    AuxiliaryMaterial,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Delivery => "delivery",
            Entity::MillingLot => "milling_lot",
            Entity::ProductionBatch => "production_batch",
            Entity::Tank => "tank",
            Entity::TankCycle => "tank_cycle",
            Entity::TankMovement => "tank_movement",
            Entity::NurseTransfer => "nurse_transfer",
            Entity::BottlingLot => "bottling_lot",
            Entity::BulkExit => "bulk_exit",
            Entity::PomaceExit => "pomace_exit",
            Entity::AuxiliaryMaterial => "auxiliary_material",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain record the store can hold
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const ENTITY: Entity;

    fn key(&self) -> String;
}

macro_rules! record {
    ($ty:ty, $entity:expr, |$r:ident| $key:expr) => {
        impl Record for $ty {
            const ENTITY: Entity = $entity;

            fn key(&self) -> String {
                let $r = self;
                $key
            }
        }
    };
}

record!(Delivery, Entity::Delivery, |r| r.id.to_string());
record!(MillingLot, Entity::MillingLot, |r| r.id.clone());
record!(ProductionBatch, Entity::ProductionBatch, |r| r.id.clone());
record!(Tank, Entity::Tank, |r| r.id.to_string());
record!(TankCycle, Entity::TankCycle, |r| r.key());
record!(TankMovement, Entity::TankMovement, |r| r.id.clone());
record!(NurseTransfer, Entity::NurseTransfer, |r| r.id.clone());
record!(BottlingLot, Entity::BottlingLot, |r| r.id.clone());
record!(BulkExit, Entity::BulkExit, |r| r.document_number.clone());
record!(PomaceExit, Entity::PomaceExit, |r| r.document_number.clone());
record!(AuxiliaryMaterial, Entity::AuxiliaryMaterial, |r| r.id.clone());

/// One serialized upsert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordWrite {
    pub entity: Entity,
    pub key: String,
    pub data: serde_json::Value,
}

impl RecordWrite {
    pub fn of<R: Record>(record: &R) -> Result<Self, StoreError> {
        Ok(Self {
            entity: R::ENTITY,
            key: record.key(),
            data: serde_json::to_value(record)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
        })
    }

    pub fn same_record(&self, other: &RecordWrite) -> bool {
        self.entity == other.entity && self.key == other.key
    }
}

/// Collects the records an operation writes
#[derive(Debug, Default)]
pub struct WriteSet {
    writes: Vec<RecordWrite>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<R: Record>(&mut self, record: &R) -> Result<&mut Self, StoreError> {
        let write = RecordWrite::of(record)?;
        self.writes.retain(|w| !w.same_record(&write));
        self.writes.push(write);
        Ok(self)
    }

    pub fn put_all<'a, R: Record + 'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a R>,
    ) -> Result<&mut Self, StoreError> {
        for record in records {
            self.put(record)?;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<RecordWrite> {
        self.writes
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    #[error("Store server error: {0}")]
    Server(String),

    #[error("Store rejected the write: {0}")]
    Rejected(String),

    #[error("Record serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Unreachable and 5xx-class failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Server(_))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Every record of an entity for a tenant, in insertion order
    async fn fetch_all(
        &self,
        tenant_id: Uuid,
        entity: Entity,
    ) -> Result<Vec<serde_json::Value>, StoreError>;

    async fn upsert(&self, tenant_id: Uuid, write: RecordWrite) -> Result<(), StoreError>;

    /// Apply every write or none of them
    async fn apply(&self, tenant_id: Uuid, writes: Vec<RecordWrite>) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}
