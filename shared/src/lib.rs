//! Shared types and the production engine for the Olive Mill platform
//!
//! Everything in this crate is pure computation over domain records. The
//! backend persists and serves them; the wasm crate exposes parts of it to the
//! browser for offline use.

pub mod bottling;
pub mod closure;
pub mod documents;
pub mod error;
pub mod hopper;
pub mod milling;
pub mod models;
pub mod tank_ledger;
pub mod traceability;
pub mod types;
pub mod units;
pub mod validation;
pub mod yields;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
