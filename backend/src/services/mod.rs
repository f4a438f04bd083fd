//! Business logic services for the olive mill

pub mod hopper;
pub mod intake;
pub mod outflow;
pub mod production;
pub mod sync;
pub mod tank;
pub mod traceability;

pub use hopper::HopperService;
pub use intake::IntakeService;
pub use outflow::OutflowService;
pub use production::ProductionService;
pub use sync::SyncQueue;
pub use tank::TankService;
pub use traceability::TraceabilityService;
