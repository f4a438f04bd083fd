//! HTTP handlers

pub mod delivery;
pub mod health;
pub mod hopper;
pub mod outflow;
pub mod production;
pub mod sync;
pub mod tank;

pub use delivery::*;
pub use health::*;
pub use hopper::*;
pub use outflow::*;
pub use production::*;
pub use sync::*;
pub use tank::*;
