//! Domain models for the olive mill

mod delivery;
mod milling;
mod outflow;
mod production;
mod tank;

pub use delivery::*;
pub use milling::*;
pub use outflow::*;
pub use production::*;
pub use tank::*;
