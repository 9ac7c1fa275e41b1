//! Plant simulator and the adapters that put it behind a machine link.

pub mod bridge;
pub mod machine;
pub mod plant;

pub use bridge::{SimBridge, Transcript};
pub use machine::SimulatedMachine;
pub use plant::{NoiseLevels, Plant, PlantParams};
