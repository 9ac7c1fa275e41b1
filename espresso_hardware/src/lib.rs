//! Device side of the espresso controller: telemetry/command wire codecs,
//! a byte-stream machine link, and the plant simulator that stands in for
//! the machine in tests and dry runs.

pub mod codec;
pub mod error;
pub mod link;
pub mod sim;
pub mod util;

pub use error::{CodecError, FramingError, HwError};
pub use link::{Port, StreamLink};
pub use sim::{NoiseLevels, PlantParams, SimBridge, SimulatedMachine};
