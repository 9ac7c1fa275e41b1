//! Test and helper mocks for espresso_core

use espresso_traits::{LinkError, MachineCommand, MachineLink, MachineState};
use std::time::Duration;

/// A link with no device behind it: every read fails as "not connected" and
/// every write is dropped. Lets the loops run before hardware appears.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLink;

impl MachineLink for NullLink {
    fn sample(&mut self, _timeout: Duration) -> Result<MachineState, LinkError> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "null link: not connected",
        )))
    }

    fn send(&mut self, _cmd: &MachineCommand) -> Result<(), LinkError> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "null link: not connected",
        )))
    }
}
