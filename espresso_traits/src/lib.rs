pub mod clock;
pub mod machine;

pub use clock::{Clock, MonotonicClock};
pub use machine::{FlowDirection, MachineCommand, MachineState, PumpMode, TareRequest};

/// Boxed error used at every trait boundary in the stack.
pub type LinkError = Box<dyn std::error::Error + Send + Sync>;

/// Read/write contract shared by real hardware and the plant simulator.
///
/// `sample` returns a whole new state (never a partial update). `send` is
/// fire-and-forget: implementations transmit the command and return without
/// waiting for an acknowledgement.
pub trait MachineLink {
    fn sample(&mut self, timeout: std::time::Duration) -> Result<MachineState, LinkError>;
    fn send(&mut self, cmd: &MachineCommand) -> Result<(), LinkError>;

    /// Release the device. Links without a power handshake do nothing.
    fn close(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

impl<L: MachineLink + ?Sized> MachineLink for Box<L> {
    fn sample(&mut self, timeout: std::time::Duration) -> Result<MachineState, LinkError> {
        (**self).sample(timeout)
    }

    fn send(&mut self, cmd: &MachineCommand) -> Result<(), LinkError> {
        (**self).send(cmd)
    }

    fn close(&mut self) -> Result<(), LinkError> {
        (**self).close()
    }
}
