//! Machine interface: one I/O tick is sample, send, log.
//!
//! Owns the link. Publishes each fresh state into [`MachineShared`], sends
//! whatever command the logic loop left in the control output, and appends
//! to the data log while logging is on. Link failures never escape a tick:
//! a dropped packet is skipped, anything else backs off and retries.

use crate::config::LinkTiming;
use crate::datalog::LogRow;
use crate::error::LinkFault;
use crate::exchange::{LinkStatus, MachineShared};
use crate::hw_error::map_link_error;
use espresso_traits::{Clock, MachineCommand, MachineLink, MonotonicClock};
use std::path::{Path, PathBuf};

pub struct MachineInterface<L> {
    link: L,
    shared: MachineShared,
    timing: LinkTiming,
    clock: Box<dyn Clock + Send>,
    last_sent: MachineCommand,
}

impl<L: MachineLink> MachineInterface<L> {
    pub fn new(link: L, shared: MachineShared, timing: LinkTiming) -> Self {
        Self {
            link,
            shared,
            timing,
            clock: Box::new(MonotonicClock::new()),
            last_sent: MachineCommand::default(),
        }
    }

    /// Use `clock` for retry backoff sleeps.
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn shared(&self) -> &MachineShared {
        &self.shared
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// The command most recently handed to the link.
    pub fn last_sent(&self) -> MachineCommand {
        self.last_sent
    }

    /// Read one telemetry snapshot. Returns whether the shared state was
    /// refreshed; on failure the previous state stays in place.
    pub fn sample(&mut self) -> bool {
        match self.link.sample(self.timing.read_timeout) {
            Ok(state) => {
                self.shared.publish_state(state);
                let prev = self.shared.set_link_status(LinkStatus::Connected);
                if prev != LinkStatus::Connected {
                    tracing::info!(from = ?prev, "telemetry link healthy");
                }
                true
            }
            Err(e) => {
                let fault = map_link_error(&*e);
                self.on_read_fault(&fault);
                false
            }
        }
    }

    fn on_read_fault(&self, fault: &LinkFault) {
        let status = match fault {
            LinkFault::Framing(_) => LinkStatus::Resyncing,
            LinkFault::Disconnected => LinkStatus::Disconnected,
            _ => LinkStatus::Degraded,
        };
        let prev = self.shared.set_link_status(status);
        if let LinkFault::Framing(msg) = fault {
            // The next packet may be fine; no backoff.
            tracing::warn!(error = %msg, "dropped malformed telemetry packet");
            return;
        }
        if prev == status {
            tracing::trace!(error = %fault, "telemetry read still failing");
        } else {
            tracing::warn!(error = %fault, ?status, "telemetry read failed; retrying");
        }
        self.clock.sleep(self.timing.retry_backoff);
    }

    /// Send the pending command and disarm its tare in the same critical
    /// section, so a tare goes out exactly once.
    pub fn send_command(&mut self) {
        let cmd = self.shared.with_output(|out| {
            let cmd = out.command;
            out.command.tare.take();
            cmd
        });
        if let Err(e) = self.link.send(&cmd) {
            match map_link_error(&*e) {
                fault @ LinkFault::Rejected(_) => {
                    tracing::warn!(error = %fault, "device cannot express command");
                }
                fault => tracing::debug!(error = %fault, "command not delivered"),
            }
        }
        self.last_sent = cmd;
    }

    /// Honour a pending clear request, then append a row if logging is on.
    pub fn log_state(&mut self) {
        let (logging, clear) = self
            .shared
            .with_output(|out| (out.logging, out.take_clear_log()));
        if clear {
            self.shared.clear_log();
        }
        if logging {
            let row = LogRow::new(&self.last_sent, &self.shared.state());
            self.shared.append_log(row);
        }
    }

    /// One I/O cycle.
    pub fn tick(&mut self) {
        self.sample();
        self.send_command();
        self.log_state();
    }

    pub fn clear_log(&self) {
        self.shared.clear_log();
    }

    pub fn save_log(&self, dir: &Path) -> eyre::Result<PathBuf> {
        self.shared.save_log(dir)
    }

    /// Release the device; errors are logged, not returned.
    pub fn close(&mut self) {
        if let Err(e) = self.link.close() {
            tracing::warn!(error = %e, "closing machine link failed");
        }
    }

    pub fn into_link(self) -> L {
        self.link
    }
}
