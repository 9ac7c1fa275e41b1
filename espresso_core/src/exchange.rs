//! State shared between the I/O loop and the logic loop.
//!
//! Two independently locked records: the latest telemetry snapshot (written
//! by I/O, read by logic) and the control output (written by logic, read and
//! tare-cleared by I/O). Every critical section copies a small `Copy` value,
//! so neither loop can observe a torn record. The data log lives here too so
//! other threads can clear or save it while the I/O loop appends.

use crate::atomic::write_atomic;
use crate::datalog::{DataLog, LogRow, csv_bytes, log_file_name};
use espresso_traits::{MachineCommand, MachineState};
use eyre::WrapErr;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the active mode wants the machine to do.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlOutput {
    pub command: MachineCommand,
    /// Append a data log row every I/O tick while set.
    pub logging: bool,
    clear_log: bool,
}

impl ControlOutput {
    /// Ask the I/O loop to empty the data log before its next append.
    #[inline]
    pub fn request_clear_log(&mut self) {
        self.clear_log = true;
    }

    #[inline]
    pub fn clear_log_requested(&self) -> bool {
        self.clear_log
    }

    #[inline]
    pub fn take_clear_log(&mut self) -> bool {
        std::mem::take(&mut self.clear_log)
    }

    /// Zero the command and stop logging.
    #[inline]
    pub fn halt(&mut self) {
        self.command.zero();
        self.logging = false;
    }
}

/// Health of the telemetry link as seen by the I/O loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LinkStatus {
    #[default]
    Connected = 0,
    /// A bad packet was dropped; waiting for the next good one.
    Resyncing = 1,
    /// Reads are timing out or failing; retrying after backoff.
    Degraded = 2,
    Disconnected = 3,
}

impl LinkStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Resyncing,
            2 => Self::Degraded,
            3 => Self::Disconnected,
            _ => Self::Connected,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked writer cannot leave a Copy record half-written.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle onto the shared records.
#[derive(Debug, Clone, Default)]
pub struct MachineShared {
    state: Arc<Mutex<MachineState>>,
    output: Arc<Mutex<ControlOutput>>,
    log: Arc<Mutex<DataLog>>,
    link: Arc<AtomicU8>,
}

impl MachineShared {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the latest telemetry snapshot.
    pub fn state(&self) -> MachineState {
        *lock(&self.state)
    }

    pub fn publish_state(&self, state: MachineState) {
        *lock(&self.state) = state;
    }

    /// Copy of the pending control output.
    pub fn output(&self) -> ControlOutput {
        *lock(&self.output)
    }

    /// Run `f` with exclusive access to the control output.
    pub fn with_output<R>(&self, f: impl FnOnce(&mut ControlOutput) -> R) -> R {
        f(&mut lock(&self.output))
    }

    pub fn link_status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.link.load(Ordering::Acquire))
    }

    /// Store `status`, returning the previous value.
    pub fn set_link_status(&self, status: LinkStatus) -> LinkStatus {
        LinkStatus::from_u8(self.link.swap(status as u8, Ordering::AcqRel))
    }

    pub fn append_log(&self, row: LogRow) {
        lock(&self.log).push(row);
    }

    pub fn clear_log(&self) {
        lock(&self.log).clear();
    }

    pub fn log_len(&self) -> usize {
        lock(&self.log).len()
    }

    /// Snapshot of the buffered rows.
    pub fn log_rows(&self) -> Vec<LogRow> {
        lock(&self.log).rows().to_vec()
    }

    /// Serialize the buffered rows as CSV into `dir`, named by local
    /// wall-clock time. The buffer is snapshotted under its lock first, so
    /// appends racing the save land in the buffer, not the file.
    pub fn save_log(&self, dir: &Path) -> eyre::Result<PathBuf> {
        let rows = self.log_rows();
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("creating data log directory {}", dir.display()))?;
        let path = dir.join(log_file_name(chrono::Local::now()));
        let bytes = csv_bytes(&rows).wrap_err("serializing data log")?;
        write_atomic(&path, &bytes)
            .wrap_err_with(|| format!("writing data log {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = rows.len(), "data log saved");
        Ok(path)
    }
}
