//! Background I/O loop.
//!
//! Spawns a thread that owns the [`MachineInterface`] and ticks it back to
//! back; pacing comes from the link itself (telemetry arrival, or the
//! simulator's clock). The link is closed when the loop exits.
//!
//! Each `IoWorker` spawns exactly one thread that is shut down and joined
//! when the worker is dropped.
use crate::machine::MachineInterface;
use espresso_traits::MachineLink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct IoWorker {
    ticks: Arc<AtomicU64>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl IoWorker {
    pub fn spawn<L: MachineLink + Send + 'static>(mut machine: MachineInterface<L>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_clone = ticks.clone();

        let join_handle = std::thread::spawn(move || {
            tracing::debug!("I/O loop started");
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("I/O loop received shutdown signal");
                    break;
                }
                machine.tick();
                ticks_clone.fetch_add(1, Ordering::Relaxed);
            }
            machine.close();
            tracing::trace!("I/O loop exiting cleanly");
        });

        Self {
            ticks,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Completed I/O cycles.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }

    /// Stop the loop and wait for the link to be closed.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Exits after the in-flight read returns (bounded by the read timeout).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("I/O thread joined successfully"),
                Err(e) => tracing::warn!(?e, "I/O thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for IoWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
