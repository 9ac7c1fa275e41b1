//! Periodic logic loop and its operator handle.
//!
//! The worker thread owns the [`Supervisor`]. Operator requests arrive as
//! [`Intent`]s on a crossbeam channel and are applied at the start of the
//! next tick, so mode changes and mode logic never race. After each tick a
//! [`SupervisorStatus`] snapshot is published for observers.

use crate::error::BrewError;
use crate::exchange::{LinkStatus, MachineShared};
use crate::modes::{Mode, PhaseView};
use crate::supervisor::{Supervisor, TransitionOutcome};
use crate::util::tick_period;
use crossbeam_channel as xch;
use espresso_traits::{Clock, MachineCommand, MachineState};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Operator request, applied on the next logic tick.
#[derive(Debug)]
pub enum Intent {
    Start,
    Stop,
    Transition {
        title: String,
        reply: Option<xch::Sender<TransitionOutcome>>,
    },
    Tare,
    SetManual(MachineCommand),
}

/// Snapshot published after every logic tick.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub mode: String,
    pub running: bool,
    pub phase: PhaseView,
    pub state: MachineState,
    /// Pending command in wire order.
    pub command: [f32; 6],
    pub link: LinkStatus,
    pub ticks: u64,
}

impl SupervisorStatus {
    fn capture(sup: &Supervisor, shared: &MachineShared, ticks: u64) -> Self {
        Self {
            mode: sup.active_title().to_string(),
            running: sup.is_running(),
            phase: sup.phase(),
            state: shared.state(),
            command: shared.output().command.as_array(),
            link: shared.link_status(),
            ticks,
        }
    }
}

type StatusCell = Arc<Mutex<SupervisorStatus>>;

pub struct LogicWorker {
    tx: xch::Sender<Intent>,
    status: StatusCell,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl LogicWorker {
    pub fn spawn<C: Clock + Send + 'static>(
        mut supervisor: Supervisor,
        shared: MachineShared,
        tick_hz: u32,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::unbounded::<Intent>();
        let status = Arc::new(Mutex::new(SupervisorStatus::capture(
            &supervisor,
            &shared,
            0,
        )));
        let status_clone = status.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let period = tick_period(tick_hz);

        let join_handle = std::thread::spawn(move || {
            tracing::debug!(tick_hz, mode = supervisor.active_title(), "logic loop started");
            let mut ticks: u64 = 0;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("logic loop received shutdown signal");
                    break;
                }

                let intents: Vec<Intent> = rx.try_iter().collect();
                let state = shared.state();
                shared.with_output(|out| {
                    let mut tare = false;
                    for intent in intents {
                        match intent {
                            Intent::Start => supervisor.start(),
                            Intent::Stop => supervisor.stop(),
                            Intent::Transition { title, reply } => {
                                let outcome = supervisor.transition(&title, &state, out);
                                if let Some(reply) = reply {
                                    // Caller may have given up waiting.
                                    let _ = reply.send(outcome);
                                }
                            }
                            Intent::Tare => tare = true,
                            Intent::SetManual(cmd) => {
                                if !supervisor.set_manual(cmd) {
                                    tracing::debug!(
                                        mode = supervisor.active_title(),
                                        "manual command ignored outside Manual mode"
                                    );
                                }
                            }
                        }
                    }
                    supervisor.tick(&state, out);
                    // After the tick, so a stopped mode cannot zero it.
                    if tare {
                        out.command.tare.request();
                    }
                });

                ticks += 1;
                let snap = SupervisorStatus::capture(&supervisor, &shared, ticks);
                *status_clone.lock().unwrap_or_else(PoisonError::into_inner) = snap;

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("logic loop exiting cleanly");
        });

        Self {
            tx,
            status,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
            status: self.status.clone(),
        }
    }

    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("logic thread joined successfully"),
                Err(e) => tracing::warn!(?e, "logic thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for LogicWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Cloneable operator handle onto a running [`LogicWorker`].
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: xch::Sender<Intent>,
    status: StatusCell,
}

impl SupervisorHandle {
    fn send(&self, intent: Intent) -> Result<(), BrewError> {
        self.tx
            .send(intent)
            .map_err(|_| BrewError::State("logic loop is not running".into()))
    }

    pub fn start(&self) -> Result<(), BrewError> {
        self.send(Intent::Start)
    }

    pub fn stop(&self) -> Result<(), BrewError> {
        self.send(Intent::Stop)
    }

    pub fn tare(&self) -> Result<(), BrewError> {
        self.send(Intent::Tare)
    }

    pub fn set_manual(&self, cmd: MachineCommand) -> Result<(), BrewError> {
        self.send(Intent::SetManual(cmd))
    }

    /// Queue a transition without waiting for its outcome.
    pub fn request_transition(&self, title: &str) -> Result<(), BrewError> {
        self.send(Intent::Transition {
            title: title.to_string(),
            reply: None,
        })
    }

    /// Request a transition and wait (up to `timeout`) for its outcome.
    pub fn transition(&self, title: &str, timeout: Duration) -> Result<TransitionOutcome, BrewError> {
        let (reply, rx) = xch::bounded(1);
        self.send(Intent::Transition {
            title: title.to_string(),
            reply: Some(reply),
        })?;
        rx.recv_timeout(timeout)
            .map_err(|e| BrewError::State(format!("no transition outcome: {e}")))
    }

    pub fn status(&self) -> SupervisorStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
