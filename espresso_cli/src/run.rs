//! Machine assembly and mode execution: open the link, spawn the I/O and
//! logic workers, drive one mode to completion, and report what happened.

use std::io::{self, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use espresso_config::{Config, LinkKind};
use espresso_core::conversions::hardware::{command_codec, plant_params, telemetry_layout};
use espresso_core::{
    BrewError, IoWorker, LinkFault, LinkStatus, LogicWorker, MachineInterface, MachineShared,
    ModeRegistry, Supervisor, SupervisorStatus, TransitionOutcome,
};
use espresso_hardware::{SimulatedMachine, StreamLink};
use espresso_traits::{MachineLink, MachineState, MonotonicClock};
use serde::Serialize;

pub type BoxedLink = Box<dyn MachineLink + Send>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const INTENT_TIMEOUT: Duration = Duration::from_secs(1);
const POLL: Duration = Duration::from_millis(20);
const REPORT_EVERY: Duration = Duration::from_secs(1);
const SELF_CHECK_ATTEMPTS: usize = 5;

/// Open the configured link. A TCP bridge that cannot be reached yields a
/// disconnected link; the I/O loop keeps retrying reads against it.
pub fn open_link(cfg: &Config) -> BoxedLink {
    match cfg.link.kind {
        LinkKind::Sim => {
            let sim = &cfg.simulator;
            tracing::info!(seed = sim.seed, dt_ms = sim.dt_ms, "using simulated machine");
            Box::new(
                SimulatedMachine::new(plant_params(sim), sim.seed, Duration::from_millis(sim.dt_ms))
                    .paced(MonotonicClock::new()),
            )
        }
        LinkKind::Tcp => {
            let layout = telemetry_layout(&cfg.link);
            let codec = command_codec(&cfg.link);
            let addr = cfg.link.address.as_deref().unwrap_or_default();
            match connect(addr).map(|s| StreamLink::open(s, layout, codec)) {
                Ok(Ok(link)) => {
                    tracing::info!(addr, "connected to machine bridge");
                    Box::new(link)
                }
                Ok(Err(e)) => {
                    tracing::warn!(addr, error = %e, "bridge handshake failed; running disconnected");
                    Box::new(StreamLink::<TcpStream>::disconnected(layout, codec))
                }
                Err(e) => {
                    tracing::warn!(addr, error = %e, "bridge unreachable; running disconnected");
                    Box::new(StreamLink::<TcpStream>::disconnected(layout, codec))
                }
            }
        }
    }
}

fn connect(addr: &str) -> io::Result<TcpStream> {
    let mut last = None;
    for sa in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sa, CONNECT_TIMEOUT) {
            Ok(s) => {
                s.set_nodelay(true)?;
                return Ok(s);
            }
            Err(e) => last = Some(e),
        }
    }
    Err(last.unwrap_or_else(|| {
        io::Error::new(ErrorKind::NotFound, format!("{addr} resolved to no addresses"))
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The mode reported its sequence done.
    Finished,
    TimeLimit,
    /// Ctrl-C.
    Interrupted,
}

impl RunOutcome {
    fn describe(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::TimeLimit => "time limit reached",
            Self::Interrupted => "interrupted",
        }
    }
}

pub struct RunRequest<'a> {
    pub mode: &'a str,
    pub max_seconds: f64,
    /// Save the data log into this directory when the run ends.
    pub save_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: String,
    pub outcome: RunOutcome,
    pub elapsed_s: f64,
    pub phase: &'static str,
    pub link: LinkStatus,
    pub state: MachineState,
    pub log_rows: usize,
    pub log_file: Option<PathBuf>,
}

impl RunSummary {
    pub fn print_human(&self) {
        println!("Mode: {}", self.mode);
        println!("Outcome: {}", self.outcome.describe());
        println!("Elapsed: {:.1} s (final phase: {})", self.elapsed_s, self.phase);
        println!(
            "Final: {:.1} bar, {:.2} g, water {:.1} °C, group {:.1} °C",
            self.state.pressure, self.state.weight, self.state.water_temp, self.state.group_temp
        );
        println!("Link: {:?}", self.link);
        match &self.log_file {
            Some(path) => println!("Data log: {} rows -> {}", self.log_rows, path.display()),
            None => println!("Data log: {} rows (not saved)", self.log_rows),
        }
    }
}

/// Switch to `req.mode`, start it, and wait until it finishes, the time
/// limit passes, or `shutdown` is raised. The machine is always left with
/// a zero command.
pub fn run_mode(
    cfg: &Config,
    registry: ModeRegistry,
    link: BoxedLink,
    req: &RunRequest<'_>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<RunSummary> {
    if !registry.contains(req.mode) {
        return Err(BrewError::Config(format!(
            "unknown mode {:?}; available: {}",
            req.mode,
            registry.titles().collect::<Vec<_>>().join(", ")
        ))
        .into());
    }
    if !(req.max_seconds.is_finite() && req.max_seconds > 0.0) {
        return Err(BrewError::Config(format!(
            "--max-seconds must be > 0, got {}",
            req.max_seconds
        ))
        .into());
    }

    let shared = MachineShared::new();
    let supervisor = Supervisor::new(registry, &cfg.supervisor.initial_mode)?;
    let io = IoWorker::spawn(MachineInterface::new(link, shared.clone(), (&cfg.link).into()));
    let logic = LogicWorker::spawn(
        supervisor,
        shared.clone(),
        cfg.supervisor.tick_hz,
        MonotonicClock::new(),
    );
    let handle = logic.handle();

    match handle.transition(req.mode, INTENT_TIMEOUT)? {
        TransitionOutcome::Switched | TransitionOutcome::AlreadyActive => {}
        other => {
            return Err(BrewError::State(format!(
                "could not switch to {:?}: {other:?}",
                req.mode
            ))
            .into());
        }
    }
    handle.start()?;
    tracing::info!(mode = req.mode, max_seconds = req.max_seconds, "run start");

    let started = Instant::now();
    let limit = Duration::from_secs_f64(req.max_seconds);
    let mut last_report = started;
    let outcome = loop {
        std::thread::sleep(POLL);
        let status = handle.status();
        if status.mode == req.mode && status.running && status.phase.done {
            break RunOutcome::Finished;
        }
        if shutdown.load(Ordering::Relaxed) {
            break RunOutcome::Interrupted;
        }
        if started.elapsed() >= limit {
            break RunOutcome::TimeLimit;
        }
        if last_report.elapsed() >= REPORT_EVERY {
            report(&status);
            last_report = Instant::now();
        }
    };
    let elapsed_s = started.elapsed().as_secs_f64();

    handle.stop()?;
    // Give the I/O loop a chance to put the zero command on the wire.
    let deadline = Instant::now() + INTENT_TIMEOUT;
    while !(shared.output().command.is_zero() && io.ticks() > 0) && Instant::now() < deadline {
        std::thread::sleep(POLL);
    }
    std::thread::sleep(Duration::from_millis(cfg.link.read_timeout_ms));

    let status = handle.status();
    logic.shutdown();
    io.shutdown();
    tracing::info!(outcome = ?outcome, elapsed_s, phase = status.phase.phase, "run end");

    let log_file = match &req.save_log {
        Some(dir) => Some(shared.save_log(dir)?),
        None => None,
    };

    Ok(RunSummary {
        mode: status.mode,
        outcome,
        elapsed_s,
        phase: status.phase.phase,
        link: status.link,
        state: status.state,
        log_rows: shared.log_len(),
        log_file,
    })
}

fn report(status: &SupervisorStatus) {
    tracing::info!(
        phase = status.phase.phase,
        step = status.phase.step,
        pressure = status.state.pressure,
        flow = status.state.flow,
        weight = status.state.weight,
        water_temp = status.state.water_temp,
        group_temp = status.state.group_temp,
        link = ?status.link,
        "brewing"
    );
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfCheck {
    pub link: LinkStatus,
    pub modes: Vec<String>,
    pub state: MachineState,
}

impl SelfCheck {
    pub fn print_human(&self) {
        println!("link: {}", link_word(self.link));
        println!("modes: {}", self.modes.join(", "));
        let s = &self.state;
        println!(
            "sample: t={:.3} s, {:.2} bar, {:.2} ml/s, water {:.1} °C, group {:.1} °C, {:.2} g",
            s.sample_time, s.pressure, s.flow, s.water_temp, s.group_temp, s.weight
        );
    }
}

fn link_word(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Connected => "connected",
        LinkStatus::Resyncing => "resyncing",
        LinkStatus::Degraded => "degraded",
        LinkStatus::Disconnected => "disconnected",
    }
}

/// Read telemetry directly (no workers) until one sample decodes.
pub fn self_check(cfg: &Config, registry: &ModeRegistry, link: BoxedLink) -> eyre::Result<SelfCheck> {
    let shared = MachineShared::new();
    let mut machine = MachineInterface::new(link, shared.clone(), (&cfg.link).into());
    let ok = (0..SELF_CHECK_ATTEMPTS).any(|_| machine.sample());
    machine.close();
    let link = shared.link_status();
    if !ok {
        let fault = match link {
            LinkStatus::Disconnected => LinkFault::Disconnected,
            LinkStatus::Resyncing => LinkFault::Framing("no valid packet after resync".into()),
            _ => LinkFault::Timeout,
        };
        return Err(BrewError::Link(fault).into());
    }
    Ok(SelfCheck {
        link,
        modes: registry.titles().map(str::to_string).collect(),
        state: shared.state(),
    })
}
