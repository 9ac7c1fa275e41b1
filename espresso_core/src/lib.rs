#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Real-time control core for an espresso machine (hardware-agnostic).
//!
//! All machine access goes through `espresso_traits::MachineLink`, so the
//! same loops drive the plant simulator and the real machine.
//!
//! ## Architecture
//!
//! - **I/O loop** (`machine`, `io_worker`): sample telemetry, send the
//!   pending command, append to the data log. Link faults are absorbed here.
//! - **Logic loop** (`supervisor`, `logic_worker`): a fixed-rate tick that
//!   runs exactly one active mode against the latest state.
//! - **Modes** (`modes`): Idle, Preheat, Flush, Manual, Steam, the nine-bar
//!   shot sequencer and the data-driven profile stepper.
//! - **Exchange** (`exchange`): the two locked records the loops share.
//!
//! Phase timing uses telemetry `sample_time`, never wall clock.

pub mod atomic;
pub mod config;
pub mod conversions;
pub mod datalog;
pub mod error;
pub mod exchange;
pub mod hw_error;
pub mod io_worker;
pub mod logic_worker;
pub mod machine;
pub mod mocks;
pub mod modes;
pub mod profile;
pub mod registry;
pub mod supervisor;
pub mod util;

pub use config::{
    FlushParams, LinkTiming, ModeParams, PreheatParams, ProfileParams, ShotParams, SteamParams,
};
pub use error::{BrewError, BuildError, LinkFault, Result};
pub use exchange::{ControlOutput, LinkStatus, MachineShared};
pub use io_worker::IoWorker;
pub use logic_worker::{Intent, LogicWorker, SupervisorHandle, SupervisorStatus};
pub use machine::MachineInterface;
pub use modes::{ActiveMode, Mode, ModeSpec, PhaseView};
pub use profile::{ControlMode, ExitCondition, Profile, Step};
pub use registry::{ModeRegistry, ModeRegistryBuilder};
pub use supervisor::{Supervisor, TransitionOutcome};

/// Build the registry for a loaded config: the standard modes plus one mode
/// per profile in `library`.
pub fn registry_from_config(
    cfg: &espresso_config::Config,
    library: Option<&espresso_config::ProfileLibrary>,
) -> Result<ModeRegistry> {
    use eyre::WrapErr;

    let params = ModeParams::from(cfg);
    let profiles = match library {
        Some(lib) => conversions::profiles_from_library(lib).wrap_err("loading profiles")?,
        None => Vec::new(),
    };
    let registry = ModeRegistry::builder()
        .with_standard_modes(&params)
        .with_profiles(profiles, params.profile)
        .build()
        .wrap_err("building mode registry")?;
    Ok(registry)
}
