mod cli;
mod error_fmt;
mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{RunRequest, open_link, run_mode, self_check};
use espresso_core::BrewError;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Only the first install wins; a second one in the same process is harmless.
    let _ = color_eyre::install();

    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(kind) = cli.link {
        cfg.link.kind = kind.into();
    }
    cfg.validate()
        .map_err(|e| BrewError::Config(format!("{e:#}")))?;

    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    init_tracing(cli.json, level, &cfg.logging).wrap_err("setting up logging")?;

    let library = match &cli.profiles {
        Some(path) => Some(
            espresso_config::load_profiles_json(path)
                .wrap_err_with(|| format!("loading profile library {}", path.display()))?,
        ),
        None => None,
    };
    let registry = espresso_core::registry_from_config(&cfg, library.as_ref())?;

    match cli.cmd {
        Commands::Modes => {
            let titles: Vec<&str> = registry.titles().collect();
            if cli.json {
                println!("{}", serde_json::json!({ "modes": titles }));
            } else {
                for t in titles {
                    println!("{t}");
                }
            }
        }
        Commands::SelfCheck => {
            let report = self_check(&cfg, &registry, open_link(&cfg))?;
            if cli.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                report.print_human();
            }
        }
        Commands::Run {
            mode,
            max_seconds,
            save_log,
            log_dir,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = shutdown.clone();
                ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                    .wrap_err("installing Ctrl-C handler")?;
            }
            let save_log = save_log.then(|| log_dir.unwrap_or_else(|| PathBuf::from(&cfg.data_log.dir)));
            let req = RunRequest {
                mode: &mode,
                max_seconds,
                save_log,
            };
            let summary = run_mode(&cfg, registry, open_link(&cfg), &req, shutdown)?;
            if cli.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                summary.print_human();
            }
        }
    }
    Ok(())
}

/// Typed config from `path`, or the built-in defaults.
fn load_config(path: Option<&Path>) -> eyre::Result<espresso_config::Config> {
    let Some(path) = path else {
        return Ok(espresso_config::Config::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| BrewError::Config(format!("cannot read config file {}: {e}", path.display())))?;
    let cfg = espresso_config::load_toml(&text)
        .map_err(|e| BrewError::Config(format!("{}: {e}", path.display())))?;
    Ok(cfg)
}

/// Console logs go to stderr (pretty or JSON lines). `logging.file` adds a
/// JSON-lines file layer whose writer guard lives in [`FILE_GUARD`].
fn init_tracing(json: bool, level: &str, logging: &espresso_config::Logging) -> eyre::Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .wrap_err_with(|| format!("invalid log level {level:?}"))
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if json {
        layers.push(console.json().with_filter(filter()?).boxed());
    } else {
        layers.push(console.with_filter(filter()?).boxed());
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file {file:?} does not name a file"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter()?)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("{e}"))?;
    Ok(())
}
