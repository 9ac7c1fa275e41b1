//! Human-readable error descriptions and structured JSON error formatting.

use espresso_core::error::{BrewError, BuildError, LinkFault};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::DuplicateMode(title) => format!(
                "What happened: Two modes share the title {title:?}.\nLikely causes: A profile in the library is named like a built-in mode or another profile.\nHow to fix: Rename the profile in the JSON library so every title is unique."
            ),
            BuildError::UnknownInitialMode(title) => format!(
                "What happened: The initial mode {title:?} is not registered.\nLikely causes: supervisor.initial_mode names a profile that was not loaded, or has a typo.\nHow to fix: Set supervisor.initial_mode to one of the titles printed by `espresso modes`."
            ),
            BuildError::InvalidProfile { name, reason } => format!(
                "What happened: Profile {name:?} is invalid ({reason}).\nLikely causes: An empty step list or a negative or non-finite value in the library.\nHow to fix: Edit the profile JSON, then rerun."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BrewError>() {
        return match be {
            BrewError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML, or a bad command-line option.\nHow to fix: Edit the config file or arguments, then rerun."
            ),
            BrewError::Link(LinkFault::Disconnected) => {
                "What happened: The machine is not connected.\nLikely causes: The bridge at link.address is not running or refused the connection.\nHow to fix: Start the bridge, check link.address, or use --link sim for a dry run.".to_string()
            }
            BrewError::Link(LinkFault::Timeout) => {
                "What happened: No telemetry arrived within the read timeout.\nLikely causes: The machine is powered off, or link.samples_per_packet does not match the firmware.\nHow to fix: Check the machine, then raise link.read_timeout_ms or fix the packet layout.".to_string()
            }
            BrewError::Link(LinkFault::Framing(detail)) => format!(
                "What happened: Telemetry could not be framed ({detail}).\nLikely causes: link.channels or link.samples_per_packet does not match the firmware.\nHow to fix: Align the [link] packet layout with the device."
            ),
            BrewError::Link(fault) => format!(
                "What happened: Machine link failed ({fault}).\nLikely causes: Cable or bridge trouble, or a codec mismatch.\nHow to fix: Check link.command_codec and the connection, then rerun with --log-level=debug."
            ),
            BrewError::State(msg) => format!(
                "What happened: The controller refused the request ({msg}).\nLikely causes: The active mode is holding pressure or the control loop already stopped.\nHow to fix: Wait for the shot to depressurise, then retry."
            ),
            BrewError::Io(msg) => format!(
                "What happened: A file operation failed ({msg}).\nLikely causes: Missing directory or no write permission.\nHow to fix: Check data_log.dir / --log-dir and its permissions."
            ),
        };
    }

    // String-based heuristics for errors coming from init or file loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("profile library") {
        return format!(
            "What happened: The profile library could not be loaded ({msg}).\nLikely causes: Wrong path, or JSON that does not match the step format.\nHow to fix: Check --profiles and the file contents."
        );
    }

    if lower.contains("logging") {
        return format!(
            "What happened: Logging could not be set up ({msg}).\nLikely causes: An unknown --log-level / RUST_LOG directive, or an unwritable logging.file.\nHow to fix: Use error|warn|info|debug|trace and a writable log path."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable short name for the error category (JSON `reason`).
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<BrewError>() {
        Some(BrewError::Config(_)) => "Config",
        Some(BrewError::Link(_)) => "Link",
        Some(BrewError::State(_)) => "State",
        Some(BrewError::Io(_)) => "Io",
        None => "Error",
    }
}

/// Configuration problems exit 2, link failures 3, refused requests 4, file errors 5.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Build" | "Config" => 2,
        "Link" => 3,
        "State" => 4,
        "Io" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = reason_name(err);
    match err.downcast_ref::<BrewError>() {
        Some(BrewError::Link(fault)) => {
            json!({ "reason": reason, "details": { "fault": fault.to_string() }, "message": humanize(err) })
                .to_string()
        }
        _ => json!({ "reason": reason, "message": humanize(err) }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_map_to_codes() {
        let e: eyre::Report = BrewError::Link(LinkFault::Timeout).into();
        assert_eq!(exit_code_for_error(&e), 3);
        assert!(humanize(&e).contains("read timeout"));

        let e = eyre::Report::new(BuildError::DuplicateMode("Flush".into())).wrap_err("building");
        assert_eq!(exit_code_for_error(&e), 2);
        assert!(humanize(&e).contains("\"Flush\""));

        let e = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&e), 1);
        assert!(humanize(&e).starts_with("Something went wrong"));
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let e: eyre::Report = BrewError::Link(LinkFault::Disconnected).into();
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "Link");
        assert_eq!(v["details"]["fault"], "device not connected");
        assert!(v["message"].as_str().unwrap().contains("not connected"));
    }
}
