//! Human-readable error descriptions, exit codes and structured JSON errors.

use keycal_core::error::{BuildError, CalError};

/// Which stage of a command failed. Attached as `wrap_err` context so the
/// exit code survives however deep the root cause is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Config,
    Storage,
    Trace,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Failure::Config => "invalid configuration",
            Failure::Storage => "calibration storage failed",
            Failure::Trace => "trace could not be read",
        })
    }
}

impl Failure {
    pub fn name(self) -> &'static str {
        match self {
            Failure::Config => "Config",
            Failure::Storage => "Storage",
            Failure::Trace => "Trace",
        }
    }
}

fn classify(err: &eyre::Report) -> Option<Failure> {
    if let Some(f) = err.downcast_ref::<Failure>() {
        return Some(*f);
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return Some(Failure::Config);
    }
    match err.downcast_ref::<CalError>() {
        Some(CalError::Config(_)) => Some(Failure::Config),
        Some(CalError::Storage(_) | CalError::ChannelCount { .. }) => Some(Failure::Storage),
        _ => None,
    }
}

/// Innermost cause, which carries the specific message.
fn root_message(err: &eyre::Report) -> String {
    err.chain()
        .last()
        .map_or_else(|| err.to_string(), ToString::to_string)
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    let root = root_message(err);
    let lower = root.to_ascii_lowercase();

    // CSV header problems first; they are the most common user mistake.
    if lower.contains("must have headers") || lower.contains("must start with headers") {
        return format!(
            "Invalid headers in CSV ({root}).\nHow to fix: Tables use 'channel,gain,offset'; traces use 'freeze,reset,ch0,ch1,...'."
        );
    }

    match classify(err) {
        Some(Failure::Config) => {
            return format!(
                "What happened: Invalid configuration ({root}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `keycal self-check`."
            );
        }
        Some(Failure::Storage) => {
            let hint = if lower.contains("checksum") || lower.contains("corrupt") || lower.contains("magic") {
                "The stored image is damaged. Run `keycal reset` to write a fresh default table."
            } else if lower.contains("channel count") {
                "The stored table was written for a different number of keys. Run `keycal reset` or import a matching CSV."
            } else {
                "Check persistence.path and its directory permissions."
            };
            return format!(
                "What happened: Calibration storage failed ({root}).\nHow to fix: {hint}"
            );
        }
        Some(Failure::Trace) => {
            return format!(
                "What happened: The trace could not be read ({root}).\nHow to fix: Check the file exists and every row has 0/1 switch values and numeric channels."
            );
        }
        None => {}
    }

    if let Some(CalError::Timeout) = err.downcast_ref::<CalError>() {
        return "What happened: The sensor array stopped delivering frames.\nLikely causes: ADC not responding, or sampling.sensor_timeout_ms too low.\nHow to fix: Check wiring and power, or raise sampling.sensor_timeout_ms.".to_string();
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 config, 3 storage, 4 trace, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match classify(err) {
        Some(Failure::Config) => 2,
        Some(Failure::Storage) => 3,
        Some(Failure::Trace) => 4,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = classify(err).map_or("Error", Failure::name);
    json!({
        "reason": reason,
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
