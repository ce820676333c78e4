//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "keycal", version, about = "Key sensor self-calibration")]
pub struct Cli {
    /// Path to config TOML; missing file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = "etc/keycal.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Override persistence.path from the config
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recorded trace CSV through the engine
    Replay {
        /// Trace CSV: freeze,reset,ch0,ch1,...
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
        /// Write the final active table to this CSV
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },
    /// Drive the simulated keyboard through the sampler and runner
    Simulate {
        /// Number of ticks to run
        #[arg(long, default_value_t = 5_000)]
        ticks: u64,
        /// Press the freeze switch on this tick
        #[arg(long, value_name = "TICK")]
        freeze_at: Option<u64>,
        /// Read sensors inside the tick loop instead of a sampler thread
        #[arg(long, action = ArgAction::SetTrue)]
        direct: bool,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux: SCHED_FIFO priority and mlockall(MCL_CURRENT|MCL_FUTURE).\n\nThis reduces page faults and tick jitter but may require CAP_SYS_NICE/CAP_IPC_LOCK or a raised memlock ulimit. Failures are logged and the run continues without real-time settings."
        )]
        rt: bool,
        /// SCHED_FIFO priority when --rt is enabled (Linux only)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
    },
    /// Print the stored calibration table
    Show,
    /// Restore defaults on every channel and write storage
    Reset,
    /// Load a calibration table CSV into storage
    Import {
        #[arg(long, value_name = "FILE")]
        csv: PathBuf,
    },
    /// Write the stored calibration table to CSV
    Export {
        #[arg(long, value_name = "FILE")]
        csv: PathBuf,
    },
    /// Validate the config and check storage is readable
    SelfCheck,
}
