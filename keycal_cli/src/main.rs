mod cli;
mod commands;
mod error_fmt;
mod logging;
mod rt;

use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        tracing::debug!(error = ?err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    // Config errors must still be reported, so logging starts from CLI flags
    // alone when the config cannot be loaded.
    let cfg = match commands::load_config(&cli.config) {
        Ok(cfg) => {
            logging::init_logging(cli.json, &cli.log_level, &cfg.logging)?;
            cfg
        }
        Err(e) => {
            let _ = logging::init_logging(cli.json, &cli.log_level, &keycal_config::Logging::default());
            return Err(e);
        }
    };
    let store = cli.store.as_deref();

    match cli.cmd {
        Commands::Replay { trace, export } => {
            commands::replay(&cfg, store, cli.json, &trace, export.as_deref())
        }
        Commands::Simulate {
            ticks,
            freeze_at,
            direct,
            rt,
            rt_prio,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                tracing::warn!(error = %e, "could not install Ctrl-C handler");
            }
            commands::simulate(&cfg, store, cli.json, ticks, freeze_at, direct, rt, rt_prio, shutdown)
        }
        Commands::Show => commands::show(&cfg, store, cli.json),
        Commands::Reset => commands::reset(&cfg, store, cli.json),
        Commands::Import { csv } => commands::import(&cfg, store, cli.json, &csv),
        Commands::Export { csv } => commands::export(&cfg, store, cli.json, &csv),
        Commands::SelfCheck => commands::self_check(&cfg, store, cli.json),
    }
}
