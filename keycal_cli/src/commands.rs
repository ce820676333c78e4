//! Subcommand implementations: config and storage assembly, then one
//! function per command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use keycal_config::{Config, StorageBackend};
use keycal_core::hw_error::map_storage_error;
use keycal_core::{
    CalibrationCfg, DiagnosticsCfg, NUM_NOTES, PersistenceCfg, PianoEngine, RunParams, RunSummary,
    SamplingCfg, SamplingMode, WriteOutcome,
};
use keycal_hardware::eeprom::DEFAULT_CAPACITY;
use keycal_hardware::{EmulatedEeprom, FileStorage, SimulatedKeyboard, SimulatedSwitches};
use keycal_traits::clock::{Clock, ManualClock, MonotonicClock};
use keycal_traits::{GainOffset, Storage, SwitchBank};
use serde_json::json;

use crate::error_fmt::Failure;
use crate::rt::setup_rt_once;

pub type DynStorage = Box<dyn Storage>;

/// Load and validate the config. A missing file means defaults.
pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(text) => keycal_config::load_toml(&text)
            .wrap_err_with(|| format!("parse {}", path.display()))
            .wrap_err(Failure::Config)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "config not found; using defaults");
            Config::default()
        }
        Err(e) => {
            return Err(e)
                .wrap_err_with(|| format!("read {}", path.display()))
                .wrap_err(Failure::Config);
        }
    };
    cfg.validate().wrap_err(Failure::Config)?;
    Ok(cfg)
}

fn store_path(cfg: &Config, store: Option<&Path>) -> PathBuf {
    store.map_or_else(|| PathBuf::from(&cfg.persistence.path), Path::to_path_buf)
}

pub fn open_storage(cfg: &Config, store: Option<&Path>) -> eyre::Result<DynStorage> {
    let path = store_path(cfg, store);
    let storage: DynStorage = match cfg.persistence.backend {
        StorageBackend::File => Box::new(FileStorage::new(path, NUM_NOTES)),
        StorageBackend::Eeprom => Box::new(
            EmulatedEeprom::open(&path, DEFAULT_CAPACITY, NUM_NOTES)
                .wrap_err_with(|| format!("open eeprom image {}", path.display()))
                .wrap_err(Failure::Storage)?,
        ),
    };
    Ok(storage)
}

fn build_engine(
    cfg: &Config,
    storage: DynStorage,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> eyre::Result<PianoEngine<DynStorage>> {
    let mut builder = PianoEngine::builder(storage)
        .with_calibration(CalibrationCfg::from(&cfg.calibration))
        .with_persistence(PersistenceCfg::from(&cfg.persistence))
        .with_diagnostics(DiagnosticsCfg::from(&cfg.diagnostics));
    if let Some(c) = clock {
        builder = builder.with_clock(c);
    }
    builder.setup().wrap_err(Failure::Config)
}

fn load_stored(storage: &mut DynStorage) -> eyre::Result<Option<Vec<GainOffset>>> {
    storage
        .load()
        .map_err(|e| eyre::Report::new(map_storage_error(&*e)))
        .wrap_err(Failure::Storage)
}

fn write_stored(storage: &mut DynStorage, table: &[GainOffset]) -> eyre::Result<()> {
    storage
        .store(table)
        .map_err(|e| eyre::Report::new(map_storage_error(&*e)))
        .wrap_err(Failure::Storage)
}

fn defaults(cfg: &Config) -> Vec<GainOffset> {
    vec![GainOffset::new(cfg.calibration.default_gain, 0.0); NUM_NOTES]
}

fn table_json(table: &[GainOffset]) -> serde_json::Value {
    table
        .iter()
        .enumerate()
        .map(|(ch, c)| json!({ "channel": ch, "gain": c.gain, "offset": c.offset }))
        .collect()
}

fn summary_json(s: &RunSummary) -> serde_json::Value {
    json!({
        "ticks": s.ticks,
        "changes": s.changes,
        "writes": s.writes,
        "skipped_writes": s.skipped_writes,
        "failed_writes": s.failed_writes,
        "sensor_errors": s.sensor_errors,
        "switch_errors": s.switch_errors,
        "interrupted": s.interrupted,
    })
}

fn print_summary(json_mode: bool, cmd: &str, s: &RunSummary, engine: &PianoEngine<DynStorage>) {
    let stats = engine.stats();
    if json_mode {
        println!(
            "{}",
            json!({
                "command": cmd,
                "summary": summary_json(s),
                "calibrated": stats.calibrated,
                "staged": stats.staged,
                "channels": NUM_NOTES,
            })
        );
    } else {
        println!(
            "{cmd} complete: {} ticks, {} table changes, {} written, {} skipped, {} failed",
            s.ticks, s.changes, s.writes, s.skipped_writes, s.failed_writes
        );
        println!(
            "calibrated {}/{NUM_NOTES} channels, {} staged",
            stats.calibrated, stats.staged
        );
        if s.sensor_errors > 0 {
            println!("sensor errors: {}", s.sensor_errors);
        }
        if s.interrupted {
            println!("interrupted");
        }
    }
}

pub fn replay(
    cfg: &Config,
    store: Option<&Path>,
    json_mode: bool,
    trace: &Path,
    export: Option<&Path>,
) -> eyre::Result<()> {
    let rows = keycal_config::load_trace_csv(trace, NUM_NOTES).wrap_err(Failure::Trace)?;
    // Trace time advances one sample period per row.
    let clock = ManualClock::new();
    let mut engine = build_engine(cfg, open_storage(cfg, store)?, Some(Box::new(clock.clone())))?;
    let period = keycal_core::util::tick_period(cfg.sampling.sample_period_us);
    tracing::info!(rows = rows.len(), trace = %trace.display(), "replay start");

    if let Some(first) = rows.first() {
        engine.seed_switches(first.switches);
    }
    let mut raw = [0.0_f32; NUM_NOTES];
    let mut out = [0.0_f32; NUM_NOTES];
    let mut summary = RunSummary::default();
    for row in &rows {
        raw.fill(0.0);
        raw[..row.raw.len()].copy_from_slice(&row.raw);
        let report = engine.tick(&raw, row.switches, &mut out);
        summary.record(&report);
        clock.advance(period);
    }

    if let Some(path) = export {
        keycal_config::write_table_csv(path, engine.table())?;
        tracing::info!(path = %path.display(), "active table exported");
    }
    print_summary(json_mode, "replay", &summary, &engine);
    Ok(())
}

#[cfg(feature = "hardware")]
fn open_switches(cfg: &Config, freeze_at: Option<u64>) -> eyre::Result<Box<dyn SwitchBank>> {
    if let (Some(f), Some(r)) = (cfg.switches.freeze_pin, cfg.switches.reset_pin) {
        let sw = keycal_hardware::GpioSwitches::new(f, r).wrap_err("open switch pins")?;
        return Ok(Box::new(sw));
    }
    Ok(simulated_switches(freeze_at))
}

#[cfg(not(feature = "hardware"))]
fn open_switches(_cfg: &Config, freeze_at: Option<u64>) -> eyre::Result<Box<dyn SwitchBank>> {
    Ok(simulated_switches(freeze_at))
}

fn simulated_switches(freeze_at: Option<u64>) -> Box<dyn SwitchBank> {
    let mut sw = SimulatedSwitches::new();
    if let Some(t) = freeze_at {
        // Read 0 seeds the latches; tick t is read t + 1.
        sw = sw.freeze_at(t.saturating_add(1));
    }
    Box::new(sw)
}

#[allow(clippy::too_many_arguments)]
pub fn simulate(
    cfg: &Config,
    store: Option<&Path>,
    json_mode: bool,
    ticks: u64,
    freeze_at: Option<u64>,
    direct: bool,
    rt: bool,
    rt_prio: Option<i32>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    setup_rt_once(rt, rt_prio);

    let mut engine = build_engine(cfg, open_storage(cfg, store)?, None)?;
    let mut switches = open_switches(cfg, freeze_at)?;
    let params = RunParams {
        ticks,
        mode: if direct {
            SamplingMode::Direct
        } else {
            SamplingMode::Sampled
        },
        sampling: SamplingCfg::from(&cfg.sampling),
        pace: true,
        shutdown: Some(shutdown),
    };
    let summary = keycal_core::run_ticks(
        &mut engine,
        SimulatedKeyboard::new(NUM_NOTES),
        &mut switches,
        &params,
        &MonotonicClock::new(),
        |tick, _, report| {
            if let Some(WriteOutcome::Failed(e)) = &report.write {
                tracing::warn!(tick, error = %e, "write failed during simulation");
            }
        },
    )?;
    print_summary(json_mode, "simulate", &summary, &engine);
    Ok(())
}

pub fn show(cfg: &Config, store: Option<&Path>, json_mode: bool) -> eyre::Result<()> {
    let mut storage = open_storage(cfg, store)?;
    let (table, source) = match load_stored(&mut storage)? {
        Some(t) => (t, "storage"),
        None => (defaults(cfg), "defaults"),
    };
    if json_mode {
        println!(
            "{}",
            json!({ "source": source, "channels": table_json(&table) })
        );
    } else {
        println!("source: {source}");
        println!("{:>7} {:>14} {:>14}", "channel", "gain", "offset");
        for (ch, c) in table.iter().enumerate() {
            println!("{ch:>7} {:>14.8} {:>14.8}", c.gain, c.offset);
        }
    }
    Ok(())
}

pub fn reset(cfg: &Config, store: Option<&Path>, json_mode: bool) -> eyre::Result<()> {
    let mut engine = build_engine(cfg, open_storage(cfg, store)?, None)?;
    match engine.reset_to_defaults() {
        WriteOutcome::Failed(e) => Err(eyre::Report::new(e)).wrap_err(Failure::Storage),
        outcome => {
            if json_mode {
                println!(
                    "{}",
                    json!({ "command": "reset", "write": outcome.name(), "channels": NUM_NOTES })
                );
            } else {
                println!("reset: {NUM_NOTES} channels restored to defaults ({})", outcome.name());
            }
            Ok(())
        }
    }
}

pub fn import(cfg: &Config, store: Option<&Path>, json_mode: bool, csv: &Path) -> eyre::Result<()> {
    let rows = keycal_config::load_table_csv(csv, NUM_NOTES)?;
    let mut storage = open_storage(cfg, store)?;
    // Channels absent from the CSV keep their current calibration.
    let mut table = load_stored(&mut storage)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "existing table unreadable; importing over defaults");
            None
        })
        .unwrap_or_else(|| defaults(cfg));
    for r in &rows {
        table[r.channel] = GainOffset::new(r.gain, r.offset);
    }
    write_stored(&mut storage, &table)?;
    if json_mode {
        println!("{}", json!({ "command": "import", "rows": rows.len() }));
    } else {
        println!("imported {} rows from {}", rows.len(), csv.display());
    }
    Ok(())
}

pub fn export(cfg: &Config, store: Option<&Path>, json_mode: bool, csv: &Path) -> eyre::Result<()> {
    let mut storage = open_storage(cfg, store)?;
    let (table, source) = match load_stored(&mut storage)? {
        Some(t) => (t, "storage"),
        None => (defaults(cfg), "defaults"),
    };
    keycal_config::write_table_csv(csv, &table)?;
    if json_mode {
        println!(
            "{}",
            json!({ "command": "export", "rows": table.len(), "source": source })
        );
    } else {
        println!("exported {} rows ({source}) to {}", table.len(), csv.display());
    }
    Ok(())
}

pub fn self_check(cfg: &Config, store: Option<&Path>, json_mode: bool) -> eyre::Result<()> {
    let mut storage = open_storage(cfg, store)?;
    let stored = load_stored(&mut storage)?;
    let state = if stored.is_some() { "table" } else { "empty" };
    let path = store_path(cfg, store);
    if json_mode {
        println!(
            "{}",
            json!({
                "config": "ok",
                "storage": state,
                "path": path.display().to_string(),
                "channels": NUM_NOTES,
            })
        );
    } else {
        println!("config ok");
        println!("storage ok ({state}) at {}", path.display());
    }
    Ok(())
}
