//! Command handlers for the CLI application.
//!
//! - `map`: tap map inspection (check, dump)
//! - `replay`: drive the engine from a tap script
//! - `settings`: write the settings file

pub mod map;
pub mod replay;
pub mod settings;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tapkey::output::{DryRunSink, KeySink};
use tapkey::tapmap::{find_map_file_from, load_map_file, MAP_ENV_VAR, MAP_FILE_NAME};
use tapkey::{OutputBackend, ResolvedMap, Settings};
use tracing::info;

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

/// Pick the map file: command line, then `$TAPMAP`, then settings, then
/// the nearest `default.tapmap.yaml`.
pub fn map_path(settings: &Settings, explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let explicit = explicit
        .or_else(|| std::env::var_os(MAP_ENV_VAR).map(PathBuf::from))
        .or_else(|| settings.map.clone());
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    find_map_file_from(&cwd, explicit).ok_or_else(|| {
        anyhow!("no tap map found: pass a path, set {MAP_ENV_VAR}, or create {MAP_FILE_NAME}")
    })
}

pub fn load_map(settings: &Settings, explicit: Option<PathBuf>) -> anyhow::Result<ResolvedMap> {
    let path = map_path(settings, explicit)?;
    load_map_file(&path).with_context(|| format!("invalid tap map {}", path.display()))
}

/// Output backend per settings, or the dry-run logger when forced.
pub fn open_sink(settings: &Settings, dry_run: bool) -> anyhow::Result<Box<dyn KeySink>> {
    if dry_run || settings.output == OutputBackend::DryRun {
        info!("Output: dry run");
        return Ok(Box::new(DryRunSink::new()));
    }

    #[cfg(all(target_os = "linux", feature = "uinput"))]
    {
        let mut keyboard = tapkey::output::UinputKeyboard::new(&settings.device_name)
            .context("failed to create uinput keyboard (is /dev/uinput writable?)")?;
        if let Some(path) = keyboard.device_path() {
            info!("Output: {} at {}", settings.device_name, path.display());
        }
        return Ok(Box::new(keyboard));
    }

    #[cfg(not(all(target_os = "linux", feature = "uinput")))]
    {
        tracing::warn!("uinput output not available in this build, using dry run");
        Ok(Box::new(DryRunSink::new()))
    }
}
