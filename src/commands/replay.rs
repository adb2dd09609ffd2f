//! Script replay command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tapkey::tapmap::annotation;
use tapkey::{Engine, LoggingDevice, Script, Settings};
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Device event buffer between the script feeder and the engine
const EVENT_BUFFER: usize = 64;

pub async fn run(
    settings: &Settings,
    script: &Path,
    map: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let script = Script::load(script)?;
    let map = super::load_map(settings, map)?;
    let sink = super::open_sink(settings, dry_run)?;

    let mut engine = Engine::new(
        Arc::new(map),
        sink,
        Box::new(LoggingDevice::new()),
        settings.engine_config(),
    );
    info!(
        "Replaying {} step(s) into {}",
        script.steps.len(),
        engine.scheduler().sink_name()
    );

    // Live feedback on stdout
    let mut modes = engine.subscribe_modes();
    let mut taps = engine.subscribe_taps();
    let mut notices = engine.subscribe_notices();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = modes.recv() => match event {
                    Ok(event) if event.once_level > 0 => {
                        println!("mode: {} (once x{})", event.mode, event.once_level);
                    }
                    Ok(event) => println!("mode: {}", event.mode),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                tap = taps.recv() => match tap {
                    Ok(tap) if tap.committed => {
                        println!("tap:  {} x{}", annotation(tap.mask), tap.count + 1);
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                notice = notices.recv() => match notice {
                    Ok(notice) => println!("note: {}", notice.message),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });

    let running = super::setup_interrupt_handler();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let feeder = tokio::spawn({
        let running = Arc::clone(&running);
        async move { script.replay(tx, running).await }
    });

    engine.run(rx, running).await;
    let sent = feeder.await?;
    drop(engine);
    printer.await?;

    info!("Replayed {sent} device event(s)");
    Ok(())
}
