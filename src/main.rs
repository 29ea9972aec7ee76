use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nmea_replay::config::{Config, ReplaySettings};
use nmea_replay::{FileLineSource, PlaybackEngine, PlaybackSnapshot, SessionOptions, TcpLineSink};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn describe(snapshot: &PlaybackSnapshot) -> String {
    let position = match (snapshot.current, snapshot.current_percent) {
        (Some(current), Some(percent)) => format!("{} ({:.1}%)", current.format("%Y-%m-%d %H:%M:%S"), percent),
        _ => "-".to_string(),
    };
    format!(
        "{:?} at {} speed {}x, {} sent, {} sink errors, {} loops",
        snapshot.status,
        position,
        snapshot.speed,
        snapshot.messages_sent,
        snapshot.sink_errors,
        snapshot.passes_completed
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(config.verbose);

    let settings = ReplaySettings::load();
    let destination = config.destination(&settings);

    let source = FileLineSource::open(&config.file)
        .await
        .with_context(|| format!("Failed to open {}", config.file.display()))?;

    let mut sink = TcpLineSink::new(destination.clone());
    if let Err(e) = sink.connect().await {
        warn!("{}, will keep retrying while playing", e);
    }

    // Percentages only resolve once the log is scanned, so start paused and
    // apply the window and target through the control calls.
    let engine = PlaybackEngine::new();
    let options = SessionOptions {
        speed: config.speed,
        max_gap: config.max_gap,
        paused: true,
        ..SessionOptions::default()
    };
    let snapshot = engine
        .start_with(Box::new(source), Box::new(sink), options)
        .await
        .context("Failed to start playback")?;
    let bounds = snapshot.bounds.context("Playback stopped before the log was scanned")?;

    if let Some(start) = config.window_start {
        engine.set_window_start(start.resolve(&bounds)?).await?;
    }
    if let Some(end) = config.window_end {
        engine.set_window_end(end.resolve(&bounds)?).await?;
    }
    if let Some(target) = config.target {
        engine.set_target(Some(target.resolve(&bounds)?)).await?;
    }
    let snapshot = if config.paused {
        engine.status().await
    } else {
        engine.play().await?
    };
    info!("Replaying {} to {}: {}", config.file.display(), destination, describe(&snapshot));

    if config.status_interval > 0 {
        let reporter = engine.clone();
        let period = Duration::from_secs(config.status_interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = reporter.status().await;
                if !snapshot.status.is_running() {
                    break;
                }
                info!("{}", describe(&snapshot));
            }
        });
    }

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, stopping playback");
        }
        _ = engine.stopped() => {
            warn!("Playback ended on its own");
        }
    }

    let last = engine.stop().await;
    engine.join().await;
    info!("Stopped after {} sentences", last.messages_sent);
    Ok(())
}
