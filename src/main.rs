mod cli;

use std::{
    fs,
    path::Path,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use gesture_canvas::{
    AppConfig, DrawingSession, FrameLoop, HandDetector,
    config::BackgroundConfig,
    debounce::IntentEvent,
    pipeline::{LoopEvent, ReplayDetector},
    types::Frame,
};

use cli::{Cli, Commands};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            input,
            output,
            background,
            opacity,
        } => replay(config, &input, &output, background, opacity),
        Commands::Inspect { input } => inspect(config, &input),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn replay(
    mut config: AppConfig,
    input: &Path,
    output: &Path,
    background: Option<String>,
    opacity: u8,
) -> Result<()> {
    if let Some(source) = background {
        config.background = Some(BackgroundConfig { source, opacity });
        config.validate()?;
    }

    let detector = ReplayDetector::open(input)
        .with_context(|| format!("failed to read recording {}", input.display()))?;
    let timestamps: Vec<u64> = detector.frames().iter().map(|f| f.timestamp_ms).collect();
    let (width, height) = (config.camera.width, config.camera.height);

    let session = DrawingSession::new(&config).context("failed to set up drawing session")?;
    let frame_loop = FrameLoop::spawn(session, detector.into_factory(), config.frame_loop.clone())?;

    // One frame in flight at a time so none is dropped as stale.
    let started = Instant::now();
    let mut summary = ReplaySummary::default();
    for (sequence, ts) in timestamps.iter().enumerate() {
        let frame = Frame::empty(
            sequence as u64,
            width,
            height,
            started + Duration::from_millis(*ts),
        );
        frame_loop.send_frame(frame)?;
        wait_for_frame(&frame_loop, sequence as u64, &mut summary)?;
    }

    let png = frame_loop.export_png()?;
    fs::write(output, &png).with_context(|| format!("failed to write {}", output.display()))?;
    frame_loop.stop();

    log::info!(
        "replayed {} frames ({} processed, {} skipped, {} clears, {} color changes) -> {}",
        timestamps.len(),
        summary.processed,
        summary.skipped,
        summary.clears,
        summary.color_changes,
        output.display()
    );
    Ok(())
}

#[derive(Default)]
struct ReplaySummary {
    processed: usize,
    skipped: usize,
    clears: usize,
    color_changes: usize,
}

fn wait_for_frame(frame_loop: &FrameLoop, target: u64, summary: &mut ReplaySummary) -> Result<()> {
    loop {
        let event = frame_loop
            .events()
            .recv_timeout(EVENT_TIMEOUT)
            .context("frame loop went quiet")?;
        match event {
            LoopEvent::Processed { sequence, report } => {
                summary.processed += 1;
                for event in &report.events {
                    match event {
                        IntentEvent::CanvasCleared => summary.clears += 1,
                        IntentEvent::ColorChanged { .. } => summary.color_changes += 1,
                        _ => {}
                    }
                }
                if sequence >= target {
                    return Ok(());
                }
            }
            LoopEvent::Skipped { sequence } => {
                summary.skipped += 1;
                if sequence >= target {
                    return Ok(());
                }
            }
            LoopEvent::TrackingUnavailable => {
                log::warn!("recording could not be opened by the frame loop");
            }
            LoopEvent::TrackingReady { detector } => log::debug!("{detector} detector ready"),
            LoopEvent::Stopped => bail!("frame loop stopped before the recording finished"),
        }
    }
}

fn inspect(config: AppConfig, input: &Path) -> Result<()> {
    let mut detector = ReplayDetector::open(input)
        .with_context(|| format!("failed to read recording {}", input.display()))?;
    let mut session = DrawingSession::new(&config).context("failed to set up drawing session")?;
    let (width, height) = (config.camera.width, config.camera.height);
    let started = Instant::now();

    let timestamps: Vec<u64> = detector.frames().iter().map(|f| f.timestamp_ms).collect();
    for (sequence, ts) in timestamps.into_iter().enumerate() {
        let frame = Frame::empty(sequence as u64, width, height, started + Duration::from_millis(ts));
        let hands = match detector.detect(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                println!("{sequence:>5} {ts:>7}ms  detection failed: {err}");
                Vec::new()
            }
        };
        let report = session.process_hands(&hands, width, height, frame.timestamp);
        let gesture = report
            .primary_gesture
            .map(|g| format!("{}{}", g.emoji(), g.display_name()))
            .unwrap_or_else(|| "no hand".to_string());
        println!(
            "{sequence:>5} {ts:>7}ms  hands={} {:<16} state={:<13} clear={:>3.0}% events={:?}",
            report.hands,
            gesture,
            report.intent.state.label(),
            report.intent.clear_progress,
            report.events
        );
    }
    Ok(())
}
