use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use image::RgbaImage;

use super::{DetectorFactory, FrameReport, HandDetector, drain_newer, session::DrawingSession};
use crate::{
    canvas::SourceId,
    config::FrameLoopConfig,
    error::CanvasError,
    types::{Frame, Point2D},
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_SLOW_SKIP: u32 = 3;

pub enum Command {
    PointerDown { source: SourceId, position: Point2D },
    PointerMove { source: SourceId, position: Point2D },
    PointerUp { source: SourceId },
    Undo,
    Redo,
    Clear,
    SetBackground { source: String, opacity: u8 },
    RemoveBackground,
    SetBrushColor(String),
    SetBrushWidth(u32),
    SetEraser(bool),
    ExportPng(Sender<Result<Vec<u8>, CanvasError>>),
    Snapshot(Sender<RgbaImage>),
    Stop,
}

#[derive(Clone, Debug)]
pub enum LoopEvent {
    TrackingReady { detector: &'static str },
    /// Detector init failed on every attempt; only pointer input works.
    TrackingUnavailable,
    Processed { sequence: u64, report: FrameReport },
    Skipped { sequence: u64 },
    Stopped,
}

/// Owns the worker thread that runs detection and rendering for one session.
pub struct FrameLoop {
    frame_tx: Sender<Frame>,
    command_tx: Sender<Command>,
    events: Receiver<LoopEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameLoop {
    pub fn spawn<F: DetectorFactory>(
        session: DrawingSession,
        factory: F,
        cfg: FrameLoopConfig,
    ) -> Result<Self> {
        let (frame_tx, frame_rx) = bounded::<Frame>(1);
        let (command_tx, command_rx) = unbounded();
        let (event_tx, events) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name("frame-loop".into())
            .spawn(move || {
                let mut worker = Worker {
                    session,
                    factory,
                    detector: None,
                    cfg,
                    events: event_tx,
                    stop: stop_flag,
                    skip_remaining: 0,
                    error_streak: 0,
                };
                worker.run(frame_rx, command_rx);
            })
            .context("failed to spawn frame loop thread")?;

        Ok(Self {
            frame_tx,
            command_tx,
            events,
            stop,
            handle: Some(handle),
        })
    }

    /// Hands a frame to the worker, dropping it if the worker is still busy.
    pub fn submit_frame(&self, frame: Frame) -> bool {
        self.frame_tx.try_send(frame).is_ok()
    }

    /// Waits for room instead of dropping; used when replaying recordings.
    pub fn send_frame(&self, frame: Frame) -> Result<()> {
        self.frame_tx
            .send(frame)
            .map_err(|_| anyhow!("frame loop has stopped"))
    }

    pub fn command(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| anyhow!("frame loop has stopped"))
    }

    pub fn events(&self) -> &Receiver<LoopEvent> {
        &self.events
    }

    pub fn export_png(&self) -> Result<Vec<u8>> {
        let (tx, rx) = bounded(1);
        self.command(Command::ExportPng(tx))?;
        let png = rx
            .recv_timeout(REPLY_TIMEOUT)
            .context("frame loop did not answer export")??;
        Ok(png)
    }

    pub fn snapshot(&self) -> Result<RgbaImage> {
        let (tx, rx) = bounded(1);
        self.command(Command::Snapshot(tx))?;
        rx.recv_timeout(REPLY_TIMEOUT)
            .context("frame loop did not answer snapshot")
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.command_tx.try_send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("frame loop thread panicked");
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<F> {
    session: DrawingSession,
    factory: F,
    detector: Option<Box<dyn HandDetector>>,
    cfg: FrameLoopConfig,
    events: Sender<LoopEvent>,
    stop: Arc<AtomicBool>,
    skip_remaining: u32,
    error_streak: u32,
}

impl<F: DetectorFactory> Worker<F> {
    fn run(&mut self, frame_rx: Receiver<Frame>, command_rx: Receiver<Command>) {
        log::info!("frame loop started");
        self.init_detector();

        while !self.stopped() {
            select! {
                recv(frame_rx) -> msg => match msg {
                    Ok(frame) => {
                        let (frame, dropped) = drain_newer(&frame_rx, frame);
                        if dropped > 0 {
                            log::debug!("dropped {dropped} stale frames");
                        }
                        self.handle_frame(frame);
                    }
                    Err(_) => break,
                },
                recv(command_rx) -> msg => match msg {
                    Ok(Command::Stop) | Err(_) => break,
                    Ok(command) => self.handle_command(command),
                },
                default(POLL_INTERVAL) => {}
            }
        }

        let _ = self.events.send(LoopEvent::Stopped);
        log::info!("frame loop stopped");
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Tries the factory up to `init_attempts` times with doubling backoff.
    fn init_detector(&mut self) -> bool {
        let attempts = self.cfg.init_attempts.max(1);
        for attempt in 0..attempts {
            if self.stopped() {
                return false;
            }
            match self.factory.create() {
                Ok(detector) => {
                    log::info!("hand detector ready: {}", detector.label());
                    let _ = self.events.send(LoopEvent::TrackingReady {
                        detector: detector.label(),
                    });
                    self.detector = Some(detector);
                    return true;
                }
                Err(err) => {
                    log::warn!(
                        "hand detector init failed (attempt {}/{}): {err:?}",
                        attempt + 1,
                        attempts
                    );
                    if attempt + 1 < attempts {
                        thread::sleep(self.cfg.init_backoff(attempt));
                    }
                }
            }
        }

        log::error!("hand tracking unavailable, continuing with pointer input only");
        let _ = self.events.send(LoopEvent::TrackingUnavailable);
        false
    }

    fn handle_frame(&mut self, frame: Frame) {
        // A queued frame can win the select against Stop.
        if self.stopped() {
            return;
        }
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            let _ = self.events.send(LoopEvent::Skipped {
                sequence: frame.sequence,
            });
            return;
        }
        let Some(detector) = self.detector.as_mut() else {
            let _ = self.events.send(LoopEvent::Skipped {
                sequence: frame.sequence,
            });
            return;
        };

        let started = Instant::now();
        let hands = match detector.detect(&frame) {
            Ok(hands) => {
                self.error_streak = 0;
                let took = started.elapsed();
                if took > self.cfg.slow_inference() {
                    self.skip_remaining = slow_skip(took);
                    log::debug!("detection took {took:?}, skipping {} frames", self.skip_remaining);
                }
                hands
            }
            Err(err) => {
                self.error_streak += 1;
                self.skip_remaining = error_skip(self.error_streak, self.cfg.max_error_skip);
                log::warn!(
                    "hand detection failed ({} in a row), skipping {} frames: {err:?}",
                    self.error_streak,
                    self.skip_remaining
                );
                Vec::new()
            }
        };

        let report = self
            .session
            .process_hands(&hands, frame.width, frame.height, frame.timestamp);
        let _ = self.events.send(LoopEvent::Processed {
            sequence: frame.sequence,
            report,
        });

        if self.cfg.reinit_after_errors > 0 && self.error_streak >= self.cfg.reinit_after_errors {
            log::warn!("too many detection failures, rebuilding detector");
            self.detector = None;
            self.error_streak = 0;
            self.skip_remaining = 0;
            self.session.reset_tracking();
            self.init_detector();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::PointerDown { source, position } => self.session.pointer_down(source, position),
            Command::PointerMove { source, position } => {
                self.session.pointer_move(source, position);
            }
            Command::PointerUp { source } => self.session.pointer_up(source),
            Command::Undo => {
                self.session.undo();
            }
            Command::Redo => {
                self.session.redo();
            }
            Command::Clear => self.session.clear(),
            Command::SetBackground { source, opacity } => {
                if let Err(err) = self.session.set_background(&source, opacity) {
                    log::warn!("failed to set background: {err:?}");
                }
            }
            Command::RemoveBackground => self.session.remove_background(),
            Command::SetBrushColor(color) => {
                if let Err(err) = self.session.set_brush_color(&color) {
                    log::warn!("ignoring brush color: {err}");
                }
            }
            Command::SetBrushWidth(width) => self.session.set_brush_width(width),
            Command::SetEraser(eraser) => self.session.set_eraser(eraser),
            Command::ExportPng(reply) => {
                let _ = reply.send(self.session.export_png());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.session.composite());
            }
            Command::Stop => {}
        }
    }
}

/// 1, 2, 4, ... frames, capped.
fn error_skip(streak: u32, cap: u32) -> u32 {
    let doubled = 1u32.checked_shl(streak.saturating_sub(1)).unwrap_or(u32::MAX);
    doubled.min(cap)
}

/// One frame per 20 ms of inference, at most three.
fn slow_skip(took: Duration) -> u32 {
    ((took.as_millis() / 20) as u32).min(MAX_SLOW_SKIP)
}
