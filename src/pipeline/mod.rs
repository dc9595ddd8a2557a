pub mod detector;
pub mod frame_loop;
pub mod session;

use crossbeam_channel::Receiver;

use crate::{landmarks::RawHandRecord, types::Frame};

pub use detector::{RecordedFrame, ReplayDetector};
pub use frame_loop::{Command, FrameLoop, LoopEvent};
pub use session::{DrawingSession, FrameReport};

/// The external hand-landmark model.
pub trait HandDetector: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<RawHandRecord>>;

    fn label(&self) -> &'static str {
        "detector"
    }
}

/// Builds a detector on the worker thread, so a failed init can be retried.
pub trait DetectorFactory: Send + 'static {
    fn create(&mut self) -> anyhow::Result<Box<dyn HandDetector>>;
}

impl<F> DetectorFactory for F
where
    F: FnMut() -> anyhow::Result<Box<dyn HandDetector>> + Send + 'static,
{
    fn create(&mut self) -> anyhow::Result<Box<dyn HandDetector>> {
        (self)()
    }
}

/// Replaces `frame` with anything newer already queued so a slow consumer
/// always works on the freshest capture. Returns how many stale frames were
/// dropped.
pub(crate) fn drain_newer(frame_rx: &Receiver<Frame>, mut frame: Frame) -> (Frame, usize) {
    let mut dropped = 0;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
        dropped += 1;
    }
    (frame, dropped)
}
