//! Offline detector backend: plays back recorded model output so the rest of
//! the pipeline can run without a camera or a model.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use serde::{Deserialize, Serialize};

use super::{DetectorFactory, HandDetector};
use crate::{error::DetectorError, landmarks::RawHandRecord, types::Frame};

/// One line of a recording.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordedFrame {
    #[serde(default)]
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hands: Vec<RawHandRecord>,
    /// Replays as a failed inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ReplayDetector {
    frames: Vec<RecordedFrame>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self { frames }
    }

    pub fn open(path: &Path) -> Result<Self, DetectorError> {
        let file = File::open(path).map_err(|err| {
            DetectorError::Acquisition(format!("cannot open {}: {err}", path.display()))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// JSON Lines; blank lines are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, DetectorError> {
        let mut frames = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| DetectorError::Acquisition(err.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = serde_json::from_str(&line).map_err(|source| DetectorError::Malformed {
                line: idx + 1,
                source,
            })?;
            frames.push(frame);
        }
        log::info!("loaded {} recorded frames", frames.len());
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// A recording plays once: the first build hands it out, later ones fail.
    pub fn into_factory(self) -> impl DetectorFactory {
        let mut slot = Some(self);
        move || -> anyhow::Result<Box<dyn HandDetector>> {
            match slot.take() {
                Some(detector) => Ok(Box::new(detector)),
                None => Err(DetectorError::Init("recording was already consumed".into()).into()),
            }
        }
    }
}

impl HandDetector for ReplayDetector {
    /// Looks the frame up by its sequence number; frames past the end of the
    /// recording see no hands.
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<RawHandRecord>> {
        let Some(recorded) = usize::try_from(frame.sequence)
            .ok()
            .and_then(|i| self.frames.get(i))
        else {
            return Ok(Vec::new());
        };
        if let Some(message) = &recorded.error {
            return Err(DetectorError::Inference(message.clone()).into());
        }
        Ok(recorded.hands.clone())
    }

    fn label(&self) -> &'static str {
        "replay"
    }
}
