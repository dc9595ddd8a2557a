use crate::{
    config::ClassifierConfig,
    fingers::{ExtensionVector, Finger, classify_fingers},
    types::{GestureKind, HandPose, LandmarkName},
};

/// Per-hand classification for one frame.
///
/// The gesture is a single [`GestureKind`], so at most one of the boolean
/// views below can be true.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureState {
    pub kind: GestureKind,
    /// Index-tip to middle-tip distance, reported for the eraser gesture.
    pub finger_distance: Option<f32>,
}

impl GestureState {
    pub fn none() -> Self {
        Self {
            kind: GestureKind::NoGesture,
            finger_distance: None,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.kind == GestureKind::Drawing
    }

    pub fn is_eraser(&self) -> bool {
        self.kind == GestureKind::Eraser
    }

    pub fn is_change_color(&self) -> bool {
        self.kind == GestureKind::ColorChange
    }

    pub fn is_clear_canvas(&self) -> bool {
        self.kind == GestureKind::ClearCanvas
    }

    pub fn is_paused(&self) -> bool {
        self.kind == GestureKind::Paused
    }

    pub fn active_flags(&self) -> usize {
        [
            self.is_drawing(),
            self.is_eraser(),
            self.is_change_color(),
            self.is_clear_canvas(),
            self.is_paused(),
        ]
        .into_iter()
        .filter(|f| *f)
        .count()
    }
}

#[derive(Clone, Debug)]
pub struct HandClassification {
    pub pose: HandPose,
    pub extensions: ExtensionVector,
    pub gesture: GestureState,
}

pub struct GestureClassifier {
    cfg: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self { cfg }
    }

    /// Classifies a normalized hand. Hands without a full set of finite
    /// landmarks are rejected.
    pub fn classify(&self, pose: HandPose) -> Option<HandClassification> {
        if !pose.is_fully_valid() {
            return None;
        }

        let extensions = classify_fingers(&pose, &self.cfg);
        let kind = gesture_for(&extensions);
        let finger_distance = match kind {
            GestureKind::Eraser => index_middle_distance(&pose),
            _ => None,
        };

        log::debug!(
            "hand {} bits={:05b} -> {}",
            pose.handedness.label(),
            extensions.bits(),
            kind.display_name()
        );

        Some(HandClassification {
            pose,
            extensions,
            gesture: GestureState {
                kind,
                finger_distance,
            },
        })
    }

    /// True when an eraser's fingers are held close enough to count as the
    /// narrow tool. Informational only.
    pub fn fingers_close(&self, gesture: &GestureState) -> bool {
        gesture
            .finger_distance
            .is_some_and(|d| d < self.cfg.fingers_close_px)
    }
}

/// The fixed pattern table. Fingers not named in a row must be flexed.
pub fn gesture_for(ext: &ExtensionVector) -> GestureKind {
    let thumb = ext.extended(Finger::Thumb);
    let index = ext.extended(Finger::Index);
    let middle = ext.extended(Finger::Middle);
    let ring = ext.extended(Finger::Ring);
    let pinky = ext.extended(Finger::Pinky);

    match (thumb, index, middle, ring, pinky) {
        (false, true, false, false, false) => GestureKind::Drawing,
        (false, true, true, false, false) => GestureKind::Eraser,
        (false, true, true, true, false) => GestureKind::ColorChange,
        (true, true, true, true, true) => GestureKind::ClearCanvas,
        (false, false, false, false, false) => GestureKind::Paused,
        _ => GestureKind::NoGesture,
    }
}

fn index_middle_distance(pose: &HandPose) -> Option<f32> {
    let index = pose.landmark(LandmarkName::IndexTip)?.point();
    let middle = pose.landmark(LandmarkName::MiddleTip)?.point();
    Some(index.distance(middle))
}
