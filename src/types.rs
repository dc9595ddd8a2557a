use std::time::Instant;

pub const NUM_LANDMARKS: usize = 21;

#[derive(Clone, Debug)]
pub struct Frame {
    /// Monotonic capture counter.
    pub sequence: u64,
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    /// A frame without pixel data, used when the detector works from a recording.
    pub fn empty(sequence: u64, width: u32, height: u32, timestamp: Instant) -> Self {
        Self {
            sequence,
            rgba: Vec::new(),
            width,
            height,
            timestamp,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point2D) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LandmarkName {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl LandmarkName {
    /// Canonical detector order: wrist, then thumb/index/middle/ring/pinky base to tip.
    pub const ALL: [LandmarkName; NUM_LANDMARKS] = [
        LandmarkName::Wrist,
        LandmarkName::ThumbCmc,
        LandmarkName::ThumbMcp,
        LandmarkName::ThumbIp,
        LandmarkName::ThumbTip,
        LandmarkName::IndexMcp,
        LandmarkName::IndexPip,
        LandmarkName::IndexDip,
        LandmarkName::IndexTip,
        LandmarkName::MiddleMcp,
        LandmarkName::MiddlePip,
        LandmarkName::MiddleDip,
        LandmarkName::MiddleTip,
        LandmarkName::RingMcp,
        LandmarkName::RingPip,
        LandmarkName::RingDip,
        LandmarkName::RingTip,
        LandmarkName::PinkyMcp,
        LandmarkName::PinkyPip,
        LandmarkName::PinkyDip,
        LandmarkName::PinkyTip,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            LandmarkName::Wrist => "wrist",
            LandmarkName::ThumbCmc => "thumb_cmc",
            LandmarkName::ThumbMcp => "thumb_mcp",
            LandmarkName::ThumbIp => "thumb_ip",
            LandmarkName::ThumbTip => "thumb_tip",
            LandmarkName::IndexMcp => "index_finger_mcp",
            LandmarkName::IndexPip => "index_finger_pip",
            LandmarkName::IndexDip => "index_finger_dip",
            LandmarkName::IndexTip => "index_finger_tip",
            LandmarkName::MiddleMcp => "middle_finger_mcp",
            LandmarkName::MiddlePip => "middle_finger_pip",
            LandmarkName::MiddleDip => "middle_finger_dip",
            LandmarkName::MiddleTip => "middle_finger_tip",
            LandmarkName::RingMcp => "ring_finger_mcp",
            LandmarkName::RingPip => "ring_finger_pip",
            LandmarkName::RingDip => "ring_finger_dip",
            LandmarkName::RingTip => "ring_finger_tip",
            LandmarkName::PinkyMcp => "pinky_mcp",
            LandmarkName::PinkyPip => "pinky_pip",
            LandmarkName::PinkyDip => "pinky_dip",
            LandmarkName::PinkyTip => "pinky_tip",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub name: LandmarkName,
}

impl Landmark {
    pub fn point(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
            Handedness::Unknown => "Unknown",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            l if l.eq_ignore_ascii_case("right") => Handedness::Right,
            l if l.eq_ignore_ascii_case("left") => Handedness::Left,
            _ => Handedness::Unknown,
        }
    }
}

/// One detected hand after normalization.
///
/// When `is_detected` is true, `landmarks` holds all 21 points with finite
/// coordinates. `valid_points` counts how many of them came out of the detector
/// finite; the aggregator drops any hand where that is below 21.
#[derive(Clone, Debug)]
pub struct HandPose {
    pub is_detected: bool,
    pub landmarks: Option<[Landmark; NUM_LANDMARKS]>,
    pub confidence: f32,
    pub index_tip: Option<Point2D>,
    pub handedness: Handedness,
    pub valid_points: usize,
    /// x was already flipped into the mirrored display orientation.
    pub mirrored: bool,
}

impl HandPose {
    pub fn not_detected(confidence: f32) -> Self {
        Self {
            is_detected: false,
            landmarks: None,
            confidence,
            index_tip: None,
            handedness: Handedness::Unknown,
            valid_points: 0,
            mirrored: false,
        }
    }

    pub fn landmark(&self, name: LandmarkName) -> Option<&Landmark> {
        self.landmarks.as_ref().map(|points| &points[name.index()])
    }

    pub fn is_fully_valid(&self) -> bool {
        self.is_detected && self.landmarks.is_some() && self.valid_points == NUM_LANDMARKS
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerState {
    Extended,
    Flexed,
}

impl FingerState {
    pub fn is_extended(&self) -> bool {
        matches!(self, FingerState::Extended)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Drawing,
    Eraser,
    ColorChange,
    ClearCanvas,
    Paused,
    NoGesture,
}

impl GestureKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            GestureKind::Drawing => "Drawing",
            GestureKind::Eraser => "Eraser",
            GestureKind::ColorChange => "Change color",
            GestureKind::ClearCanvas => "Clear canvas",
            GestureKind::Paused => "Paused",
            GestureKind::NoGesture => "No gesture",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            GestureKind::Drawing => "☝️ ",
            GestureKind::Eraser => "✌️ ",
            GestureKind::ColorChange => "🤟 ",
            GestureKind::ClearCanvas => "🖐 ",
            GestureKind::Paused => "✊ ",
            GestureKind::NoGesture => "⋯ ",
        }
    }
}
