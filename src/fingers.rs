use crate::{
    config::{ClassifierConfig, ThumbRule},
    types::{FingerState, HandPose, Landmark, LandmarkName},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// (mcp, pip, tip) for the angle model. The thumb is judged by reach instead.
    fn joints(self) -> Option<[LandmarkName; 3]> {
        let joints = match self {
            Finger::Thumb => return None,
            Finger::Index => [
                LandmarkName::IndexMcp,
                LandmarkName::IndexPip,
                LandmarkName::IndexTip,
            ],
            Finger::Middle => [
                LandmarkName::MiddleMcp,
                LandmarkName::MiddlePip,
                LandmarkName::MiddleTip,
            ],
            Finger::Ring => [
                LandmarkName::RingMcp,
                LandmarkName::RingPip,
                LandmarkName::RingTip,
            ],
            Finger::Pinky => [
                LandmarkName::PinkyMcp,
                LandmarkName::PinkyPip,
                LandmarkName::PinkyTip,
            ],
        };
        Some(joints)
    }
}

/// Extended/flexed per finger, thumb first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtensionVector(pub [FingerState; 5]);

impl ExtensionVector {
    pub fn from_bits(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> Self {
        let state = |b: bool| {
            if b {
                FingerState::Extended
            } else {
                FingerState::Flexed
            }
        };
        Self([
            state(thumb),
            state(index),
            state(middle),
            state(ring),
            state(pinky),
        ])
    }

    pub fn all_flexed() -> Self {
        Self([FingerState::Flexed; 5])
    }

    pub fn get(&self, finger: Finger) -> FingerState {
        self.0[finger as usize]
    }

    pub fn extended(&self, finger: Finger) -> bool {
        self.get(finger).is_extended()
    }

    /// Five-bit mask, thumb in the lowest bit.
    pub fn bits(&self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_extended())
            .fold(0u8, |acc, (i, _)| acc | (1 << i))
    }
}

pub fn classify_fingers(pose: &HandPose, cfg: &ClassifierConfig) -> ExtensionVector {
    let Some(points) = pose.landmarks.as_ref() else {
        return ExtensionVector::all_flexed();
    };
    if !pose.is_fully_valid() {
        return ExtensionVector::all_flexed();
    }

    let mut states = [FingerState::Flexed; 5];
    for finger in Finger::ALL {
        let extended = match finger.joints() {
            None => thumb_extended(points, cfg.thumb),
            Some(joints) => {
                let [mcp, pip, tip] = joints.map(|name| points[name.index()]);
                joint_extended(mcp, pip, tip, cfg)
            }
        };
        if extended {
            states[finger as usize] = FingerState::Extended;
        }
    }
    ExtensionVector(states)
}

fn joint_extended(mcp: Landmark, pip: Landmark, tip: Landmark, cfg: &ClassifierConfig) -> bool {
    let pip_to_tip = sub(tip, pip);
    let mcp_to_pip = sub(pip, mcp);
    let m1 = length(pip_to_tip);
    let m2 = length(mcp_to_pip);

    // Coincident joints mean a low-confidence detection.
    if m1 < cfg.min_segment_px || m2 < cfg.min_segment_px {
        return false;
    }

    let cos = (dot(pip_to_tip, mcp_to_pip) / (m1 * m2)).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    angle < cfg.extension_angle_deg
}

fn thumb_extended(points: &[Landmark], rule: ThumbRule) -> bool {
    let wrist = points[LandmarkName::Wrist.index()];
    let tip = points[LandmarkName::ThumbTip.index()];
    let reach = length(sub(tip, wrist));

    let threshold = match rule {
        ThumbRule::FixedPixels { threshold } => threshold,
        ThumbRule::HandScaled { ratio } => {
            let middle_mcp = points[LandmarkName::MiddleMcp.index()];
            let palm = length(sub(middle_mcp, wrist));
            if palm < 1e-3 {
                return false;
            }
            ratio * palm
        }
    };
    reach > threshold
}

fn sub(a: Landmark, b: Landmark) -> [f32; 2] {
    [a.x - b.x, a.y - b.y]
}

fn dot(a: [f32; 2], b: [f32; 2]) -> f32 {
    a[0] * b[0] + a[1] * b[1]
}

fn length(v: [f32; 2]) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}
