//! Combines every hand in a frame into one view: which hand leads, where it
//! points in display space, and which other hands are drawing too.

use crate::{
    gesture::{GestureClassifier, HandClassification},
    landmarks::{DetectorProfile, RawHandRecord},
    types::{Handedness, HandPose, Point2D},
};

/// Secondary tips closer than this to the primary tip are treated as the same point.
pub const DUPLICATE_RADIUS_PX: f32 = 5.0;

/// Which physical hand stands behind a position. A side is used while it is
/// unique in the frame; otherwise the hand's slot among the valid hands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandKey {
    Side(Handedness),
    Slot(usize),
}

#[derive(Clone, Debug, Default)]
pub struct AggregateFrame {
    /// Valid hands in detector order.
    pub hands: Vec<HandClassification>,
    pub primary: Option<usize>,
    pub primary_position: Option<Point2D>,
    pub primary_key: Option<HandKey>,
    pub secondary_positions: Vec<Point2D>,
    /// Parallel to `secondary_positions`.
    pub secondary_keys: Vec<HandKey>,
    pub is_dual_hand_drawing: bool,
    pub hand_in_view_confidence: f32,
    pub eraser_any: bool,
}

impl AggregateFrame {
    pub fn nothing() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn primary_hand(&self) -> Option<&HandClassification> {
        self.primary.and_then(|i| self.hands.get(i))
    }
}

pub struct HandAggregator {
    profile: DetectorProfile,
    classifier: GestureClassifier,
}

impl HandAggregator {
    pub fn new(profile: DetectorProfile, classifier: GestureClassifier) -> Self {
        Self {
            profile,
            classifier,
        }
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    /// Normalizes, classifies and merges raw detector output for one frame.
    /// `width`/`height` are the frame dimensions the detector ran on.
    pub fn aggregate(&self, records: &[RawHandRecord], width: f32, height: f32) -> AggregateFrame {
        let poses = records
            .iter()
            .map(|record| self.profile.normalize(record, width, height))
            .collect();
        self.aggregate_poses(poses, width, height)
    }

    pub fn aggregate_poses(&self, poses: Vec<HandPose>, width: f32, height: f32) -> AggregateFrame {
        let total = poses.len();
        let hands: Vec<HandClassification> = poses
            .into_iter()
            .filter_map(|pose| self.classifier.classify(pose))
            .collect();

        if hands.len() < total {
            log::debug!("dropped {} of {} hands without a full landmark set", total - hands.len(), total);
        }
        if hands.is_empty() {
            return AggregateFrame::nothing();
        }

        let primary = pick_primary(&hands);
        let primary_position = hands[primary]
            .pose
            .index_tip
            .map(|tip| to_display(tip, hands[primary].pose.mirrored, width, height));

        let drawing_with_tip = |hand: &HandClassification| {
            hand.gesture.is_drawing() && hand.pose.index_tip.is_some()
        };
        let is_dual_hand_drawing = hands.iter().filter(|h| drawing_with_tip(*h)).count() >= 2;

        let keys = hand_keys(&hands);
        let (secondary_keys, secondary_positions): (Vec<_>, Vec<_>) = hands
            .iter()
            .enumerate()
            .filter(|(i, hand)| *i != primary && drawing_with_tip(*hand))
            .filter_map(|(i, hand)| {
                hand.pose
                    .index_tip
                    .map(|tip| (keys[i], to_display(tip, hand.pose.mirrored, width, height)))
            })
            .filter(|(_, pos)| {
                primary_position.is_none_or(|p| p.distance(*pos) >= DUPLICATE_RADIUS_PX)
            })
            .unzip();

        let hand_in_view_confidence = hands
            .iter()
            .map(|h| h.pose.confidence)
            .fold(0.0f32, f32::max);
        let eraser_any = hands.iter().any(|h| h.gesture.is_eraser());

        AggregateFrame {
            hands,
            primary: Some(primary),
            primary_position,
            primary_key: Some(keys[primary]),
            secondary_positions,
            secondary_keys,
            is_dual_hand_drawing,
            hand_in_view_confidence,
            eraser_any,
        }
    }
}

/// First right hand, else first left hand, else the first hand.
fn pick_primary(hands: &[HandClassification]) -> usize {
    let find = |side: Handedness| hands.iter().position(|h| h.pose.handedness == side);
    find(Handedness::Right)
        .or_else(|| find(Handedness::Left))
        .unwrap_or(0)
}

fn hand_keys(hands: &[HandClassification]) -> Vec<HandKey> {
    let side_count = |side: Handedness| {
        hands
            .iter()
            .filter(|h| h.pose.handedness == side)
            .count()
    };
    hands
        .iter()
        .enumerate()
        .map(|(i, hand)| match hand.pose.handedness {
            Handedness::Unknown => HandKey::Slot(i),
            side if side_count(side) > 1 => HandKey::Slot(i),
            side => HandKey::Side(side),
        })
        .collect()
}

/// Maps a tip into the mirrored display. Poses the normalizer already flipped
/// are only clamped.
pub fn to_display(tip: Point2D, already_mirrored: bool, width: f32, height: f32) -> Point2D {
    let x = if already_mirrored { tip.x } else { width - tip.x };
    Point2D::new(x.clamp(0.0, width), tip.y.clamp(0.0, height))
}
