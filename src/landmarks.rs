//! Converts detector records into canonical pixel-space hand poses.
//!
//! Which keypoint list is authoritative, how its fields are named and whether
//! coordinates are normalized is fixed by a [`DetectorProfile`] chosen when the
//! session is configured. A record is never tried against alternative shapes.

use serde::{Deserialize, Serialize};

use crate::types::{HandPose, Handedness, Landmark, LandmarkName, NUM_LANDMARKS, Point2D};

const DEFAULT_CONFIDENCE: f32 = 0.5;

/// One hand as emitted by the external detector.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawHandRecord {
    #[serde(default)]
    pub keypoints: Vec<RawKeypoint>,
    #[serde(default, rename = "keypoints3D")]
    pub keypoints_3d: Vec<RawKeypoint>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub handedness: Option<RawHandedness>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKeypoint {
    Array(Vec<Option<f64>>),
    Fields(KeypointFields),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeypointFields {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default, rename = "x3D")]
    pub x_3d: Option<f64>,
    #[serde(default, rename = "y3D")]
    pub y_3d: Option<f64>,
    #[serde(default, rename = "z3D")]
    pub z_3d: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RawKeypoint {
    pub fn pixel(x: f32, y: f32) -> Self {
        RawKeypoint::Fields(KeypointFields {
            x: Some(f64::from(x)),
            y: Some(f64::from(y)),
            z: Some(0.0),
            ..KeypointFields::default()
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawHandedness {
    Label(String),
    Classifications(Vec<RawClassification>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawClassification {
    Label(String),
    Scored {
        label: String,
        #[serde(default)]
        score: Option<f64>,
    },
}

impl RawHandedness {
    fn resolve(&self) -> Handedness {
        match self {
            RawHandedness::Label(label) => Handedness::from_label(label),
            RawHandedness::Classifications(list) => match list.first() {
                Some(RawClassification::Label(label))
                | Some(RawClassification::Scored { label, .. }) => Handedness::from_label(label),
                None => Handedness::Unknown,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointSource {
    #[default]
    Keypoints,
    Keypoints3d,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNaming {
    /// `x`, `y`, `z`
    #[default]
    Plain,
    /// `x3D`, `y3D`, `z3D`
    Suffixed3d,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    #[default]
    Pixel,
    Normalized,
}

/// The detector contract a session is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorProfile {
    pub source: KeypointSource,
    pub naming: FieldNaming,
    pub space: CoordinateSpace,
    pub mirror_x: bool,
}

impl Default for DetectorProfile {
    fn default() -> Self {
        Self {
            source: KeypointSource::Keypoints,
            naming: FieldNaming::Plain,
            space: CoordinateSpace::Pixel,
            mirror_x: true,
        }
    }
}

impl DetectorProfile {
    pub fn normalize(&self, record: &RawHandRecord, frame_width: f32, frame_height: f32) -> HandPose {
        normalize_hand(record, self, frame_width, frame_height)
    }

    fn keypoints<'a>(&self, record: &'a RawHandRecord) -> &'a [RawKeypoint] {
        match self.source {
            KeypointSource::Keypoints => &record.keypoints,
            KeypointSource::Keypoints3d => &record.keypoints_3d,
        }
    }

    fn read(&self, keypoint: &RawKeypoint) -> [Option<f64>; 3] {
        match keypoint {
            RawKeypoint::Array(values) => [
                values.first().copied().flatten(),
                values.get(1).copied().flatten(),
                values.get(2).copied().flatten(),
            ],
            RawKeypoint::Fields(fields) => match self.naming {
                FieldNaming::Plain => [fields.x, fields.y, fields.z],
                FieldNaming::Suffixed3d => [fields.x_3d, fields.y_3d, fields.z_3d],
            },
        }
    }

    fn to_pixel_x(&self, raw: f64, frame_width: f32) -> f32 {
        let raw = raw as f32;
        let px = match self.space {
            CoordinateSpace::Pixel => raw,
            CoordinateSpace::Normalized => raw * frame_width,
        };
        if self.mirror_x { frame_width - px } else { px }
    }

    fn to_pixel_y(&self, raw: f64, frame_height: f32) -> f32 {
        let raw = raw as f32;
        match self.space {
            CoordinateSpace::Pixel => raw,
            CoordinateSpace::Normalized => raw * frame_height,
        }
    }
}

pub fn normalize_hand(
    record: &RawHandRecord,
    profile: &DetectorProfile,
    frame_width: f32,
    frame_height: f32,
) -> HandPose {
    let confidence = record
        .score
        .map(|s| s as f32)
        .filter(|s| s.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    let raw_points = profile.keypoints(record);
    if raw_points.is_empty() {
        log::debug!("hand record has no {:?} entries", profile.source);
        return HandPose::not_detected(confidence);
    }

    let mut recognized = 0usize;
    let mut valid_points = 0usize;
    let landmarks: [Landmark; NUM_LANDMARKS] = std::array::from_fn(|i| {
        let name = LandmarkName::ALL[i];
        let [rx, ry, rz] = raw_points
            .get(i)
            .map(|kp| profile.read(kp))
            .unwrap_or([None, None, None]);
        if rx.is_some() || ry.is_some() {
            recognized += 1;
        }

        let x = rx.map(|v| profile.to_pixel_x(v, frame_width));
        let y = ry.map(|v| profile.to_pixel_y(v, frame_height));
        let finite = |v: Option<f32>| v.filter(|v| v.is_finite());
        let (x, y) = (finite(x), finite(y));
        if x.is_some() && y.is_some() {
            valid_points += 1;
        } else {
            log::trace!("{} has no usable coordinates", name.label());
        }

        Landmark {
            x: x.unwrap_or(0.0),
            y: y.unwrap_or(0.0),
            z: rz.map(|v| v as f32).filter(|v| v.is_finite()).unwrap_or(0.0),
            name,
        }
    });

    if recognized == 0 || valid_points == 0 {
        log::debug!(
            "hand record has {} keypoints but no usable coordinates for {:?}/{:?}",
            raw_points.len(),
            profile.naming,
            profile.space
        );
        return HandPose::not_detected(confidence);
    }

    let tip = landmarks[LandmarkName::IndexTip.index()];
    let index_tip = (valid_points == NUM_LANDMARKS)
        .then(|| Point2D::new(tip.x, tip.y))
        .filter(|p| p.is_finite());

    HandPose {
        is_detected: true,
        landmarks: Some(landmarks),
        confidence,
        index_tip,
        handedness: record
            .handedness
            .as_ref()
            .map(RawHandedness::resolve)
            .unwrap_or(Handedness::Unknown),
        valid_points,
        mirrored: profile.mirror_x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_profile() -> DetectorProfile {
        DetectorProfile {
            mirror_x: false,
            ..DetectorProfile::default()
        }
    }

    fn record_from_json(json: &str) -> RawHandRecord {
        serde_json::from_str(json).unwrap()
    }

    fn full_pixel_record() -> RawHandRecord {
        RawHandRecord {
            keypoints: (0..NUM_LANDMARKS)
                .map(|i| RawKeypoint::pixel(10.0 * i as f32, 5.0 * i as f32))
                .collect(),
            score: Some(0.9),
            handedness: Some(RawHandedness::Label("Right".into())),
            ..RawHandRecord::default()
        }
    }

    #[test]
    fn keeps_canonical_order_and_names() {
        let pose = pixel_profile().normalize(&full_pixel_record(), 640.0, 360.0);
        assert!(pose.is_fully_valid());
        let landmarks = pose.landmarks.unwrap();
        assert_eq!(landmarks[0].name, LandmarkName::Wrist);
        assert_eq!(landmarks[20].name, LandmarkName::PinkyTip);
        assert_eq!(landmarks[8].x, 80.0);
        assert_eq!(pose.index_tip, Some(Point2D::new(80.0, 40.0)));
        assert_eq!(pose.handedness, Handedness::Right);
        assert!((pose.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn mirrors_normalized_coordinates() {
        let json = r#"{ "keypoints": [[0.25, 0.5, 0.1]], "score": 0.8 }"#;
        let profile = DetectorProfile {
            space: CoordinateSpace::Normalized,
            mirror_x: true,
            ..DetectorProfile::default()
        };
        let pose = profile.normalize(&record_from_json(json), 640.0, 360.0);
        let wrist = pose.landmark(LandmarkName::Wrist).copied().unwrap();
        assert_eq!(wrist.x, 480.0);
        assert_eq!(wrist.y, 180.0);
        assert!(pose.mirrored);
        // Only one of 21 points present: detected, but not valid for aggregation.
        assert!(pose.is_detected);
        assert_eq!(pose.valid_points, 1);
        assert!(!pose.is_fully_valid());
        assert!(pose.index_tip.is_none());
    }

    #[test]
    fn reads_suffixed_fields_only_for_that_profile() {
        let json = r#"{ "keypoints3D": [{ "x3D": 0.5, "y3D": 0.5, "z3D": 0.0 }] }"#;
        let record = record_from_json(json);

        let suffixed = DetectorProfile {
            source: KeypointSource::Keypoints3d,
            naming: FieldNaming::Suffixed3d,
            space: CoordinateSpace::Normalized,
            mirror_x: false,
        };
        let pose = suffixed.normalize(&record, 640.0, 360.0);
        assert!(pose.is_detected);
        assert_eq!(pose.landmark(LandmarkName::Wrist).unwrap().x, 320.0);

        let plain = DetectorProfile {
            naming: FieldNaming::Plain,
            ..suffixed
        };
        let pose = plain.normalize(&record, 640.0, 360.0);
        assert!(!pose.is_detected);
        assert!(pose.landmarks.is_none());
    }

    #[test]
    fn missing_coordinates_default_to_zero_and_lower_validity() {
        let mut record = full_pixel_record();
        record.keypoints[3] = RawKeypoint::Fields(KeypointFields {
            x: None,
            y: Some(12.0),
            ..KeypointFields::default()
        });
        let pose = pixel_profile().normalize(&record, 640.0, 360.0);
        assert!(pose.is_detected);
        assert_eq!(pose.valid_points, NUM_LANDMARKS - 1);
        assert_eq!(pose.landmark(LandmarkName::ThumbIp).unwrap().x, 0.0);
        assert!(!pose.is_fully_valid());
    }

    #[test]
    fn no_recognizable_fields_is_not_detected() {
        let json = r#"{ "keypoints": [{ "name": "wrist" }, { "u": 1.0 }], "score": 0.7 }"#;
        let pose = pixel_profile().normalize(&record_from_json(json), 640.0, 360.0);
        assert!(!pose.is_detected);
        assert!(pose.landmarks.is_none());
        assert!((pose.confidence - 0.7).abs() < 1e-6);

        let empty = pixel_profile().normalize(&RawHandRecord::default(), 640.0, 360.0);
        assert!(!empty.is_detected);
        assert_eq!(empty.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn parses_handedness_classifications() {
        let json = r#"{ "keypoints": [[1, 2, 3]], "handedness": [{ "label": "Left", "score": 0.97 }] }"#;
        let pose = pixel_profile().normalize(&record_from_json(json), 640.0, 360.0);
        assert_eq!(pose.handedness, Handedness::Left);

        let json = r#"{ "keypoints": [[1, 2, 3]], "handedness": "sideways" }"#;
        let pose = pixel_profile().normalize(&record_from_json(json), 640.0, 360.0);
        assert_eq!(pose.handedness, Handedness::Unknown);
    }
}
