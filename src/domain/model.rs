use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized image coordinates, nominally in `[0, 1]` with `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Raw keypoint as emitted by a BlazePose/MediaPipe style detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

/// Indices into the 33-point BlazePose topology.
pub mod blazepose {
    pub const LEFT_EAR: usize = 7;
    pub const LEFT_SHOULDER: usize = 11;
    pub const LEFT_HIP: usize = 23;
    pub const LEFT_KNEE: usize = 25;
}

/// The four joints the classifier needs, any of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub left_knee: Option<Point2>,
    pub left_hip: Option<Point2>,
    pub left_shoulder: Option<Point2>,
    pub left_ear: Option<Point2>,
}

/// All four joints present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureLandmarks {
    pub left_knee: Point2,
    pub left_hip: Point2,
    pub left_shoulder: Point2,
    pub left_ear: Point2,
}

impl LandmarkSet {
    pub fn new(knee: Point2, hip: Point2, shoulder: Point2, ear: Point2) -> Self {
        Self {
            left_knee: Some(knee),
            left_hip: Some(hip),
            left_shoulder: Some(shoulder),
            left_ear: Some(ear),
        }
    }

    /// Picks the left-side joints out of a full detector keypoint list.
    ///
    /// A joint is dropped when its index is out of range, its coordinates are
    /// not finite, or its visibility is below `min_visibility`.
    pub fn from_keypoints(keypoints: &[Keypoint], min_visibility: f32) -> Self {
        let pick = |index: usize| {
            keypoints
                .get(index)
                .filter(|k| k.visibility >= min_visibility)
                .map(|k| Point2::new(f64::from(k.x), f64::from(k.y)))
                .filter(Point2::is_finite)
        };

        Self {
            left_knee: pick(blazepose::LEFT_KNEE),
            left_hip: pick(blazepose::LEFT_HIP),
            left_shoulder: pick(blazepose::LEFT_SHOULDER),
            left_ear: pick(blazepose::LEFT_EAR),
        }
    }

    pub fn complete(&self) -> Option<PostureLandmarks> {
        Some(PostureLandmarks {
            left_knee: self.left_knee.filter(Point2::is_finite)?,
            left_hip: self.left_hip.filter(Point2::is_finite)?,
            left_shoulder: self.left_shoulder.filter(Point2::is_finite)?,
            left_ear: self.left_ear.filter(Point2::is_finite)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.left_knee.is_none()
            && self.left_hip.is_none()
            && self.left_shoulder.is_none()
            && self.left_ear.is_none()
    }
}

/// One sample published by a pose source.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    pub sequence: u64,
    /// `None` when the detector found no person in the frame.
    pub landmarks: Option<LandmarkSet>,
}

/// The three joint angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    /// Knee-hip-shoulder, at the hip.
    pub torso: f64,
    /// Hip-shoulder-ear, at the shoulder.
    pub upper_back: f64,
    /// Shoulder-ear-vertical, at the ear.
    pub neck: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksPassed {
    pub torso: bool,
    pub upper_back: bool,
    pub neck: bool,
}

impl ChecksPassed {
    pub fn all(&self) -> bool {
        self.torso && self.upper_back && self.neck
    }

    /// First failing check in priority order.
    pub fn feedback(&self) -> Option<Feedback> {
        if !self.torso {
            Some(Feedback::SitUpStraight)
        } else if !self.upper_back {
            Some(Feedback::FixShoulderPosition)
        } else if !self.neck {
            Some(Feedback::FixNeckPosition)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    SitUpStraight,
    FixShoulderPosition,
    FixNeckPosition,
}

impl Feedback {
    pub fn message(&self) -> &'static str {
        match self {
            Feedback::SitUpStraight => "Sit up straight!",
            Feedback::FixShoulderPosition => "Fix shoulder position!",
            Feedback::FixNeckPosition => "Fix neck position!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Good {
        angles: JointAngles,
    },
    Slouching {
        angles: JointAngles,
        checks: ChecksPassed,
        feedback: Feedback,
    },
    Indeterminate,
}

impl Verdict {
    pub fn is_good(&self) -> bool {
        matches!(self, Verdict::Good { .. })
    }

    pub fn angles(&self) -> Option<&JointAngles> {
        match self {
            Verdict::Good { angles } | Verdict::Slouching { angles, .. } => Some(angles),
            Verdict::Indeterminate => None,
        }
    }

    pub fn feedback(&self) -> Option<Feedback> {
        match self {
            Verdict::Slouching { feedback, .. } => Some(*feedback),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<PostureStatus> {
        match self {
            Verdict::Good { .. } => Some(PostureStatus::Good),
            Verdict::Slouching { .. } => Some(PostureStatus::Slouch),
            Verdict::Indeterminate => None,
        }
    }
}

/// Status label persisted in the session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostureStatus {
    #[serde(rename = "Good Posture")]
    Good,
    #[serde(rename = "Slouch Detected")]
    Slouch,
}

impl PostureStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PostureStatus::Good => "Good Posture",
            PostureStatus::Slouch => "Slouch Detected",
        }
    }
}

impl fmt::Display for PostureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u64,
    pub username: String,
    pub timestamp: String,
    pub status: PostureStatus,
    #[serde(rename = "duration")]
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTotals {
    pub username: String,
    pub good_secs: f64,
    pub total_secs: f64,
}

impl UserTotals {
    pub fn good_ratio(&self) -> f64 {
        if self.total_secs > 0.0 {
            self.good_secs / self.total_secs * 100.0
        } else {
            0.0
        }
    }
}
