//! Joint-angle posture classification.
//!
//! Everything here is a pure function of its inputs and safe to call from any
//! thread.

use crate::domain::model::{ChecksPassed, JointAngles, LandmarkSet, Point2, PostureLandmarks, Verdict};
use serde::{Deserialize, Serialize};

/// Whether the torso band's end points count as inside the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandEdges {
    #[default]
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPreset {
    /// 65..=110 torso, upper back and neck at least 160.
    #[default]
    Standard,
    /// 60..=105 torso, upper back and neck at least 165.
    Strict,
}

impl ThresholdPreset {
    pub fn thresholds(&self) -> Thresholds {
        match self {
            ThresholdPreset::Standard => Thresholds::standard(),
            ThresholdPreset::Strict => Thresholds::strict(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub torso_min: f64,
    pub torso_max: f64,
    pub upper_back_min: f64,
    pub neck_min: f64,
    pub band_edges: BandEdges,
    /// Height above the ear of the synthetic vertical reference point.
    pub vertical_offset: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::standard()
    }
}

impl Thresholds {
    pub const DEFAULT_VERTICAL_OFFSET: f64 = 0.1;

    pub const fn standard() -> Self {
        Self {
            torso_min: 65.0,
            torso_max: 110.0,
            upper_back_min: 160.0,
            neck_min: 160.0,
            band_edges: BandEdges::Inclusive,
            vertical_offset: Self::DEFAULT_VERTICAL_OFFSET,
        }
    }

    pub const fn strict() -> Self {
        Self {
            torso_min: 60.0,
            torso_max: 105.0,
            upper_back_min: 165.0,
            neck_min: 165.0,
            band_edges: BandEdges::Inclusive,
            vertical_offset: Self::DEFAULT_VERTICAL_OFFSET,
        }
    }

    pub fn torso_within(&self, angle: f64) -> bool {
        match self.band_edges {
            BandEdges::Inclusive => self.torso_min <= angle && angle <= self.torso_max,
            BandEdges::Exclusive => self.torso_min < angle && angle < self.torso_max,
        }
    }

    pub fn check(&self, angles: &JointAngles) -> ChecksPassed {
        ChecksPassed {
            torso: self.torso_within(angles.torso),
            upper_back: angles.upper_back >= self.upper_back_min,
            neck: angles.neck >= self.neck_min,
        }
    }
}

/// Angle at `vertex` between the rays towards `a` and `b`, in degrees.
///
/// Returns `0.0` when either ray has zero length.
pub fn compute_angle(vertex: Point2, a: Point2, b: Point2) -> f64 {
    let (ax, ay) = (a.x - vertex.x, a.y - vertex.y);
    let (bx, by) = (b.x - vertex.x, b.y - vertex.y);

    let scale_a = ax.abs().max(ay.abs());
    let scale_b = bx.abs().max(by.abs());
    if scale_a == 0.0 || scale_b == 0.0 {
        return 0.0;
    }

    // Rescaled so the largest component is 1; tiny or huge rays neither
    // underflow nor overflow.
    let (ax, ay) = (ax / scale_a, ay / scale_a);
    let (bx, by) = (bx / scale_b, by / scale_b);
    let cross = ax * by - ay * bx;
    let dot = ax * bx + ay * by;
    cross.abs().atan2(dot).to_degrees()
}

pub fn joint_angles(landmarks: &PostureLandmarks, vertical_offset: f64) -> JointAngles {
    let ear = landmarks.left_ear;
    let virtual_point = Point2::new(ear.x, ear.y - vertical_offset);

    JointAngles {
        torso: compute_angle(landmarks.left_hip, landmarks.left_knee, landmarks.left_shoulder),
        upper_back: compute_angle(landmarks.left_shoulder, landmarks.left_hip, ear),
        neck: compute_angle(ear, landmarks.left_shoulder, virtual_point),
    }
}

pub fn classify_complete(landmarks: &PostureLandmarks, thresholds: &Thresholds) -> Verdict {
    let angles = joint_angles(landmarks, thresholds.vertical_offset);
    let checks = thresholds.check(&angles);

    match checks.feedback() {
        None => Verdict::Good { angles },
        Some(feedback) => Verdict::Slouching {
            angles,
            checks,
            feedback,
        },
    }
}

/// Classifies four optional joints; any missing joint gives `Verdict::Indeterminate`.
pub fn classify_posture(
    left_knee: Option<Point2>,
    left_hip: Option<Point2>,
    left_shoulder: Option<Point2>,
    left_ear: Option<Point2>,
    thresholds: &Thresholds,
) -> Verdict {
    classify_landmarks(
        &LandmarkSet {
            left_knee,
            left_hip,
            left_shoulder,
            left_ear,
        },
        thresholds,
    )
}

pub fn classify_landmarks(landmarks: &LandmarkSet, thresholds: &Thresholds) -> Verdict {
    match landmarks.complete() {
        Some(complete) => classify_complete(&complete, thresholds),
        None => Verdict::Indeterminate,
    }
}
