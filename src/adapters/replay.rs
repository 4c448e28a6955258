use crate::domain::model::{LandmarkSet, Point2, PoseFrame};
use crate::domain::ports::PoseSource;
use crate::utils::error::Result;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// One recorded detection. Empty cells mean the joint was not detected.
#[derive(Debug, Deserialize)]
struct LandmarkRow {
    knee_x: Option<f64>,
    knee_y: Option<f64>,
    hip_x: Option<f64>,
    hip_y: Option<f64>,
    shoulder_x: Option<f64>,
    shoulder_y: Option<f64>,
    ear_x: Option<f64>,
    ear_y: Option<f64>,
}

fn point(x: Option<f64>, y: Option<f64>) -> Option<Point2> {
    Some(Point2::new(x?, y?)).filter(Point2::is_finite)
}

impl LandmarkRow {
    fn into_landmarks(self) -> Option<LandmarkSet> {
        let set = LandmarkSet {
            left_knee: point(self.knee_x, self.knee_y),
            left_hip: point(self.hip_x, self.hip_y),
            left_shoulder: point(self.shoulder_x, self.shoulder_y),
            left_ear: point(self.ear_x, self.ear_y),
        };
        (!set.is_empty()).then_some(set)
    }
}

/// Plays back landmark detections recorded as CSV, standing in for a camera
/// and detector.
pub struct ReplaySource {
    frames: VecDeque<PoseFrame>,
    frame_interval: Option<Duration>,
    started: bool,
}

impl ReplaySource {
    pub fn from_path(path: impl AsRef<Path>, frame_interval: Option<Duration>) -> Result<Self> {
        let reader = csv::Reader::from_path(path.as_ref())?;
        Self::from_csv(reader, frame_interval)
    }

    pub fn from_reader<R: Read>(reader: R, frame_interval: Option<Duration>) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(reader), frame_interval)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, frame_interval: Option<Duration>) -> Result<Self> {
        let mut frames = VecDeque::new();
        for (idx, row) in reader.deserialize::<LandmarkRow>().enumerate() {
            frames.push_back(PoseFrame {
                sequence: idx as u64 + 1,
                landmarks: row?.into_landmarks(),
            });
        }

        tracing::debug!("Loaded {} recorded frames", frames.len());
        Ok(Self {
            frames,
            frame_interval,
            started: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl PoseSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        if let Some(interval) = self.frame_interval.filter(|_| self.started) {
            thread::sleep(interval);
        }
        self.started = true;
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = "\
knee_x,knee_y,hip_x,hip_y,shoulder_x,shoulder_y,ear_x,ear_y
0.8,0.6,0.5,0.6,0.5,0.3,0.5,0.1
0.8,0.6,,,0.5,0.3,0.5,0.1
,,,,,,,
";

    #[test]
    fn test_replays_rows_in_order() {
        let mut source = ReplaySource::from_reader(RECORDING.as_bytes(), None).unwrap();
        assert_eq!(source.remaining(), 3);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        assert!(first.landmarks.unwrap().complete().is_some());

        let second = source.next_frame().unwrap().unwrap();
        let partial = second.landmarks.unwrap();
        assert!(partial.left_hip.is_none());
        assert!(partial.left_knee.is_some());

        let third = source.next_frame().unwrap().unwrap();
        assert_eq!(third.landmarks, None);

        assert_eq!(source.next_frame().unwrap(), None);
    }

    #[test]
    fn test_half_missing_coordinate_drops_joint() {
        let data = "knee_x,knee_y,hip_x,hip_y,shoulder_x,shoulder_y,ear_x,ear_y\n0.8,,0.5,0.6,0.5,0.3,0.5,0.1\n";
        let mut source = ReplaySource::from_reader(data.as_bytes(), None).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert!(frame.landmarks.unwrap().left_knee.is_none());
    }

    #[test]
    fn test_bad_number_is_csv_error() {
        let data = "knee_x,knee_y,hip_x,hip_y,shoulder_x,shoulder_y,ear_x,ear_y\nabc,0.6,0.5,0.6,0.5,0.3,0.5,0.1\n";
        assert!(ReplaySource::from_reader(data.as_bytes(), None).is_err());
    }
}
