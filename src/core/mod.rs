pub mod capture;
pub mod classifier;
pub mod monitor;
pub mod report;
pub mod session;

pub use crate::domain::model::{
    Feedback, JointAngles, LandmarkSet, Point2, PoseFrame, PostureStatus, SessionRecord, UserTotals, Verdict,
};
pub use crate::domain::ports::{PoseSource, SessionStore, SignalSink, Storage};
pub use crate::utils::error::Result;
