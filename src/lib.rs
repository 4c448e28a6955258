pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::MonitorConfig;

pub use crate::adapters::{CsvSessionStore, LocalStorage, ReplaySource, SerialSignal};
pub use crate::core::capture::CaptureService;
pub use crate::core::classifier::{classify_landmarks, classify_posture, compute_angle, Thresholds};
pub use crate::core::monitor::{MonitorSettings, PostureMonitor};
pub use crate::utils::error::{PostureError, Result};
