use crate::adapters::csv_store::DEFAULT_LOG_FILE;
use crate::core::classifier::{BandEdges, ThresholdPreset, Thresholds};
use crate::core::monitor::{MonitorSettings, DEFAULT_TICK_INTERVAL};
use crate::core::session::{IndeterminatePolicy, SlouchAlert};
use crate::utils::error::{PostureError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub monitor: MonitorSection,
    pub thresholds: ThresholdConfig,
    pub storage: StorageConfig,
    pub serial: SerialConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSection {
    pub username: Option<String>,
    pub interval_ms: Option<u64>,
    pub alert_threshold: Option<u32>,
    pub indeterminate: Option<IndeterminatePolicy>,
}

/// A preset plus optional per-value overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub preset: Option<ThresholdPreset>,
    pub band_edges: Option<BandEdges>,
    pub torso_min: Option<f64>,
    pub torso_max: Option<f64>,
    pub upper_back_min: Option<f64>,
    pub neck_min: Option<f64>,
    pub vertical_offset: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// CSV recording of landmark detections to replay.
    pub landmarks: Option<String>,
    pub frame_interval_ms: Option<u64>,
}

impl ThresholdConfig {
    pub fn resolve(&self) -> Thresholds {
        let base = self.preset.unwrap_or_default().thresholds();
        Thresholds {
            torso_min: self.torso_min.unwrap_or(base.torso_min),
            torso_max: self.torso_max.unwrap_or(base.torso_max),
            upper_back_min: self.upper_back_min.unwrap_or(base.upper_back_min),
            neck_min: self.neck_min.unwrap_or(base.neck_min),
            band_edges: self.band_edges.unwrap_or(base.band_edges),
            vertical_offset: self.vertical_offset.unwrap_or(base.vertical_offset),
        }
    }
}

impl MonitorConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PostureError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PostureError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${POSTURE_USER})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PostureError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(username) = &self.monitor.username {
            validation::validate_username("monitor.username", username)?;
        }
        if let Some(interval) = self.monitor.interval_ms {
            validation::validate_positive_number("monitor.interval_ms", interval, 1)?;
        }

        let t = self.thresholds();
        validation::validate_range("thresholds.torso_min", t.torso_min, 0.0, 180.0)?;
        validation::validate_range("thresholds.torso_max", t.torso_max, 0.0, 180.0)?;
        validation::validate_range("thresholds.upper_back_min", t.upper_back_min, 0.0, 180.0)?;
        validation::validate_range("thresholds.neck_min", t.neck_min, 0.0, 180.0)?;
        if t.torso_min > t.torso_max {
            return Err(PostureError::InvalidConfigValueError {
                field: "thresholds.torso_min".to_string(),
                value: t.torso_min.to_string(),
                reason: format!("Must not exceed thresholds.torso_max ({})", t.torso_max),
            });
        }
        if !(t.vertical_offset.is_finite() && t.vertical_offset > 0.0) {
            return Err(PostureError::InvalidConfigValueError {
                field: "thresholds.vertical_offset".to_string(),
                value: t.vertical_offset.to_string(),
                reason: "Must be a positive number".to_string(),
            });
        }

        if let Some(dir) = &self.storage.data_dir {
            validation::validate_path("storage.data_dir", dir)?;
        }
        if let Some(name) = &self.storage.file_name {
            validation::validate_path("storage.file_name", name)?;
        }
        if let Some(port) = &self.serial.port {
            validation::validate_path("serial.port", port)?;
        }
        if let Some(landmarks) = &self.source.landmarks {
            validation::validate_path("source.landmarks", landmarks)?;
        }

        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds.resolve()
    }

    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            thresholds: self.thresholds(),
            indeterminate: self.monitor.indeterminate.unwrap_or_default(),
            alert_threshold: self
                .monitor
                .alert_threshold
                .unwrap_or(SlouchAlert::DEFAULT_THRESHOLD),
        }
    }

    pub fn interval(&self) -> Duration {
        self.monitor
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TICK_INTERVAL)
    }

    pub fn username(&self) -> Result<&str> {
        validation::validate_required_field("monitor.username", &self.monitor.username).map(String::as_str)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(self.storage.data_dir.as_deref().unwrap_or("."))
    }

    pub fn log_file_name(&self) -> &str {
        self.storage.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE)
    }

    pub fn serial_port(&self) -> Option<&str> {
        self.serial.port.as_deref()
    }

    pub fn landmarks_path(&self) -> Result<&str> {
        validation::validate_required_field("source.landmarks", &self.source.landmarks).map(String::as_str)
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.source.frame_interval_ms.map(Duration::from_millis)
    }
}

impl Validate for MonitorConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
