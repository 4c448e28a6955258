use crate::config::toml_config::MonitorConfig;
use crate::core::classifier::ThresholdPreset;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "posture-monitor")]
#[command(about = "Posture monitor with session logging and a serial posture light")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Name to log this session under; must not exist in the session log yet
    #[arg(short, long)]
    pub username: Option<String>,

    /// CSV recording of landmark detections to replay
    #[arg(long)]
    pub landmarks: Option<String>,

    /// Delay between replayed frames
    #[arg(long)]
    pub frame_interval_ms: Option<u64>,

    /// Serial device driving the posture light, e.g. /dev/ttyUSB0
    #[arg(long)]
    pub serial_port: Option<String>,

    /// Print available serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Directory holding the session log
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Time between posture checks
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Threshold preset to classify with
    #[arg(long, value_enum)]
    pub preset: Option<ThresholdPreset>,

    /// Print the leaderboard report when the session ends
    #[arg(long)]
    pub report: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// Loads the config file, if any, and layers command line values on top.
    pub fn resolve(&self) -> crate::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_file(path)?,
            None => MonitorConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_to(&self, config: &mut MonitorConfig) {
        if let Some(username) = &self.username {
            config.monitor.username = Some(username.trim().to_string());
        }
        if let Some(landmarks) = &self.landmarks {
            config.source.landmarks = Some(landmarks.clone());
        }
        if let Some(ms) = self.frame_interval_ms {
            config.source.frame_interval_ms = Some(ms);
        }
        if let Some(port) = &self.serial_port {
            config.serial.port = Some(port.clone());
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = Some(dir.clone());
        }
        if let Some(ms) = self.interval_ms {
            config.monitor.interval_ms = Some(ms);
        }
        if let Some(preset) = self.preset {
            config.thresholds.preset = Some(preset);
        }
    }
}
