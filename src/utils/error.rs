use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostureError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Username '{username}' already exists")]
    UsernameTaken { username: String },

    #[error("Serial port error on {port}: {message}")]
    SerialError { port: String, message: String },

    #[error("Capture error: {message}")]
    CaptureError { message: String },

    #[error("Report error: {message}")]
    ReportError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    Device,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PostureError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::CsvError(_) | Self::SerializationError(_) => {
                ErrorCategory::Storage
            }
            Self::SerialError { .. } | Self::CaptureError { .. } => ErrorCategory::Device,
            Self::UsernameTaken { .. } | Self::ReportError { .. } => ErrorCategory::Session,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ReportError { .. } => ErrorSeverity::Low,
            Self::UsernameTaken { .. } | Self::SerialError { .. } => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::CaptureError { .. } => ErrorSeverity::High,
            Self::IoError(_) | Self::CsvError(_) | Self::SerializationError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::IoError(_) => "Check that the data directory exists and is writable",
            Self::CsvError(_) => "The session log may be corrupted; move it aside to start a new one",
            Self::SerializationError(_) => "Report the problem together with the session log",
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Check the TOML configuration file syntax"
            }
            Self::MissingConfigError { .. } => "Add the missing field to the config file or pass it as a flag",
            Self::InvalidConfigValueError { .. } => "Correct the value and try again",
            Self::UsernameTaken { .. } => "Please choose a different username",
            Self::SerialError { .. } => "Check the device is plugged in, or run without --serial-port",
            Self::CaptureError { .. } => "Check the landmark source is available",
            Self::ReportError { .. } => "Record a session before generating a report",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::UsernameTaken { username } => {
                format!("This username already exists: {}", username)
            }
            Self::ReportError { message } => message.clone(),
            Self::MissingConfigError { field } => format!("Missing setting: {}", field),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PostureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_taken_is_session_error() {
        let err = PostureError::UsernameTaken {
            username: "alice".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Session);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().contains("alice"));
    }

    #[test]
    fn test_io_error_is_critical() {
        let err: PostureError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
