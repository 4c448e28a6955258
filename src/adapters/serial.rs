use crate::domain::model::PostureStatus;
use crate::domain::ports::SignalSink;
use crate::utils::error::{PostureError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const DEVICE_PREFIXES: [&str; 2] = ["ttyUSB", "ttyACM"];

/// Wire command for a status: `BP` (bad posture) or `GP` (good posture).
pub fn command_for(status: PostureStatus) -> &'static str {
    match status {
        PostureStatus::Slouch => "BP\n",
        PostureStatus::Good => "GP\n",
    }
}

/// Lists USB serial device nodes under `dev_dir`, sorted by name.
pub fn available_ports(dev_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dev_dir) else {
        return Vec::new();
    };

    let mut ports: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            DEVICE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        })
        .map(|entry| entry.path())
        .collect();
    ports.sort();
    ports
}

/// Posture light driven over a serial line.
///
/// The device node is opened write-only; line settings (9600 baud for the
/// stock firmware) are expected to be applied outside the process.
pub struct SerialSignal<W: Write + Send = fs::File> {
    port: String,
    writer: W,
}

impl SerialSignal<fs::File> {
    pub fn open(port: impl AsRef<Path>) -> Result<Self> {
        let path = port.as_ref();
        let writer = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| PostureError::SerialError {
                port: path.display().to_string(),
                message: e.to_string(),
            })?;

        tracing::info!("Using serial port: {}", path.display());
        Ok(Self::from_writer(path.display().to_string(), writer))
    }
}

impl<W: Write + Send> SerialSignal<W> {
    pub fn from_writer(port: impl Into<String>, writer: W) -> Self {
        Self {
            port: port.into(),
            writer,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> SignalSink for SerialSignal<W> {
    fn send(&mut self, status: PostureStatus) -> Result<()> {
        let command = command_for(status);
        self.writer
            .write_all(command.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| PostureError::SerialError {
                port: self.port.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Sent command: {}", command.trim_end());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_commands_written_per_status() {
        let mut signal = SerialSignal::from_writer("mem", Vec::new());
        signal.send(PostureStatus::Slouch).unwrap();
        signal.send(PostureStatus::Good).unwrap();
        assert_eq!(signal.into_inner(), b"BP\nGP\n");
    }

    #[test]
    fn test_write_failure_is_serial_error() {
        let mut signal = SerialSignal::from_writer("/dev/ttyUSB9", BrokenPipe);
        let err = signal.send(PostureStatus::Good).unwrap_err();
        assert!(matches!(err, PostureError::SerialError { ref port, .. } if port == "/dev/ttyUSB9"));
    }

    #[test]
    fn test_available_ports_filters_device_names() {
        let dev = TempDir::new().unwrap();
        for name in ["ttyUSB1", "ttyACM0", "ttyS0", "null", "ttyUSB0"] {
            fs::write(dev.path().join(name), b"").unwrap();
        }

        let ports = available_ports(dev.path());
        let names: Vec<String> = ports
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ttyACM0", "ttyUSB0", "ttyUSB1"]);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let dev = TempDir::new().unwrap();
        let result = SerialSignal::open(dev.path().join("nope").join("ttyUSB0"));
        assert!(matches!(result, Err(PostureError::SerialError { .. })));
    }

    #[test]
    fn test_open_writes_to_device_node() {
        let dev = TempDir::new().unwrap();
        let node = dev.path().join("ttyACM0");
        fs::write(&node, b"").unwrap();

        let mut signal = SerialSignal::open(&node).unwrap();
        signal.send(PostureStatus::Slouch).unwrap();
        drop(signal);
        assert_eq!(fs::read(&node).unwrap(), b"BP\n");
    }
}
