use crate::domain::model::{PostureStatus, SessionRecord, UserTotals};
use crate::domain::ports::{SessionStore, Storage};
use crate::utils::error::{PostureError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub const DEFAULT_LOG_FILE: &str = "posture_log.csv";

/// Session log kept as a single CSV file with columns
/// `id,username,timestamp,status,duration`.
pub struct CsvSessionStore<S: Storage> {
    storage: S,
    file_name: String,
    write_lock: Mutex<()>,
}

impl<S: Storage> CsvSessionStore<S> {
    pub fn new(storage: S, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    async fn read_log(&self) -> Result<Vec<u8>> {
        if !self.storage.exists(&self.file_name).await {
            return Ok(Vec::new());
        }
        self.storage.read_file(&self.file_name).await
    }

    async fn load(&self) -> Result<Vec<SessionRecord>> {
        let data = self.read_log().await?;
        parse_log(&data)
    }
}

fn parse_log(data: &[u8]) -> Result<Vec<SessionRecord>> {
    let mut reader = csv::Reader::from_reader(data);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        // Two writers creating the log at once both write a header line.
        if row.iter().eq(headers.iter()) {
            continue;
        }
        records.push(row.deserialize(Some(&headers))?);
    }
    Ok(records)
}

/// One CSV line for `record`, preceded by the header row for a new log.
fn encode_record(record: &SessionRecord, with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| PostureError::IoError(e.into_error()))
}

#[async_trait]
impl<S: Storage> SessionStore for CsvSessionStore<S> {
    async fn user_exists(&self, username: &str) -> Result<bool> {
        let records = self.load().await?;
        Ok(records.iter().any(|r| r.username == username))
    }

    async fn append(
        &self,
        username: &str,
        timestamp: &str,
        status: PostureStatus,
        duration_secs: f64,
    ) -> Result<SessionRecord> {
        let _guard = self.write_lock.lock().await;

        let data = self.read_log().await?;
        let records = parse_log(&data)?;
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = SessionRecord {
            id,
            username: username.to_string(),
            timestamp: timestamp.to_string(),
            status,
            duration_secs,
        };

        let line = encode_record(&record, data.is_empty())?;
        self.storage.append_file(&self.file_name, &line).await?;

        tracing::debug!(id, file = %self.file_name, "session record appended");
        Ok(record)
    }

    async fn all_records(&self) -> Result<Vec<SessionRecord>> {
        self.load().await
    }

    async fn user_totals(&self) -> Result<Vec<UserTotals>> {
        let records = self.load().await?;

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut totals: Vec<UserTotals> = Vec::new();
        for record in &records {
            let slot = *index.entry(record.username.as_str()).or_insert_with(|| {
                totals.push(UserTotals {
                    username: record.username.clone(),
                    good_secs: 0.0,
                    total_secs: 0.0,
                });
                totals.len() - 1
            });

            let entry = &mut totals[slot];
            entry.total_secs += record.duration_secs;
            if record.status == PostureStatus::Good {
                entry.good_secs += record.duration_secs;
            }
        }

        Ok(totals)
    }
}
