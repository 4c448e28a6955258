use crate::domain::model::{PoseFrame, PostureStatus, SessionRecord, UserTotals};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    /// Appends `data` to the end of `path`, creating the file if needed.
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Producer side of the capture handoff: a camera plus landmark detector.
pub trait PoseSource {
    /// `Ok(None)` means the source is exhausted and will not produce more frames.
    fn next_frame(&mut self) -> Result<Option<PoseFrame>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn user_exists(&self, username: &str) -> Result<bool>;
    /// Persists a segment and returns the stored record with its assigned id.
    async fn append(
        &self,
        username: &str,
        timestamp: &str,
        status: PostureStatus,
        duration_secs: f64,
    ) -> Result<SessionRecord>;
    async fn all_records(&self) -> Result<Vec<SessionRecord>>;
    async fn user_totals(&self) -> Result<Vec<UserTotals>>;
}

/// Outbound posture indicator, e.g. a microcontroller-driven light.
pub trait SignalSink: Send {
    fn send(&mut self, status: PostureStatus) -> Result<()>;
}
