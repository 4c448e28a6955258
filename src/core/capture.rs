//! Producer/consumer handoff between a pose source and the monitor.
//!
//! The source runs on its own thread and only the newest frame is kept;
//! consumers that fall behind skip frames rather than queueing them.

use crate::domain::model::PoseFrame;
use crate::domain::ports::PoseSource;
use crate::utils::error::{PostureError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
struct Shared {
    latest: Mutex<Option<PoseFrame>>,
    running: AtomicBool,
    finished: AtomicBool,
    published: AtomicU64,
}

pub struct CaptureService {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureService {
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

    pub fn start<S>(source: S, retry_delay: Duration) -> Result<Self>
    where
        S: PoseSource + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::SeqCst);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("pose-capture".to_string())
            .spawn(move || capture_loop(source, worker_shared, retry_delay))
            .map_err(|e| PostureError::CaptureError {
                message: format!("failed to spawn capture thread: {}", e),
            })?;

        tracing::info!("Camera thread started");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Clone of the newest frame, if any has arrived yet.
    pub fn latest(&self) -> Option<PoseFrame> {
        match self.shared.latest.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn frames_published(&self) -> u64 {
        self.shared.published.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The source reported end of stream.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// Stops the worker and blocks until it exits.
    pub fn stop(&mut self) {
        if let Some(worker) = self.signal_stop() {
            report_join(worker.join());
        }
    }

    /// Like [`CaptureService::stop`], but joins the worker on tokio's blocking
    /// pool so async callers keep their executor thread free.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.signal_stop() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(joined) => report_join(joined),
                Err(e) => tracing::error!("Capture join task failed: {}", e),
            }
        }
    }

    fn signal_stop(&mut self) -> Option<JoinHandle<()>> {
        self.shared.running.store(false, Ordering::SeqCst);
        self.worker.take()
    }
}

fn report_join(joined: thread::Result<()>) {
    if joined.is_err() {
        tracing::error!("Capture thread panicked");
    } else {
        tracing::info!("Camera thread stopped");
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<S: PoseSource>(mut source: S, shared: Arc<Shared>, retry_delay: Duration) {
    while shared.running.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(Some(frame)) => {
                tracing::trace!(sequence = frame.sequence, "frame captured");
                match shared.latest.lock() {
                    Ok(mut guard) => *guard = Some(frame),
                    Err(poisoned) => *poisoned.into_inner() = Some(frame),
                }
                shared.published.fetch_add(1, Ordering::SeqCst);
            }
            Ok(None) => {
                tracing::info!("Pose source exhausted");
                shared.finished.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => {
                tracing::warn!("Could not read frame from pose source: {}", e);
                thread::sleep(retry_delay);
            }
        }
    }
    shared.running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LandmarkSet, Point2};
    use std::collections::VecDeque;
    use std::time::Instant;

    struct ScriptedSource {
        script: VecDeque<Result<Option<PoseFrame>>>,
    }

    impl PoseSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    struct EndlessSource {
        sequence: u64,
    }

    impl PoseSource for EndlessSource {
        fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
            self.sequence += 1;
            thread::sleep(Duration::from_millis(1));
            Ok(Some(PoseFrame {
                sequence: self.sequence,
                landmarks: None,
            }))
        }
    }

    fn frame(sequence: u64) -> PoseFrame {
        let p = Point2::new(0.5, 0.5);
        PoseFrame {
            sequence,
            landmarks: Some(LandmarkSet::new(p, p, p, p)),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for capture thread");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_latest_frame_wins_and_source_finishes() {
        let source = ScriptedSource {
            script: VecDeque::from(vec![
                Ok(Some(frame(1))),
                Err(PostureError::CaptureError {
                    message: "glitch".to_string(),
                }),
                Ok(Some(frame(2))),
                Ok(Some(frame(3))),
            ]),
        };

        let mut capture = CaptureService::start(source, Duration::from_millis(1)).unwrap();
        wait_until(|| capture.is_finished());

        assert_eq!(capture.latest(), Some(frame(3)));
        assert_eq!(capture.frames_published(), 3);
        assert!(!capture.is_running());
        capture.stop();
    }

    #[test]
    fn test_stop_joins_endless_source() {
        let mut capture =
            CaptureService::start(EndlessSource { sequence: 0 }, Duration::from_millis(1)).unwrap();
        wait_until(|| capture.frames_published() > 2);

        capture.stop();
        assert!(!capture.is_running());
        assert!(!capture.is_finished());

        let seen = capture.frames_published();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(capture.frames_published(), seen);
        assert!(capture.latest().unwrap().sequence >= 3);
    }

    #[tokio::test]
    async fn test_shutdown_joins_without_blocking_the_runtime() {
        let mut capture =
            CaptureService::start(EndlessSource { sequence: 0 }, Duration::from_millis(1)).unwrap();
        while capture.frames_published() < 3 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        capture.shutdown().await;
        assert!(!capture.is_running());
        assert!(!capture.is_finished());

        // A second stop is a no-op.
        capture.shutdown().await;
        capture.stop();
    }
}
