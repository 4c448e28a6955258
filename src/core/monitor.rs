use crate::core::capture::CaptureService;
use crate::core::classifier::{classify_landmarks, Thresholds};
use crate::core::report::{build_report, Report};
use crate::core::session::{IndeterminatePolicy, SessionTotals, SessionTracker, SlouchAlert};
use crate::domain::model::{PoseFrame, PostureStatus, SessionRecord, Verdict};
use crate::domain::ports::{SessionStore, SignalSink};
use crate::utils::error::{PostureError, Result};
use crate::utils::validation::validate_username;
use std::future::Future;
use std::time::{Duration, Instant};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2000);

/// Local wall-clock time in the session log's format.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub thresholds: Thresholds,
    pub indeterminate: IndeterminatePolicy,
    pub alert_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::standard(),
            indeterminate: IndeterminatePolicy::default(),
            alert_threshold: SlouchAlert::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub verdict: Verdict,
    pub status: Option<PostureStatus>,
    pub changed: bool,
    pub alert_raised: bool,
    pub persisted: Option<SessionRecord>,
}

pub struct PostureMonitor<S: SessionStore> {
    username: String,
    settings: MonitorSettings,
    store: S,
    signal: Option<Box<dyn SignalSink>>,
    tracker: SessionTracker,
    alert: SlouchAlert,
    last_sequence: Option<u64>,
}

impl<S: SessionStore> PostureMonitor<S> {
    pub fn new(username: impl Into<String>, settings: MonitorSettings, store: S) -> Self {
        Self {
            username: username.into(),
            alert: SlouchAlert::new(settings.alert_threshold),
            settings,
            store,
            signal: None,
            tracker: SessionTracker::new(),
            last_sequence: None,
        }
    }

    pub fn with_signal(mut self, signal: Box<dyn SignalSink>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session_totals(&self) -> SessionTotals {
        self.tracker.totals()
    }

    pub fn current_status(&self) -> Option<PostureStatus> {
        self.tracker.current()
    }

    /// Rejects empty usernames and names already present in the session log.
    pub async fn start(&self) -> Result<()> {
        validate_username("username", &self.username)?;
        if self.store.user_exists(&self.username).await? {
            return Err(PostureError::UsernameTaken {
                username: self.username.clone(),
            });
        }
        tracing::info!(user = %self.username, "Posture monitoring started");
        Ok(())
    }

    pub async fn tick(&mut self, frame: Option<&PoseFrame>, now: Instant, timestamp: &str) -> TickOutcome {
        let verdict = match frame {
            Some(PoseFrame {
                landmarks: Some(landmarks),
                ..
            }) => classify_landmarks(landmarks, &self.settings.thresholds),
            Some(_) => Verdict::Indeterminate,
            None => {
                tracing::warn!("No frame available for posture detection");
                Verdict::Indeterminate
            }
        };

        if let Some(angles) = verdict.angles() {
            tracing::debug!(
                "KHS: {:.1}°, HSE: {:.1}°, SEV: {:.1}°",
                angles.torso,
                angles.upper_back,
                angles.neck
            );
        }

        let frames = self.frames_since_last_tick(frame);
        let alert_raised = self.alert.record(verdict.status(), frames);
        if alert_raised {
            tracing::warn!(
                "BAD POSTURE ALERT! Slouching for {} consecutive frames",
                self.alert.streak()
            );
        }

        let Some(status) = self.settings.indeterminate.resolve(&verdict) else {
            self.tracker.hold(now);
            return TickOutcome {
                verdict,
                status: None,
                changed: false,
                alert_raised,
                persisted: None,
            };
        };

        let observation = self.tracker.observe(status, now);
        self.log_timers();

        let mut persisted = None;
        if observation.changed {
            match verdict.feedback() {
                Some(feedback) => tracing::info!("Status changed to: {} ({})", status, feedback.message()),
                None => tracing::info!("Status changed to: {}", status),
            }
            if let Some(segment) = observation.finished {
                persisted = self
                    .persist(timestamp, segment.status, segment.duration)
                    .await;
            }
        }

        if observation.send_signal {
            self.send_signal(status);
        }

        TickOutcome {
            verdict,
            status: Some(status),
            changed: observation.changed,
            alert_raised,
            persisted,
        }
    }

    /// Closes the session and persists the open segment.
    pub async fn finish(&mut self, now: Instant, timestamp: &str) -> Option<SessionRecord> {
        let segment = self.tracker.finish(now)?;
        let record = self
            .persist(timestamp, segment.status, segment.duration)
            .await;
        self.log_timers();
        record
    }

    pub async fn report(&self) -> Result<Report> {
        let totals = self.store.user_totals().await?;
        build_report(&self.username, &totals, &self.tracker.totals())
    }

    /// Ticks on `interval` until `shutdown` resolves or the capture source
    /// runs dry, then closes the session and stops the capture.
    pub async fn run<F>(&mut self, capture: &mut CaptureService, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let finished = capture.is_finished();
                    let frame = capture.latest();
                    self.tick(frame.as_ref(), Instant::now(), &timestamp_now()).await;
                    if finished {
                        tracing::info!("Landmark source finished");
                        break;
                    }
                }
            }
        }

        self.finish(Instant::now(), &timestamp_now()).await;
        capture.shutdown().await;
    }

    async fn persist(
        &self,
        timestamp: &str,
        status: PostureStatus,
        duration: Duration,
    ) -> Option<SessionRecord> {
        let duration_secs = duration.as_secs_f64();
        match self
            .store
            .append(&self.username, timestamp, status, duration_secs)
            .await
        {
            Ok(record) => {
                tracing::info!("Record inserted: {} for {:.1}s", status, duration_secs);
                Some(record)
            }
            Err(e) => {
                tracing::error!("DB insert error: {}", e);
                None
            }
        }
    }

    /// Camera frames published since the previous tick, taken from the frame
    /// sequence. Only the newest frame is classified, so it stands in for all
    /// of them.
    fn frames_since_last_tick(&mut self, frame: Option<&PoseFrame>) -> u32 {
        let Some(frame) = frame else {
            return 0;
        };
        let frames = match self.last_sequence.replace(frame.sequence) {
            None => frame.sequence.max(1),
            Some(last) if frame.sequence >= last => frame.sequence - last,
            // Source restarted its numbering.
            Some(_) => 1,
        };
        u32::try_from(frames).unwrap_or(u32::MAX)
    }

    fn send_signal(&mut self, status: PostureStatus) {
        if let Some(signal) = self.signal.as_mut() {
            if let Err(e) = signal.send(status) {
                tracing::error!("Serial command error: {}", e);
            }
        }
    }

    fn log_timers(&self) {
        let totals = self.tracker.totals();
        tracing::debug!(
            "Good Posture Time: {:.1}s, Slouch Time: {:.1}s, Good Posture Ratio: {:.1}%",
            totals.good.as_secs_f64(),
            totals.slouch.as_secs_f64(),
            totals.good_ratio()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Feedback, LandmarkSet, Point2, UserTotals};
    use crate::domain::ports::PoseSource;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct MemoryStore {
        records: Arc<Mutex<Vec<SessionRecord>>>,
        fail_appends: bool,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn user_exists(&self, username: &str) -> Result<bool> {
            Ok(self.records.lock().unwrap().iter().any(|r| r.username == username))
        }

        async fn append(
            &self,
            username: &str,
            timestamp: &str,
            status: PostureStatus,
            duration_secs: f64,
        ) -> Result<SessionRecord> {
            if self.fail_appends {
                return Err(PostureError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            let mut records = self.records.lock().unwrap();
            let record = SessionRecord {
                id: records.len() as u64 + 1,
                username: username.to_string(),
                timestamp: timestamp.to_string(),
                status,
                duration_secs,
            };
            records.push(record.clone());
            Ok(record)
        }

        async fn all_records(&self) -> Result<Vec<SessionRecord>> {
            Ok(self.records.lock().unwrap().clone())
        }

        async fn user_totals(&self) -> Result<Vec<UserTotals>> {
            let records = self.records.lock().unwrap();
            let mut totals: Vec<UserTotals> = Vec::new();
            for r in records.iter() {
                let pos = match totals.iter().position(|t| t.username == r.username) {
                    Some(pos) => pos,
                    None => {
                        totals.push(UserTotals {
                            username: r.username.clone(),
                            good_secs: 0.0,
                            total_secs: 0.0,
                        });
                        totals.len() - 1
                    }
                };
                totals[pos].total_secs += r.duration_secs;
                if r.status == PostureStatus::Good {
                    totals[pos].good_secs += r.duration_secs;
                }
            }
            Ok(totals)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSignal {
        sent: Arc<Mutex<Vec<PostureStatus>>>,
    }

    impl SignalSink for RecordingSignal {
        fn send(&mut self, status: PostureStatus) -> Result<()> {
            self.sent.lock().unwrap().push(status);
            Ok(())
        }
    }

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn good_frame() -> PoseFrame {
        PoseFrame {
            sequence: 1,
            landmarks: Some(LandmarkSet::new(p(0.8, 0.6), p(0.5, 0.6), p(0.5, 0.3), p(0.5, 0.1))),
        }
    }

    fn slumped_frame() -> PoseFrame {
        PoseFrame {
            sequence: 2,
            landmarks: Some(LandmarkSet::new(p(0.8, 0.6), p(0.5, 0.6), p(0.6, 0.35), p(0.75, 0.3))),
        }
    }

    fn empty_frame() -> PoseFrame {
        PoseFrame {
            sequence: 3,
            landmarks: None,
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test]
    async fn test_start_rejects_taken_username() {
        let store = MemoryStore::default();
        store
            .append("alice", "t", PostureStatus::Good, 1.0)
            .await
            .unwrap();

        let monitor = PostureMonitor::new("alice", MonitorSettings::default(), store.clone());
        assert!(matches!(
            monitor.start().await,
            Err(PostureError::UsernameTaken { .. })
        ));

        let monitor = PostureMonitor::new("  ", MonitorSettings::default(), store.clone());
        assert!(monitor.start().await.is_err());

        let monitor = PostureMonitor::new("bob", MonitorSettings::default(), store);
        assert!(monitor.start().await.is_ok());
    }

    #[tokio::test]
    async fn test_tick_sequence_persists_segments_and_signals() {
        let store = MemoryStore::default();
        let signal = RecordingSignal::default();
        let mut monitor = PostureMonitor::new("alice", MonitorSettings::default(), store.clone())
            .with_signal(Box::new(signal.clone()));
        let t0 = Instant::now();

        let outcome = monitor.tick(Some(&good_frame()), t0, "t0").await;
        assert_eq!(outcome.status, Some(PostureStatus::Good));
        assert!(outcome.changed);
        assert!(outcome.persisted.is_none());

        monitor.tick(Some(&good_frame()), t0 + secs(2), "t2").await;

        let outcome = monitor.tick(Some(&slumped_frame()), t0 + secs(4), "t4").await;
        assert_eq!(outcome.verdict.feedback(), Some(Feedback::FixShoulderPosition));
        let record = outcome.persisted.unwrap();
        assert_eq!(record.status, PostureStatus::Good);
        assert_eq!(record.duration_secs, 4.0);
        assert_eq!(record.timestamp, "t4");

        monitor.tick(Some(&slumped_frame()), t0 + secs(6), "t6").await;
        let last = monitor.finish(t0 + secs(7), "t7").await.unwrap();
        assert_eq!(last.status, PostureStatus::Slouch);
        assert_eq!(last.duration_secs, 3.0);

        assert_eq!(
            *signal.sent.lock().unwrap(),
            vec![PostureStatus::Good, PostureStatus::Slouch, PostureStatus::Slouch]
        );
        assert_eq!(monitor.session_totals().good, secs(4));
        assert_eq!(monitor.session_totals().slouch, secs(3));
        assert_eq!(store.all_records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_skip_policy_holds_previous_status() {
        let mut monitor = PostureMonitor::new("alice", MonitorSettings::default(), MemoryStore::default());
        let t0 = Instant::now();

        monitor.tick(Some(&good_frame()), t0, "t0").await;
        let outcome = monitor.tick(Some(&empty_frame()), t0 + secs(2), "t2").await;
        assert_eq!(outcome.verdict, Verdict::Indeterminate);
        assert_eq!(outcome.status, None);

        let outcome = monitor.tick(None, t0 + secs(4), "t4").await;
        assert_eq!(outcome.status, None);

        assert_eq!(monitor.current_status(), Some(PostureStatus::Good));
        assert_eq!(monitor.session_totals().good, secs(4));
    }

    #[tokio::test]
    async fn test_slouch_policy_counts_missing_landmarks() {
        let settings = MonitorSettings {
            indeterminate: IndeterminatePolicy::Slouch,
            ..MonitorSettings::default()
        };
        let mut monitor = PostureMonitor::new("alice", settings, MemoryStore::default());
        let outcome = monitor.tick(Some(&empty_frame()), Instant::now(), "t0").await;
        assert_eq!(outcome.status, Some(PostureStatus::Slouch));
    }

    fn slumped_at(sequence: u64) -> PoseFrame {
        PoseFrame {
            sequence,
            ..slumped_frame()
        }
    }

    #[tokio::test]
    async fn test_alert_raised_after_threshold() {
        let settings = MonitorSettings {
            alert_threshold: 2,
            ..MonitorSettings::default()
        };
        let mut monitor = PostureMonitor::new("alice", settings, MemoryStore::default());
        let t0 = Instant::now();

        let raised: Vec<bool> = {
            let mut out = Vec::new();
            for i in 0..4 {
                let frame = slumped_at(i + 1);
                out.push(monitor.tick(Some(&frame), t0 + secs(i), "t").await.alert_raised);
            }
            out
        };
        assert_eq!(raised, vec![false, false, true, false]);
    }

    #[tokio::test]
    async fn test_alert_counts_camera_frames_between_ticks() {
        let mut monitor = PostureMonitor::new("alice", MonitorSettings::default(), MemoryStore::default());
        let t0 = Instant::now();

        // 30 fps with a two second tick: 60 frames per tick.
        let outcome = monitor.tick(Some(&slumped_at(60)), t0, "t0").await;
        assert!(!outcome.alert_raised);
        let outcome = monitor.tick(Some(&slumped_at(120)), t0 + secs(2), "t2").await;
        assert!(outcome.alert_raised);
    }

    #[tokio::test]
    async fn test_repeated_frame_is_not_counted_twice() {
        let settings = MonitorSettings {
            alert_threshold: 2,
            ..MonitorSettings::default()
        };
        let mut monitor = PostureMonitor::new("alice", settings, MemoryStore::default());
        let t0 = Instant::now();

        for i in 0..5 {
            let outcome = monitor.tick(Some(&slumped_at(1)), t0 + secs(i), "t").await;
            assert!(!outcome.alert_raised);
        }
        monitor.tick(None, t0 + secs(5), "t").await;

        let outcome = monitor.tick(Some(&slumped_at(3)), t0 + secs(6), "t").await;
        assert!(outcome.alert_raised);
    }

    struct LateFrameSource {
        delivered: bool,
    }

    impl PoseSource for LateFrameSource {
        fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
            if self.delivered {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(20));
            self.delivered = true;
            Ok(Some(slumped_at(1)))
        }
    }

    #[tokio::test]
    async fn test_run_classifies_the_final_frame() {
        let store = MemoryStore::default();
        let mut monitor = PostureMonitor::new("alice", MonitorSettings::default(), store.clone());
        let mut capture = CaptureService::start(LateFrameSource { delivered: false }, Duration::from_millis(1)).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            monitor.run(&mut capture, Duration::from_millis(1), std::future::pending()),
        )
        .await
        .unwrap();

        assert!(!capture.is_running());
        let records = store.all_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, PostureStatus::Slouch);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_monitoring() {
        let store = MemoryStore {
            fail_appends: true,
            ..MemoryStore::default()
        };
        let mut monitor = PostureMonitor::new("alice", MonitorSettings::default(), store);
        let t0 = Instant::now();

        monitor.tick(Some(&good_frame()), t0, "t0").await;
        let outcome = monitor.tick(Some(&slumped_frame()), t0 + secs(2), "t2").await;
        assert!(outcome.changed);
        assert!(outcome.persisted.is_none());
        assert_eq!(monitor.current_status(), Some(PostureStatus::Slouch));
    }

    #[tokio::test]
    async fn test_report_uses_store_and_session() {
        let store = MemoryStore::default();
        store.append("bob", "t", PostureStatus::Good, 10.0).await.unwrap();
        store.append("bob", "t", PostureStatus::Slouch, 10.0).await.unwrap();

        let mut monitor = PostureMonitor::new("alice", MonitorSettings::default(), store);
        let t0 = Instant::now();
        monitor.tick(Some(&good_frame()), t0, "t0").await;
        monitor.finish(t0 + secs(10), "t10").await;

        let report = monitor.report().await.unwrap();
        assert_eq!(report.rank, 1);
        assert_eq!(report.total_users, 2);
        assert_eq!(report.session_ratio, 100.0);
        assert_eq!(report.overall_ratio, 100.0);
    }
}
