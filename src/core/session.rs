use crate::domain::model::{PostureStatus, Verdict};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How a frame without a verdict feeds into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminatePolicy {
    /// Keep the previous status and keep crediting time to it.
    #[default]
    Skip,
    Slouch,
    Good,
}

impl IndeterminatePolicy {
    pub fn resolve(&self, verdict: &Verdict) -> Option<PostureStatus> {
        verdict.status().or(match self {
            IndeterminatePolicy::Skip => None,
            IndeterminatePolicy::Slouch => Some(PostureStatus::Slouch),
            IndeterminatePolicy::Good => Some(PostureStatus::Good),
        })
    }
}

/// A maximal run of one status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub status: PostureStatus,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub previous: Option<PostureStatus>,
    pub status: PostureStatus,
    pub changed: bool,
    /// Segment closed by this observation, if the status changed.
    pub finished: Option<Segment>,
    pub send_signal: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub good: Duration,
    pub slouch: Duration,
}

impl SessionTotals {
    pub fn total(&self) -> Duration {
        self.good + self.slouch
    }

    /// Share of good posture time in percent, `0.0` before any time has passed.
    pub fn good_ratio(&self) -> f64 {
        let total = self.total().as_secs_f64();
        if total > 0.0 {
            self.good.as_secs_f64() / total * 100.0
        } else {
            0.0
        }
    }

    fn credit(&mut self, status: PostureStatus, elapsed: Duration) {
        match status {
            PostureStatus::Good => self.good += elapsed,
            PostureStatus::Slouch => self.slouch += elapsed,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    current: Option<PostureStatus>,
    changed_at: Option<Instant>,
    last_observed: Option<Instant>,
    totals: SessionTotals,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<PostureStatus> {
        self.current
    }

    pub fn totals(&self) -> SessionTotals {
        self.totals
    }

    pub fn observe(&mut self, status: PostureStatus, now: Instant) -> Observation {
        self.hold(now);

        let previous = self.current;
        let changed = previous != Some(status);
        let mut finished = None;

        if changed {
            if let (Some(prev), Some(since)) = (previous, self.changed_at) {
                finished = Some(Segment {
                    status: prev,
                    duration: now.saturating_duration_since(since),
                });
            }
            self.current = Some(status);
            self.changed_at = Some(now);
        }

        Observation {
            previous,
            status,
            changed,
            finished,
            send_signal: changed || status == PostureStatus::Slouch,
        }
    }

    /// Credits time since the last observation to the current status.
    pub fn hold(&mut self, now: Instant) {
        if let (Some(status), Some(last)) = (self.current, self.last_observed) {
            self.totals.credit(status, now.saturating_duration_since(last));
        }
        self.last_observed = Some(now);
    }

    /// Closes the open segment, if any.
    pub fn finish(&mut self, now: Instant) -> Option<Segment> {
        self.hold(now);
        let status = self.current.take()?;
        let since = self.changed_at.take()?;
        Some(Segment {
            status,
            duration: now.saturating_duration_since(since),
        })
    }
}

/// Counts consecutive slouching camera frames and raises an alert past a
/// threshold.
#[derive(Debug)]
pub struct SlouchAlert {
    threshold: u32,
    streak: u32,
    raised: bool,
}

impl SlouchAlert {
    pub const DEFAULT_THRESHOLD: u32 = 100;

    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            streak: 0,
            raised: false,
        }
    }

    /// Credits `frames` frames of `status` to the streak. Returns `true` only
    /// on the observation that raises the alert.
    pub fn record(&mut self, status: Option<PostureStatus>, frames: u32) -> bool {
        match status {
            Some(PostureStatus::Slouch) => {
                self.streak = self.streak.saturating_add(frames);
                if self.streak > self.threshold && !self.raised {
                    self.raised = true;
                    return true;
                }
            }
            Some(PostureStatus::Good) => {
                self.streak = 0;
                self.raised = false;
            }
            None => {}
        }
        false
    }

    pub fn is_active(&self) -> bool {
        self.raised
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

impl Default for SlouchAlert {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
