use crate::core::session::SessionTotals;
use crate::domain::model::UserTotals;
use crate::utils::error::{PostureError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub good_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub username: String,
    pub session_good_secs: f64,
    pub session_slouch_secs: f64,
    pub session_ratio: f64,
    pub overall_ratio: f64,
    pub rank: usize,
    pub total_users: usize,
    /// Best performer is always at 100.
    pub percentile: f64,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Orders users by good-posture ratio, best first. Ties go to the
/// alphabetically first username.
pub fn rank_users(totals: &[UserTotals]) -> Vec<LeaderboardEntry> {
    let mut scored: Vec<(&str, f64)> = totals
        .iter()
        .map(|t| (t.username.as_str(), t.good_ratio()))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(idx, (username, good_ratio))| LeaderboardEntry {
            rank: idx + 1,
            username: username.to_string(),
            good_ratio,
        })
        .collect()
}

pub fn build_report(username: &str, totals: &[UserTotals], session: &SessionTotals) -> Result<Report> {
    if totals.is_empty() {
        return Err(PostureError::ReportError {
            message: "No data available for report.".to_string(),
        });
    }

    let leaderboard = rank_users(totals);
    let entry = leaderboard
        .iter()
        .find(|e| e.username == username)
        .ok_or_else(|| PostureError::ReportError {
            message: "No data for current user.".to_string(),
        })?;

    let total_users = leaderboard.len();
    let rank = entry.rank;
    let percentile = (total_users - rank + 1) as f64 / total_users as f64 * 100.0;

    Ok(Report {
        username: username.to_string(),
        session_good_secs: session.good.as_secs_f64(),
        session_slouch_secs: session.slouch.as_secs_f64(),
        session_ratio: session.good_ratio(),
        overall_ratio: entry.good_ratio,
        rank,
        total_users,
        percentile,
        leaderboard,
    })
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "User: {}", self.username)?;
        writeln!(f)?;
        writeln!(f, "Current Session Stats:")?;
        writeln!(f, "  Good Posture Time: {:.1}s", self.session_good_secs)?;
        writeln!(f, "  Slouch Time: {:.1}s", self.session_slouch_secs)?;
        writeln!(f, "  Session Ratio: {:.2}%", self.session_ratio)?;
        writeln!(f)?;
        writeln!(f, "Overall Stats:")?;
        writeln!(f, "  Overall Good Posture Ratio: {:.2}%", self.overall_ratio)?;
        writeln!(f, "  Your ranking percentile: {:.2}%", self.percentile)?;
        writeln!(f, "  Rank: {} of {}", self.rank, self.total_users)?;
        writeln!(f)?;
        writeln!(f, "Leaderboard:")?;
        for entry in &self.leaderboard {
            writeln!(
                f,
                "  {:>3}. {:<20} {:>6.2}%",
                entry.rank, entry.username, entry.good_ratio
            )?;
        }
        writeln!(f)?;
        write!(
            f,
            "(Best performer always gets 100%, and rankings are relative among all users.)"
        )
    }
}
