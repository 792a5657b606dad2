//! History aggregation and retention.

use chrono::{DateTime, Duration, Utc};

use super::model::{SessionRecord, Stats, StreakState};
use super::session_recorder::RecorderConfig;

/// Derive [`Stats`] from the stored history.
///
/// Percentages and averages round half up. Records count toward the 7/30
/// day windows when they finished strictly after `now - window`.
pub fn compute_stats(sessions: &[SessionRecord], streak: &StreakState, now: DateTime<Utc>) -> Stats {
    let total = sessions.len() as u64;
    let completed = sessions.iter().filter(|s| s.completed).count() as u64;
    let total_time: u64 = sessions.iter().map(|s| s.completed_duration_secs).sum();

    let within = |window: Duration| {
        let since = now - window;
        sessions.iter().filter(|s| s.finished_at() > since).count() as u64
    };

    Stats {
        total_sessions: total,
        total_time_seconds: total_time,
        completion_rate_percent: u32::try_from(round_ratio(completed * 100, total)).unwrap_or(100),
        current_streak: streak.current_streak,
        longest_streak: streak.longest_streak,
        sessions_in_last_7_days: within(Duration::days(7)),
        sessions_in_last_30_days: within(Duration::days(30)),
        average_session_length_seconds: round_ratio(total_time, total),
    }
}

fn round_ratio(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    (numerator.saturating_mul(2) + denominator) / denominator.saturating_mul(2)
}

/// Drop records older than the retention window, then cap the count.
///
/// `sessions` is newest first; the cap keeps the front.
pub fn apply_retention(sessions: &mut Vec<SessionRecord>, now: DateTime<Utc>, config: &RecorderConfig) {
    let cutoff = now - config.retention;
    sessions.retain(|s| s.finished_at() > cutoff);
    sessions.truncate(config.max_sessions);
}
