//! Monotonic scheduler used by the session clock.
//!
//! Scheduled work is a plain [`TimerTask`] value rather than a callback.
//! The owner pulls due tasks with [`Scheduler::pop_due`] and dispatches
//! them itself, so at most one task is handled at a time and cancelling a
//! handle removes the entry before anything else can observe it.
//!
//! Two implementations share the same queue:
//!
//! - [`ManualScheduler`]: virtual time moved by [`ManualScheduler::advance`].
//! - [`RealtimeScheduler`]: tokio's monotonic clock (pausable in tests).

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Identifies one scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// Work the session clock schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// One-second countdown step.
    Tick,
    /// Breathing prompt due `offset_secs` after session start.
    BreathingCue { offset_secs: u64 },
}

impl TimerTask {
    /// Tasks due at the same instant run ticks first.
    fn rank(self) -> u8 {
        match self {
            TimerTask::Tick => 0,
            TimerTask::BreathingCue { .. } => 1,
        }
    }
}

/// Monotonic clock plus a queue of one-shot and repeating tasks.
pub trait Scheduler {
    /// Time since the scheduler's origin. Never goes backwards.
    fn elapsed(&self) -> Duration;

    /// Wall-clock time, for timestamps in events and records.
    fn wall_now(&self) -> DateTime<Utc>;

    fn schedule_once(&mut self, delay: Duration, task: TimerTask) -> TaskHandle;

    fn schedule_repeating(&mut self, period: Duration, task: TimerTask) -> TaskHandle;

    /// Remove a pending entry. Returns false if it already fired or was cancelled.
    fn cancel(&mut self, handle: TaskHandle) -> bool;

    /// Take the earliest task whose deadline has passed.
    fn pop_due(&mut self) -> Option<TimerTask>;

    /// Deadline (relative to the origin) of the earliest pending entry.
    fn next_deadline(&self) -> Option<Duration>;

    /// Number of pending entries.
    fn pending(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Entry {
    handle: TaskHandle,
    deadline: Duration,
    period: Option<Duration>,
    task: TimerTask,
}

/// Deadline-ordered task queue shared by the scheduler implementations.
///
/// Ties are broken by task rank, then scheduling order. A repeating entry
/// that falls behind by more than one period fires once and skips the
/// missed periods.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    entries: Vec<Entry>,
    next_id: u64,
}

const MIN_PERIOD: Duration = Duration::from_millis(1);

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, deadline: Duration, period: Option<Duration>, task: TimerTask) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            handle,
            deadline,
            period,
            task,
        });
        handle
    }

    pub fn schedule_once(&mut self, now: Duration, delay: Duration, task: TimerTask) -> TaskHandle {
        self.push(now + delay, None, task)
    }

    pub fn schedule_repeating(
        &mut self,
        now: Duration,
        period: Duration,
        task: TimerTask,
    ) -> TaskHandle {
        let period = period.max(MIN_PERIOD);
        self.push(now + period, Some(period), task)
    }

    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub fn pop_due(&mut self, now: Duration) -> Option<TimerTask> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= now)
            .min_by_key(|(_, e)| (e.deadline, e.task.rank(), e.handle))
            .map(|(i, _)| i)?;

        match self.entries[index].period {
            Some(period) => {
                let entry = &mut self.entries[index];
                // Next grid point strictly after `now`.
                let behind = now - entry.deadline;
                let into_period = (behind.as_nanos() % period.as_nanos()) as u64;
                entry.deadline = now + (period - Duration::from_nanos(into_period));
                Some(entry.task)
            }
            None => Some(self.entries.remove(index).task),
        }
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scheduler driven by explicit calls to [`ManualScheduler::advance`].
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    now: Duration,
    origin_wall: DateTime<Utc>,
    queue: TaskQueue,
}

impl ManualScheduler {
    pub fn new(origin_wall: DateTime<Utc>) -> Self {
        Self {
            now: Duration::ZERO,
            origin_wall,
            queue: TaskQueue::new(),
        }
    }

    /// Move virtual time forward. Nothing is dispatched here.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Scheduler for ManualScheduler {
    fn elapsed(&self) -> Duration {
        self.now
    }

    fn wall_now(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.now)
            .ok()
            .and_then(|d| self.origin_wall.checked_add_signed(d))
            .unwrap_or(self.origin_wall)
    }

    fn schedule_once(&mut self, delay: Duration, task: TimerTask) -> TaskHandle {
        self.queue.schedule_once(self.now, delay, task)
    }

    fn schedule_repeating(&mut self, period: Duration, task: TimerTask) -> TaskHandle {
        self.queue.schedule_repeating(self.now, period, task)
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn pop_due(&mut self) -> Option<TimerTask> {
        self.queue.pop_due(self.now)
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.queue.next_deadline()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Scheduler on tokio's monotonic clock.
///
/// Uses `tokio::time::Instant`, so tests running with a paused runtime see
/// the same virtual time as `tokio::time::sleep`.
#[derive(Debug, Clone)]
pub struct RealtimeScheduler {
    origin: tokio::time::Instant,
    queue: TaskQueue,
}

impl RealtimeScheduler {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            queue: TaskQueue::new(),
        }
    }

    /// Instant at which a relative deadline falls.
    pub fn instant_at(&self, deadline: Duration) -> tokio::time::Instant {
        self.origin + deadline
    }
}

impl Default for RealtimeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RealtimeScheduler {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule_once(&mut self, delay: Duration, task: TimerTask) -> TaskHandle {
        let now = self.elapsed();
        self.queue.schedule_once(now, delay, task)
    }

    fn schedule_repeating(&mut self, period: Duration, task: TimerTask) -> TaskHandle {
        let now = self.elapsed();
        self.queue.schedule_repeating(now, period, task)
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn pop_due(&mut self) -> Option<TimerTask> {
        let now = self.elapsed();
        self.queue.pop_due(now)
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.queue.next_deadline()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}
