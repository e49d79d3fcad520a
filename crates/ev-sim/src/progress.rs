//! Progress channel.
//!
//! One writer per run (the run's orchestrator, or the batch coordinator),
//! any number of readers.  Readers always see the latest snapshot and may
//! miss intermediate ones.
//!
//! # Update rules
//!
//! | Rule            | Effect                                                  |
//! |-----------------|---------------------------------------------------------|
//! | non-decreasing  | `progress = max(previous, reported)`                    |
//! | absorbing       | updates after `completed` / `failed` are ignored        |
//! | sequence        | every accepted update bumps `sequence` by one           |
//!
//! A failed run therefore keeps the progress it had reached.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;

use ev_core::RunId;

// ── RunStage ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Queued,
    Setup,
    Config,
    Agents,
    Simulation,
    Finalization,
    Completed,
    Failed,
}

impl RunStage {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Completed | RunStage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Queued => "queued",
            RunStage::Setup => "setup",
            RunStage::Config => "config",
            RunStage::Agents => "agents",
            RunStage::Simulation => "simulation",
            RunStage::Finalization => "finalization",
            RunStage::Completed => "completed",
            RunStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Reported progress during the simulation stage.
///
/// `30 + 60 · max(time_fraction, 0.8 · agent_fraction)`, never below `last`
/// and never above 90.  `expected` counts flow agents not spawned yet.
pub fn simulation_progress(elapsed: f64, max_time: f64, evacuated: u64, expected: u64, last: f64) -> f64 {
    let time_fraction = if max_time > 0.0 { (elapsed / max_time).min(1.0) } else { 1.0 };
    let agent_fraction = if expected > 0 { evacuated as f64 / expected as f64 } else { 0.0 };
    (30.0 + 60.0 * time_fraction.max(0.8 * agent_fraction)).max(last).min(90.0)
}

// ── Snapshot and store ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub stage:       RunStage,
    /// Percent, `0..=100`.
    pub progress:    f64,
    pub message:     String,
    pub sequence:    u64,
    /// When the run reached a terminal stage.
    #[serde(skip)]
    pub finished_at: Option<Instant>,
}

impl ProgressSnapshot {
    fn queued(message: &str) -> Self {
        Self {
            stage:       RunStage::Queued,
            progress:    0.0,
            message:     message.to_owned(),
            sequence:    0,
            finished_at: None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Latest progress of every known run.  Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct ProgressStore {
    inner: Arc<RwLock<FxHashMap<RunId, ProgressSnapshot>>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `run` as queued, replacing any earlier record.
    pub fn open(&self, run: RunId, message: &str) {
        self.inner.write().insert(run, ProgressSnapshot::queued(message));
    }

    /// Apply an update.  Returns `false` if the run is unknown or already
    /// terminal.
    pub fn update(&self, run: RunId, stage: RunStage, progress: f64, message: &str) -> bool {
        let mut map = self.inner.write();
        let Some(prev) = map.get(&run) else {
            return false;
        };
        if prev.is_terminal() {
            return false;
        }
        let next = ProgressSnapshot {
            stage,
            progress:    progress.clamp(0.0, 100.0).max(prev.progress),
            message:     message.to_owned(),
            sequence:    prev.sequence + 1,
            finished_at: stage.is_terminal().then(Instant::now),
        };
        map.insert(run, next);
        true
    }

    pub fn get(&self, run: RunId) -> Option<ProgressSnapshot> {
        self.inner.read().get(&run).cloned()
    }

    pub fn contains(&self, run: RunId) -> bool {
        self.inner.read().contains_key(&run)
    }

    pub fn remove(&self, run: RunId) -> Option<ProgressSnapshot> {
        self.inner.write().remove(&run)
    }

    /// Runs that reached a terminal stage more than `retention` before `now`.
    pub fn expired(&self, retention: Duration, now: Instant) -> Vec<RunId> {
        self.inner
            .read()
            .iter()
            .filter(|(_, s)| {
                s.finished_at
                    .is_some_and(|t| now.saturating_duration_since(t) > retention)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self, run: RunId) -> ProgressSubscription {
        ProgressSubscription { store: self.clone(), run, state: SubscriptionState::New, misses: 0 }
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Where a run reports its progress.
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: RunStage, progress: f64, message: &str);
}

/// Discards every update.  Used for the individual runs of a batch.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _stage: RunStage, _progress: f64, _message: &str) {}
}

/// Writes one run's updates into a [`ProgressStore`].
#[derive(Clone)]
pub struct ProgressReporter {
    store: ProgressStore,
    run:   RunId,
}

impl ProgressReporter {
    pub fn new(store: ProgressStore, run: RunId) -> Self {
        Self { store, run }
    }

    #[inline]
    pub fn run_id(&self) -> RunId {
        self.run
    }

    pub fn complete(&self, message: &str) {
        self.store.update(self.run, RunStage::Completed, 100.0, message);
    }

    /// Mark the run failed, keeping the progress it had reached.
    pub fn fail(&self, error: &dyn fmt::Display) {
        let message = format!("Simulation failed: {error}");
        self.store.update(self.run, RunStage::Failed, 0.0, &message);
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, stage: RunStage, progress: f64, message: &str) {
        self.store.update(self.run, stage, progress, message);
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// Consecutive polls that may miss the run before the subscription gives up
/// with [`ProgressEvent::NotFound`].  Covers a subscriber that arrives before
/// the submitter has opened the run.
pub const NOT_FOUND_GRACE_POLLS: u32 = 3;

/// What a subscriber gets from one poll.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// First poll: the snapshot at subscription time.
    Connected(ProgressSnapshot),
    /// The snapshot changed since the previous poll.
    Update(ProgressSnapshot),
    /// Nothing changed since the previous poll.
    Heartbeat,
    /// The terminal snapshot has been delivered; no further events follow.
    Closing,
    /// The run stayed unknown for [`NOT_FOUND_GRACE_POLLS`] polls (never
    /// submitted, or purged).
    NotFound,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum SubscriptionState {
    New,
    Open { sequence: u64 },
    Draining,
    Closed,
}

/// Poll-based view of one run's progress.
///
/// ```text
/// Heartbeat{0,3} → Connected → (Update | Heartbeat)* → Closing → None
/// Heartbeat{3}   → NotFound  → None
/// ```
pub struct ProgressSubscription {
    store:  ProgressStore,
    run:    RunId,
    state:  SubscriptionState,
    /// Consecutive polls that found no snapshot.
    misses: u32,
}

impl ProgressSubscription {
    #[inline]
    pub fn run_id(&self) -> RunId {
        self.run
    }

    pub fn is_closed(&self) -> bool {
        self.state == SubscriptionState::Closed
    }

    /// Next event, or `None` once the subscription has ended.
    pub fn poll(&mut self) -> Option<ProgressEvent> {
        match self.state {
            SubscriptionState::Closed => None,
            SubscriptionState::Draining => {
                self.state = SubscriptionState::Closed;
                Some(ProgressEvent::Closing)
            }
            SubscriptionState::New | SubscriptionState::Open { .. } => {
                let Some(snapshot) = self.store.get(self.run) else {
                    if self.misses < NOT_FOUND_GRACE_POLLS {
                        self.misses += 1;
                        return Some(ProgressEvent::Heartbeat);
                    }
                    self.state = SubscriptionState::Closed;
                    return Some(ProgressEvent::NotFound);
                };
                self.misses = 0;
                let first = self.state == SubscriptionState::New;
                if let SubscriptionState::Open { sequence } = self.state {
                    if snapshot.sequence == sequence {
                        return Some(ProgressEvent::Heartbeat);
                    }
                }
                self.state = if snapshot.is_terminal() {
                    SubscriptionState::Draining
                } else {
                    SubscriptionState::Open { sequence: snapshot.sequence }
                };
                Some(if first { ProgressEvent::Connected(snapshot) } else { ProgressEvent::Update(snapshot) })
            }
        }
    }
}
