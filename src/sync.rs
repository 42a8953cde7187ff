//! Feed polling and snapshot diffing
//!
//! A background thread polls the feed on a fixed interval and ships each
//! cycle's results over a channel. The main loop owns all state and applies
//! results through `SyncLoop::apply`, so the snapshot and its key set are
//! always replaced together.
//!
//! Only the previous cycle's keys are remembered. An event that drops out of
//! one cycle and comes back later is reported as new again.

use crate::event::{AttackEvent, EventKey};
use crate::feed::{FeedSource, Summary};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// One poll cycle. A request that failed is `None`; the failure has already
/// been logged.
#[derive(Debug, Default)]
pub struct PollResult {
    pub events: Option<Vec<AttackEvent>>,
    pub summary: Option<Summary>,
}

/// Fetch events and summary at the same time. Each request fails on its own.
pub fn poll_once(feed: &dyn FeedSource) -> PollResult {
    thread::scope(|scope| {
        let summary = scope.spawn(|| feed.fetch_summary());
        let events = feed
            .fetch_events()
            .map_err(|e| tracing::warn!(error = %e, "event feed request failed"))
            .ok();
        let summary = match summary.join() {
            Ok(result) => result
                .map_err(|e| tracing::warn!(error = %e, "summary request failed"))
                .ok(),
            Err(_) => {
                tracing::error!("summary request panicked");
                None
            }
        };
        PollResult { events, summary }
    })
}

// ============================================================================
// Poller thread
// ============================================================================

/// Granularity at which the poller notices shutdown while sleeping.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub struct Poller {
    running: Arc<AtomicBool>,
    receiver: Receiver<PollResult>,
}

impl Poller {
    pub fn spawn(feed: Arc<dyn FeedSource>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        // Detached: a request in flight is bounded by the feed timeout
        thread::spawn(move || poll_loop(feed.as_ref(), interval, &flag, &tx));
        Self { running, receiver: rx }
    }

    /// Cycles completed since the last call, oldest first.
    pub fn drain(&self) -> Vec<PollResult> {
        let mut results = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(result) => results.push(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        results
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn poll_loop(feed: &dyn FeedSource, interval: Duration, running: &AtomicBool, tx: &Sender<PollResult>) {
    tracing::info!(source = %feed.describe(), interval_ms = interval.as_millis() as u64, "poller started");
    while running.load(Ordering::Relaxed) {
        let started = Instant::now();
        let result = poll_once(feed);
        if tx.send(result).is_err() {
            break;
        }
        while running.load(Ordering::Relaxed) && started.elapsed() < interval {
            thread::sleep(SLEEP_SLICE.min(interval.saturating_sub(started.elapsed())));
        }
    }
    tracing::debug!("poller stopped");
}

// ============================================================================
// Diffing
// ============================================================================

/// What a cycle changed.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Events absent from the previous cycle, in feed order.
    pub fresh: Vec<AttackEvent>,
    /// First successful event fetch: `fresh` is history, not live traffic.
    pub baseline: bool,
    pub snapshot_updated: bool,
    pub summary_updated: bool,
}

#[derive(Default)]
pub struct SyncLoop {
    snapshot: Arc<Vec<AttackEvent>>,
    known: HashSet<EventKey>,
    summary: Option<Summary>,
    synced: bool,
}

impl SyncLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &Arc<Vec<AttackEvent>> {
        &self.snapshot
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Apply one poll cycle. A failed event request leaves the snapshot and
    /// known keys untouched, so the next cycle diffs against the last good
    /// list.
    pub fn apply(&mut self, result: PollResult) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        if let Some(events) = result.events {
            // A key repeated within the list is one logical event
            let mut seen = HashSet::new();
            let fresh: Vec<AttackEvent> = events
                .iter()
                .filter(|e| {
                    let key = e.key();
                    !self.known.contains(&key) && seen.insert(key)
                })
                .cloned()
                .collect();
            let known = events.iter().map(AttackEvent::key).collect();

            self.snapshot = Arc::new(events);
            self.known = known;
            outcome.baseline = !self.synced;
            self.synced = true;
            outcome.fresh = fresh;
            outcome.snapshot_updated = true;
        }

        if let Some(summary) = result.summary {
            self.summary = Some(summary);
            outcome.summary_updated = true;
        }

        if outcome.snapshot_updated {
            tracing::debug!(
                total = self.snapshot.len(),
                fresh = outcome.fresh.len(),
                baseline = outcome.baseline,
                "poll cycle applied"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedError;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn event(t: &str, ip: &str) -> AttackEvent {
        AttackEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 8, 25, 14, 0, 0).unwrap(),
            raw_timestamp: t.to_string(),
            source_ip: ip.to_string(),
            dest_port: None,
            service: None,
            country: None,
            city: None,
            lat: None,
            lon: None,
        }
    }

    fn ok(events: Vec<AttackEvent>) -> PollResult {
        PollResult {
            events: Some(events),
            summary: Some(Summary::default()),
        }
    }

    #[test]
    fn diff_reports_only_new_keys() {
        let mut sync = SyncLoop::new();
        let first = sync.apply(ok(vec![event("t1", "ip1"), event("t2", "ip2")]));
        assert!(first.baseline);
        assert_eq!(first.fresh.len(), 2);

        let second = sync.apply(ok(vec![event("t1", "ip1"), event("t2", "ip2"), event("t3", "ip3")]));
        assert!(!second.baseline);
        assert_eq!(second.fresh, vec![event("t3", "ip3")]);
    }

    #[test]
    fn failed_event_request_keeps_previous_snapshot() {
        let mut sync = SyncLoop::new();
        sync.apply(ok(vec![event("t1", "ip1")]));

        let outcome = sync.apply(PollResult {
            events: None,
            summary: Some(Summary {
                total_attacks: Some(9),
                ..Summary::default()
            }),
        });
        assert!(!outcome.snapshot_updated);
        assert!(outcome.summary_updated);
        assert_eq!(sync.snapshot().len(), 1);
        assert_eq!(sync.summary().and_then(|s| s.total_attacks), Some(9));

        let next = sync.apply(ok(vec![event("t1", "ip1"), event("t2", "ip2")]));
        assert_eq!(next.fresh, vec![event("t2", "ip2")]);
    }

    #[test]
    fn only_previous_cycle_is_remembered() {
        let mut sync = SyncLoop::new();
        sync.apply(ok(vec![event("t1", "ip1")]));
        sync.apply(ok(vec![event("t2", "ip2")]));
        let back = sync.apply(ok(vec![event("t1", "ip1"), event("t2", "ip2")]));
        assert_eq!(back.fresh, vec![event("t1", "ip1")]);
    }

    #[test]
    fn duplicates_within_a_cycle_share_a_key() {
        let mut sync = SyncLoop::new();
        sync.apply(ok(vec![]));
        let outcome = sync.apply(ok(vec![event("t1", "ip1"), event("t2", "ip2"), event("t1", "ip1")]));
        assert_eq!(outcome.fresh, vec![event("t1", "ip1"), event("t2", "ip2")]);
        let again = sync.apply(ok(vec![event("t1", "ip1")]));
        assert!(again.fresh.is_empty());
    }

    struct HalfBroken {
        calls: Mutex<u32>,
    }

    impl FeedSource for HalfBroken {
        fn fetch_events(&self) -> Result<Vec<AttackEvent>, FeedError> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![event("t1", "ip1")])
        }

        fn fetch_summary(&self) -> Result<Summary, FeedError> {
            *self.calls.lock().unwrap() += 1;
            Err(FeedError::Io {
                path: PathBuf::from("summary.json"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            })
        }

        fn describe(&self) -> String {
            "half-broken".into()
        }
    }

    #[test]
    fn one_failing_request_does_not_abort_the_other() {
        let feed = HalfBroken { calls: Mutex::new(0) };
        let result = poll_once(&feed);
        assert_eq!(*feed.calls.lock().unwrap(), 2);
        assert_eq!(result.events.map(|e| e.len()), Some(1));
        assert!(result.summary.is_none());
    }

    #[test]
    fn poller_delivers_cycles() {
        let feed: Arc<dyn FeedSource> = Arc::new(HalfBroken { calls: Mutex::new(0) });
        let poller = Poller::spawn(feed, Duration::from_millis(10));
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut results = Vec::new();
        while results.is_empty() && Instant::now() < deadline {
            results = poller.drain();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!results.is_empty());
        assert!(results[0].events.is_some());
    }
}
