//! Integration tests for [`wavescope_scan::service`].
//!
//! All tests run on a paused tokio clock: refresh ticks, linger windows and
//! slow sources advance virtual time only, so the tests are instant and
//! deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use wavescope_scan::{
    BatchFailure, BssidId, Observation, ObservationSource, PublishedState, ReplayCycle,
    ReplaySource, ScanConfig, ScanCycle, ScanLoop, ScanStatus,
};

fn mac(last: u8) -> BssidId {
    BssidId([0x02, 0, 0, 0, 0, last])
}

fn cycle(ids: &[u8]) -> ReplayCycle {
    ReplayCycle::Observations(ids.iter().map(|&b| Observation::new(mac(b))).collect())
}

async fn next(rx: &mut watch::Receiver<PublishedState>) -> PublishedState {
    rx.changed().await.expect("scan loop alive");
    rx.borrow_and_update().clone()
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// The first publish is the union of both startup scans; later cycles
/// ghost, report failures and resume.
#[tokio::test(start_paused = true)]
async fn publishes_startup_union_then_every_cycle() {
    let source = ReplaySource::from_cycles(vec![
        cycle(&[1, 2]),
        cycle(&[2, 3]),
        cycle(&[3]),
        ReplayCycle::Failure(BatchFailure::Timeout {
            tool: "nmcli".into(),
            after_ms: 30_000,
        }),
        cycle(&[3]),
    ]);
    let handle = ScanLoop::new(ScanConfig::default(), Arc::new(source)).spawn();
    let mut rx = handle.subscribe();

    let first = next(&mut rx).await;
    assert_eq!(first.status, ScanStatus::Ok { cycle: ScanCycle(2) });
    assert_eq!(first.snapshot.len(), 3);
    assert_eq!(first.snapshot.ghost_count(), 0);

    let second = next(&mut rx).await;
    assert_eq!(second.status, ScanStatus::Ok { cycle: ScanCycle(3) });
    assert!(second.snapshot.get(&mac(1)).unwrap().ghost);
    assert!(second.snapshot.get(&mac(2)).unwrap().ghost);
    assert!(!second.snapshot.get(&mac(3)).unwrap().ghost);

    let failed = next(&mut rx).await;
    assert!(matches!(
        failed.status,
        ScanStatus::Failed {
            cycle: ScanCycle(4),
            failure: BatchFailure::Timeout { .. }
        }
    ));
    assert!(failed.snapshot.shares_storage_with(&second.snapshot));

    let resumed = next(&mut rx).await;
    assert_eq!(resumed.status, ScanStatus::Ok { cycle: ScanCycle(5) });
    assert_eq!(resumed.snapshot.len(), 3);

    handle.shutdown().await;
}

/// Ghosts are purged once the linger window has passed in virtual time.
#[tokio::test(start_paused = true)]
async fn linger_follows_the_clock() {
    let config = ScanConfig {
        startup_double_scan: false,
        linger_window_seconds: 8,
        ..ScanConfig::default()
    };
    let source = ReplaySource::from_cycles(vec![cycle(&[1]), cycle(&[]), cycle(&[])]);
    let handle = ScanLoop::new(config, Arc::new(source)).spawn();
    let mut rx = handle.subscribe();

    assert_eq!(next(&mut rx).await.snapshot.len(), 1);
    let at_5s = next(&mut rx).await;
    assert_eq!(at_5s.snapshot.ghost_count(), 1);
    let at_10s = next(&mut rx).await;
    assert!(at_10s.snapshot.is_empty());

    handle.shutdown().await;
}

/// After shutdown no further states are published.
#[tokio::test(start_paused = true)]
async fn shutdown_closes_the_channel() {
    let config = ScanConfig {
        startup_double_scan: false,
        ..ScanConfig::default()
    };
    let source = ReplaySource::from_cycles(vec![cycle(&[1])]).looping(true);
    let handle = ScanLoop::new(config, Arc::new(source)).spawn();
    let mut rx = handle.subscribe();
    next(&mut rx).await;

    handle.shutdown().await;
    while rx.has_changed().unwrap_or(false) {
        rx.borrow_and_update();
    }
    assert!(rx.changed().await.is_err());
}

// ---------------------------------------------------------------------------
// Single cycle in flight
// ---------------------------------------------------------------------------

/// A source slower than the refresh interval.
struct SlowSource {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    polls: AtomicUsize,
}

#[async_trait]
impl ObservationSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn poll(&self) -> Result<Vec<Observation>, BatchFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.polls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(12)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![Observation::new(mac(9))])
    }
}

/// Overrunning cycles never overlap and the cycle clock advances by one
/// per completed poll.
#[tokio::test(start_paused = true)]
async fn overrunning_polls_do_not_overlap() {
    let source = Arc::new(SlowSource {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        polls: AtomicUsize::new(0),
    });
    let config = ScanConfig {
        startup_double_scan: false,
        ..ScanConfig::default()
    };
    let handle = ScanLoop::new(config, source.clone()).spawn();
    let mut rx = handle.subscribe();

    let mut cycles = Vec::new();
    for _ in 0..3 {
        match next(&mut rx).await.status {
            ScanStatus::Ok { cycle } => cycles.push(cycle.0),
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(cycles, vec![1, 2, 3]);
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);

    handle.shutdown().await;
    assert!(source.polls.load(Ordering::SeqCst) >= 3);
}
