//! Integration tests for [`wavescope_scan::reconciler`] and the startup
//! coordinator.
//!
//! Time is driven explicitly: every ingest receives a fixed `Instant`
//! offset from a common origin, so linger boundaries are exact.

use std::time::{Duration, Instant};

use wavescope_scan::{
    Band, BatchFailure, BssidId, ChannelWidth, Observation, Reconciler, RescanCoordinator,
    ScanCycle,
};

fn mac(last: u8) -> BssidId {
    BssidId([0x02, 0x11, 0x22, 0x33, 0x44, last])
}

fn full(last: u8) -> Observation {
    Observation {
        ssid: Some(format!("net-{last}")),
        band: Some(Band::Band5GHz),
        primary_channel: Some(36),
        channel_width_mhz: Some(80),
        signal_dbm: Some(-55.0),
        security: Some("WPA2".into()),
        client_count: Some(3),
        ..Observation::new(mac(last))
    }
}

fn bare(last: u8) -> Observation {
    Observation::new(mac(last))
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Re-ingesting the same BSSID never produces a second record, even when it
/// appears several times in one batch.
#[test]
fn one_record_per_bssid() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    for i in 0..10u64 {
        rec.ingest(&[full(1), bare(1), full(2)], t0 + Duration::from_secs(i));
    }
    let snap = rec.snapshot();
    assert_eq!(snap.len(), 2);
    let bssids: Vec<BssidId> = snap.bssids().copied().collect();
    assert_eq!(bssids, vec![mac(1), mac(2)]);
}

/// A duplicate in one batch contributes its fields to the same record.
#[test]
fn duplicate_in_batch_is_folded() {
    let mut rec = Reconciler::default();
    let partial = Observation {
        client_count: Some(9),
        ..bare(1)
    };
    rec.ingest(&[full(1), partial], Instant::now());
    let snap = rec.snapshot();
    let r = snap.get(&mac(1)).expect("record present");
    assert_eq!(r.client_count.get(), Some(9));
    assert_eq!(r.ssid.value().map(String::as_str), Some("net-1"));
}

// ---------------------------------------------------------------------------
// Sticky decay
// ---------------------------------------------------------------------------

/// Five consecutive misses keep the last value; the sixth clears it.
#[test]
fn sticky_field_survives_five_misses_then_decays() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);

    for i in 1..=5u64 {
        rec.ingest(&[bare(1)], t0 + Duration::from_secs(i));
        let snap = rec.snapshot();
        let r = snap.get(&mac(1)).unwrap();
        assert_eq!(r.ssid.value().map(String::as_str), Some("net-1"), "miss {i}");
        assert_eq!(r.ssid.miss_count(), i as u32);
    }

    let delta = rec.ingest(&[bare(1)], t0 + Duration::from_secs(6));
    let snap = rec.snapshot();
    let r = snap.get(&mac(1)).unwrap();
    assert_eq!(r.ssid.value(), None);
    assert_eq!(r.client_count.get(), None);
    assert!(delta.decayed.contains(&(mac(1), "ssid")));
}

/// A report in between resets the miss count.
#[test]
fn sticky_miss_count_resets_on_report() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    for i in 1..=4u64 {
        rec.ingest(&[bare(1)], t0 + Duration::from_secs(i));
    }
    rec.ingest(&[full(1)], t0 + Duration::from_secs(5));
    for i in 6..=10u64 {
        rec.ingest(&[bare(1)], t0 + Duration::from_secs(i));
    }
    let snap = rec.snapshot();
    assert_eq!(snap.get(&mac(1)).unwrap().ssid.miss_count(), 5);
    assert!(snap.get(&mac(1)).unwrap().ssid.value().is_some());
}

/// Signal is volatile: an absent reading overwrites the previous one.
#[test]
fn signal_is_overwritten_with_absence() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    rec.ingest(&[bare(1)], t0 + Duration::from_secs(1));
    assert_eq!(rec.snapshot().get(&mac(1)).unwrap().signal_dbm, None);
}

/// A zero width is a miss, not a value: the known width survives it.
#[test]
fn zero_width_does_not_overwrite_known_width() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    let zero = Observation {
        channel_width_mhz: Some(0),
        ..full(1)
    };
    rec.ingest(&[zero.clone()], t0 + Duration::from_secs(1));

    let snap = rec.snapshot();
    let r = snap.get(&mac(1)).unwrap();
    assert_eq!(r.channel_width_mhz.get(), Some(80));
    assert_eq!(r.channel_width_mhz.miss_count(), 1);
    assert_eq!(r.geometry().map(|g| g.width), Some(ChannelWidth::W80));

    // A zero-width duplicate in the same batch does not win either.
    rec.ingest(&[full(1), zero], t0 + Duration::from_secs(2));
    assert_eq!(rec.snapshot().get(&mac(1)).unwrap().channel_width_mhz.get(), Some(80));
}

/// Association follows the latest batch and a ghost is never associated.
#[test]
fn association_clears_when_missing() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    let connected = Observation {
        in_use: Some(true),
        ..full(1)
    };
    rec.ingest(&[connected.clone(), full(2)], t0);
    let snap = rec.snapshot();
    assert!(snap.get(&mac(1)).unwrap().in_use);
    assert!(!snap.get(&mac(2)).unwrap().in_use);

    rec.ingest(&[full(2)], t0 + Duration::from_secs(1));
    let ghost = rec.snapshot();
    let r = ghost.get(&mac(1)).unwrap();
    assert!(r.ghost);
    assert!(!r.in_use);

    rec.ingest(&[connected], t0 + Duration::from_secs(2));
    assert!(rec.snapshot().get(&mac(1)).unwrap().in_use);
}

/// A custom threshold moves the decay point.
#[test]
fn custom_threshold() {
    let mut rec = Reconciler::new(Duration::from_secs(60), 2);
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    rec.ingest(&[bare(1)], t0);
    rec.ingest(&[bare(1)], t0);
    assert!(rec.snapshot().get(&mac(1)).unwrap().ssid.value().is_some());
    rec.ingest(&[bare(1)], t0);
    assert!(rec.snapshot().get(&mac(1)).unwrap().ssid.value().is_none());
}

// ---------------------------------------------------------------------------
// Linger
// ---------------------------------------------------------------------------

/// Absent for just under the window: present and ghosted.
/// Absent for just over it: purged.
#[test]
fn linger_window_boundary() {
    let linger = Duration::from_secs(60);
    let eps = Duration::from_millis(1);
    let mut rec = Reconciler::new(linger, 5);
    let t0 = Instant::now();
    rec.ingest(&[full(1), full(2)], t0);

    let delta = rec.ingest(&[full(2)], t0 + linger - eps);
    assert_eq!(delta.ghosted, vec![mac(1)]);
    let snap = rec.snapshot();
    let ghost = snap.get(&mac(1)).expect("still lingering");
    assert!(ghost.ghost);
    assert_eq!(ghost.ssid.miss_count(), 0, "ghosts do not decay");

    let delta = rec.ingest(&[full(2)], t0 + linger + eps);
    assert_eq!(delta.purged, vec![mac(1)]);
    assert!(!rec.snapshot().contains(&mac(1)));
}

/// A ghost that is seen again is live again.
#[test]
fn ghost_revives() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    rec.ingest(&[], t0 + Duration::from_secs(5));
    assert!(rec.snapshot().get(&mac(1)).unwrap().ghost);
    let delta = rec.ingest(&[full(1)], t0 + Duration::from_secs(10));
    assert_eq!(delta.refreshed, vec![mac(1)]);
    assert!(!rec.snapshot().get(&mac(1)).unwrap().ghost);
}

/// A zero window purges a record on the first cycle it is missing.
#[test]
fn zero_linger_purges_immediately() {
    let mut rec = Reconciler::new(Duration::ZERO, 5);
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    rec.ingest(&[], t0 + Duration::from_millis(1));
    assert!(rec.is_empty());
}

// ---------------------------------------------------------------------------
// Determinism and snapshots
// ---------------------------------------------------------------------------

/// Replaying the same batches into a fresh registry yields the same registry.
#[test]
fn ingest_is_deterministic() {
    let t0 = Instant::now();
    let script: Vec<Vec<Observation>> = vec![
        vec![full(1), full(2), full(3)],
        vec![bare(1), full(3)],
        vec![full(4)],
        vec![bare(1), bare(4), full(2)],
    ];
    let run = || {
        let mut rec = Reconciler::default();
        for (i, batch) in script.iter().enumerate() {
            rec.ingest(batch, t0 + Duration::from_secs(i as u64 * 5));
        }
        rec.snapshot()
    };
    let a = run();
    let b = run();
    assert_eq!(a.cycle(), b.cycle());
    assert!(a.records().eq(b.records()));
}

/// A snapshot taken before an ingest is unaffected by it.
#[test]
fn snapshots_are_immutable() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1)], t0);
    let before = rec.snapshot();
    rec.ingest(&[full(2)], t0 + Duration::from_secs(1));
    assert_eq!(before.len(), 1);
    assert_eq!(rec.snapshot().len(), 2);
    assert!(!before.shares_storage_with(&rec.snapshot()));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// A failed cycle advances the clock and changes nothing else.
#[test]
fn failure_keeps_registry() {
    let mut rec = Reconciler::default();
    let t0 = Instant::now();
    rec.ingest(&[full(1), full(2)], t0);
    let before = rec.snapshot();

    let failure = BatchFailure::NonZeroExit {
        tool: "nmcli".into(),
        code: Some(8),
        stderr: "NetworkManager is not running".into(),
    };
    assert_eq!(rec.record_failure(&failure), ScanCycle(2));
    let after = rec.snapshot();

    assert_eq!(after.cycle(), ScanCycle(2));
    assert!(after.shares_storage_with(&before));
    assert!(before.records().eq(after.records()));
    assert_eq!(rec.last_failure(), Some(&failure));

    rec.ingest(&[full(1), full(2)], t0 + Duration::from_secs(10));
    assert_eq!(rec.last_failure(), None);
    assert_eq!(rec.cycle(), ScanCycle(3));
}

// ---------------------------------------------------------------------------
// Startup double scan
// ---------------------------------------------------------------------------

/// A BSSID seen only in the second startup cycle is in the first publish,
/// and so is one seen only in the first.
#[test]
fn startup_union_contains_both_cycles() {
    let mut rec = Reconciler::default();
    let mut coord = RescanCoordinator::new(true);
    let t0 = Instant::now();

    assert!(coord.on_cycle(&mut rec, Ok(vec![full(1)]), t0).is_none());
    let first = coord
        .on_cycle(&mut rec, Ok(vec![full(2)]), t0 + Duration::from_secs(2))
        .expect("published after second cycle");

    assert!(first.contains(&mac(1)));
    assert!(first.contains(&mac(2)));
    assert_eq!(first.ghost_count(), 0);

    // Inert afterwards: the next cycle publishes as-is.
    let next = coord
        .on_cycle(&mut rec, Ok(vec![full(2)]), t0 + Duration::from_secs(7))
        .expect("published");
    assert!(next.get(&mac(1)).unwrap().ghost);
}

/// A record purged between the two startup cycles is restored by the union.
#[test]
fn startup_union_restores_purged_record() {
    let mut rec = Reconciler::new(Duration::ZERO, 5);
    let mut coord = RescanCoordinator::new(true);
    let t0 = Instant::now();
    coord.on_cycle(&mut rec, Ok(vec![full(1)]), t0);
    let snap = coord
        .on_cycle(&mut rec, Ok(vec![full(2)]), t0 + Duration::from_secs(1))
        .unwrap();
    assert_eq!(snap.len(), 2);
    assert!(!snap.get(&mac(1)).unwrap().ghost);
}
