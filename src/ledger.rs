//! The shared record of recent key presses and the APM computed from it.
//!
//! Every listener stamps its presses into one [`ActivityLedger`]; the publisher
//! samples [`ActivityLedger::snapshot_rate`] once per tick. Both go through the
//! same mutex, which is held only while touching the ring.

use crate::clock::Timestamp;
use std::sync::{Mutex, PoisonError};

/// Number of presses the ledger remembers.
///
/// Presses beyond this many inside one window are not counted.
pub const CAPACITY: usize = 256;

/// Slot value of a ring entry that has never been written.
const EMPTY: u64 = 0;

#[derive(Debug)]
struct Ring {
    /// Press timestamps, stored as `timestamp + 1` so that a press at
    /// millisecond zero is distinguishable from [`EMPTY`].
    slots: [u64; CAPACITY],
    /// The next slot to overwrite.
    cursor: usize,
}

impl Ring {
    fn push(&mut self, ts: Timestamp) {
        self.slots[self.cursor] = ts.saturating_add(1);
        self.cursor = (self.cursor + 1) % CAPACITY;
    }

    /// Stored timestamps, newest first, up to the first unwritten slot.
    fn newest_first(&self) -> impl Iterator<Item = Timestamp> + '_ {
        (1..=CAPACITY)
            .map(move |back| self.slots[(self.cursor + CAPACITY - back) % CAPACITY])
            .take_while(|&slot| slot != EMPTY)
            .map(|slot| slot - 1)
    }
}

/// A fixed-capacity ring of key press timestamps guarded by a single lock.
#[derive(Debug)]
pub struct ActivityLedger {
    ring: Mutex<Ring>,
}

impl Default for ActivityLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLedger {
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(Ring {
                slots: [EMPTY; CAPACITY],
                cursor: 0,
            }),
        }
    }

    /// Append a press, overwriting the oldest one once the ring is full.
    pub fn record(&self, ts: Timestamp) {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ts);
    }

    /// The current actions-per-minute estimate over the last `window_ms`.
    pub fn snapshot_rate(&self, now: Timestamp, window_ms: u64) -> u32 {
        let weight = {
            let ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
            decayed_weight(ring.newest_first(), now, window_ms)
        };

        rate_per_minute(weight, window_ms)
    }

    /// How many slots currently hold a press.
    pub fn recorded(&self) -> usize {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .newest_first()
            .count()
    }
}

/// Sum of `window - delta` over the presses inside the window ending at `now`.
///
/// `presses` must yield timestamps newest first. The scan stops at the first
/// press older than the window. Presses stamped after `now` count as brand new.
fn decayed_weight(
    presses: impl IntoIterator<Item = Timestamp>,
    now: Timestamp,
    window_ms: u64,
) -> u64 {
    presses
        .into_iter()
        .map(|ts| now.saturating_sub(ts))
        .take_while(|&delta| delta <= window_ms)
        .map(|delta| window_ms - delta)
        .sum()
}

/// Weighted press count over the window ending at `now`.
///
/// A press `delta` ms old adds `(window - delta) / (window / 2)`: 2.0 when it
/// just happened, 1.0 at half the window, 0.0 at its edge.
#[cfg(test)]
fn weighted_score(
    presses: impl IntoIterator<Item = Timestamp>,
    now: Timestamp,
    window_ms: u64,
) -> f64 {
    if window_ms == 0 {
        return 0.0;
    }

    decayed_weight(presses, now, window_ms) as f64 / (window_ms as f64 / 2.0)
}

/// Extrapolate a decayed weight over `window_ms` to a per-minute rate.
///
/// Equal to `floor(score * 60000 / window_ms)`, evaluated in integers so that
/// exact scores do not round down.
fn rate_per_minute(weight: u64, window_ms: u64) -> u32 {
    if window_ms == 0 {
        return 0;
    }

    let window = u128::from(window_ms);
    let rate = u128::from(weight) * 120_000 / (window * window);

    u32::try_from(rate).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const WINDOW: u64 = 10_000;

    #[test]
    fn empty_ledger_has_no_activity() {
        let ledger = ActivityLedger::new();
        assert_eq!(ledger.snapshot_rate(0, WINDOW), 0);
        assert_eq!(ledger.snapshot_rate(123_456, WINDOW), 0);
        assert_eq!(ledger.recorded(), 0);
    }

    #[test]
    fn press_at_half_window_weighs_half_a_fresh_press() {
        let fresh = weighted_score([10_000], 10_000, WINDOW);
        let half = weighted_score([5_000], 10_000, WINDOW);
        assert!((fresh - 2.0).abs() < 1e-9);
        assert!((half - 1.0).abs() < 1e-9, "got {half}");
        assert!((half / fresh - 0.5).abs() < 1e-9);

        let ledger = ActivityLedger::new();
        ledger.record(15_000);
        assert_eq!(ledger.snapshot_rate(20_000, WINDOW), 6);
    }

    #[test]
    fn evenly_spaced_presses_give_thirty_apm() {
        let ledger = ActivityLedger::new();
        for ts in [0, 2_000, 4_000, 6_000, 8_000] {
            ledger.record(ts);
        }

        let ring = ledger.ring.lock().unwrap();
        let score = weighted_score(ring.newest_first(), 9_000, WINDOW);
        drop(ring);

        assert!((score - 5.0).abs() < 1e-9, "score was {score}");
        assert_eq!(ledger.snapshot_rate(9_000, WINDOW), 30);
    }

    #[test]
    fn press_at_time_zero_is_counted() {
        let ledger = ActivityLedger::new();
        ledger.record(0);
        assert_eq!(ledger.recorded(), 1);
        assert_eq!(ledger.snapshot_rate(0, WINDOW), 12);
    }

    #[test]
    fn presses_outside_window_are_ignored() {
        let ledger = ActivityLedger::new();
        ledger.record(1_000);
        ledger.record(20_000);

        // Only the second press is within 10 s of now.
        assert_eq!(ledger.snapshot_rate(20_000, WINDOW), 12);
        assert_eq!(ledger.snapshot_rate(30_001, WINDOW), 0);
    }

    #[test]
    fn rate_grows_with_presses_and_decays_with_age() {
        let ledger = ActivityLedger::new();
        let mut last = 0;
        for ts in (1_000..=5_000).step_by(500) {
            ledger.record(ts);
            let rate = ledger.snapshot_rate(ts, WINDOW);
            assert!(rate >= last, "rate dropped from {last} to {rate} after a press");
            last = rate;
        }

        for now in (5_000..=16_000).step_by(250) {
            let rate = ledger.snapshot_rate(now, WINDOW);
            assert!(rate <= last, "rate rose from {last} to {rate} with no presses");
            last = rate;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn scan_is_truncated_at_capacity() {
        let ledger = ActivityLedger::new();
        for _ in 0..CAPACITY + 44 {
            ledger.record(5_000);
        }

        assert_eq!(ledger.recorded(), CAPACITY);
        // Every remembered press is brand new and weighs 2.0.
        assert_eq!(ledger.snapshot_rate(5_000, WINDOW), 2 * CAPACITY as u32 * 6);
    }

    #[test]
    fn wraparound_keeps_newest_presses() {
        let ledger = ActivityLedger::new();
        for ts in 0..CAPACITY as u64 {
            ledger.record(ts);
        }
        ledger.record(50_000);

        let ring = ledger.ring.lock().unwrap();
        let newest = ring.newest_first().take(2).collect::<Vec<_>>();
        assert_eq!(newest, vec![50_000, CAPACITY as u64 - 1]);
    }

    #[test]
    fn zero_window_yields_zero() {
        let ledger = ActivityLedger::new();
        ledger.record(10);
        assert_eq!(ledger.snapshot_rate(10, 0), 0);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        const THREADS: usize = 4;
        const PRESSES: usize = 50;

        let ledger = Arc::new(ActivityLedger::new());
        let workers = (0..THREADS)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..PRESSES {
                        ledger.record(7_000);
                    }
                })
            })
            .collect::<Vec<_>>();

        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(ledger.recorded(), THREADS * PRESSES);
        // 200 presses at delta 0 weigh 2.0 each: 400 * 60000 / 10000.
        assert_eq!(ledger.snapshot_rate(7_000, WINDOW), 2_400);
    }
}
