use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "simulation metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimulationMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub relocations_per_sec: f32,
    pub active_moves: usize,
    pub edits_applied: u32,
    pub dropped_backlog_ms: f32,
}

/// Latest simulation metrics, readable from any thread.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<SimulationMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> SimulationMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub fn publish(&self, snapshot: SimulationMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    tick_time_sum: Duration,
    relocations: usize,
    edits_applied: u32,
    dropped_backlog: Duration,
    active_moves: usize,
}

impl MetricsAccumulator {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            ticks: 0,
            tick_time_sum: Duration::ZERO,
            relocations: 0,
            edits_applied: 0,
            dropped_backlog: Duration::ZERO,
            active_moves: 0,
        }
    }

    pub fn record_tick(
        &mut self,
        tick_time: Duration,
        relocations: usize,
        edits_applied: usize,
        active_moves: usize,
    ) {
        self.ticks = self.ticks.saturating_add(1);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_time);
        self.relocations = self.relocations.saturating_add(relocations);
        self.edits_applied = self
            .edits_applied
            .saturating_add(u32::try_from(edits_applied).unwrap_or(u32::MAX));
        self.active_moves = active_moves;
    }

    pub fn record_dropped_backlog(&mut self, dropped: Duration) {
        self.dropped_backlog = self.dropped_backlog.saturating_add(dropped);
    }

    pub fn maybe_snapshot(&mut self, now: Instant) -> Option<SimulationMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.tick_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = SimulationMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            tick_time_ms,
            relocations_per_sec: self.relocations as f32 / elapsed_seconds,
            active_moves: self.active_moves,
            edits_applied: self.edits_applied,
            dropped_backlog_ms: self.dropped_backlog.as_secs_f32() * 1000.0,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.tick_time_sum = Duration::ZERO;
        self.relocations = 0;
        self.edits_applied = 0;
        self.dropped_backlog = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<SimulationMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_computes_expected_values() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);

        for _ in 0..4 {
            accumulator.record_tick(Duration::from_millis(2), 3, 1, 2);
        }
        accumulator.record_dropped_backlog(Duration::from_millis(40));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.tick_time_ms - 2.0).abs() < 0.001);
        assert!((snapshot.relocations_per_sec - 12.0).abs() < 0.05);
        assert_eq!(snapshot.active_moves, 2);
        assert_eq!(snapshot.edits_applied, 4);
        assert!((snapshot.dropped_backlog_ms - 40.0).abs() < 0.001);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_tick(Duration::from_millis(1), 0, 0, 0);

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn counters_reset_after_snapshot() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_tick(Duration::from_millis(1), 5, 1, 1);
        accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first");

        let second = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second");
        assert_eq!(second.tps, 0.0);
        assert_eq!(second.relocations_per_sec, 0.0);
        assert_eq!(second.edits_applied, 0);
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());
        assert_eq!(handle.snapshot(), SimulationMetricsSnapshot::default());

        let expected = SimulationMetricsSnapshot {
            tps: 60.0,
            tick_time_ms: 0.5,
            relocations_per_sec: 10.0,
            active_moves: 3,
            edits_applied: 1,
            dropped_backlog_ms: 0.0,
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
