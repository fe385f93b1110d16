//! Link counters. One [`LinkMetrics`] is created per application run and shared
//! (by `Arc`) between the link task and the bridge; a [`Snapshot`] is logged at shutdown.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct LinkMetrics {
    connect_attempts: AtomicU64,
    connects_skipped_in_flight: AtomicU64,
    connections_opened: AtomicU64,
    open_failures: AtomicU64,
    unexpected_closes: AtomicU64,
    lines_routed: AtomicU64,
    lines_discarded: AtomicU64,
    alerts: AtomicU64,
    commands_written: AtomicU64,
    commands_dropped: AtomicU64,
    write_failures: AtomicU64,
    open_latency_sum_ms: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_connect_attempt(&self) {
        bump(&self.connect_attempts);
    }
    pub fn inc_connect_skipped(&self) {
        bump(&self.connects_skipped_in_flight);
    }
    pub fn observe_open(&self, started: Instant) {
        bump(&self.connections_opened);
        let ms = started.elapsed().as_millis() as u64;
        self.open_latency_sum_ms.fetch_add(ms, Ordering::Relaxed);
    }
    pub fn inc_open_failure(&self) {
        bump(&self.open_failures);
    }
    pub fn inc_unexpected_close(&self) {
        bump(&self.unexpected_closes);
    }
    pub fn inc_line_routed(&self) {
        bump(&self.lines_routed);
    }
    pub fn inc_line_discarded(&self) {
        bump(&self.lines_discarded);
    }
    pub fn inc_alert(&self) {
        bump(&self.alerts);
    }
    pub fn inc_command_written(&self) {
        bump(&self.commands_written);
    }
    pub fn inc_command_dropped(&self) {
        bump(&self.commands_dropped);
    }
    pub fn inc_write_failure(&self) {
        bump(&self.write_failures);
    }

    pub fn snapshot(&self) -> Snapshot {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let latency = self.open_latency_sum_ms.load(Ordering::Relaxed);
        Snapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connects_skipped_in_flight: self.connects_skipped_in_flight.load(Ordering::Relaxed),
            connections_opened: opened,
            open_failures: self.open_failures.load(Ordering::Relaxed),
            unexpected_closes: self.unexpected_closes.load(Ordering::Relaxed),
            lines_routed: self.lines_routed.load(Ordering::Relaxed),
            lines_discarded: self.lines_discarded.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            commands_written: self.commands_written.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            open_latency_avg_ms: if opened > 0 { Some(latency / opened) } else { None },
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub connect_attempts: u64,
    pub connects_skipped_in_flight: u64,
    pub connections_opened: u64,
    pub open_failures: u64,
    pub unexpected_closes: u64,
    pub lines_routed: u64,
    pub lines_discarded: u64,
    pub alerts: u64,
    pub commands_written: u64,
    pub commands_dropped: u64,
    pub write_failures: u64,
    pub open_latency_avg_ms: Option<u64>,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "attempts={} opened={} open_failures={} unexpected_closes={} routed={} discarded={} alerts={} written={} dropped={} write_failures={}",
            self.connect_attempts,
            self.connections_opened,
            self.open_failures,
            self.unexpected_closes,
            self.lines_routed,
            self.lines_discarded,
            self.alerts,
            self.commands_written,
            self.commands_dropped,
            self.write_failures
        )
    }
}
