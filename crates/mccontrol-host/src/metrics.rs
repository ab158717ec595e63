//! Periodic performance sampling into a fixed-size ring buffer.

use mccontrol_core::{now_millis, HostView, MetricSnapshot, MetricsProbe};
use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

pub const NOMINAL_TPS: f64 = 20.0;

pub struct MetricsCollector {
    probe: Arc<dyn MetricsProbe>,
    samples: Mutex<VecDeque<MetricSnapshot>>,
    capacity: usize,
}

impl MetricsCollector {
    pub fn new(probe: Arc<dyn MetricsProbe>, capacity: usize) -> Self {
        Self {
            probe,
            samples: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Take one sample and append it, evicting the oldest when full.
    pub fn sample(&self, players: usize) -> MetricSnapshot {
        let tps = self
            .probe
            .tick_rate()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(|t| t.min(NOMINAL_TPS))
            .unwrap_or(NOMINAL_TPS);
        let snapshot = MetricSnapshot {
            timestamp: now_millis(),
            players,
            tps,
            memory: self.probe.memory_percent().unwrap_or(0.0),
            cpu: self.probe.cpu_percent().unwrap_or(0.0),
        };

        let mut samples = self.lock();
        samples.push_back(snapshot.clone());
        while samples.len() > self.capacity {
            samples.pop_front();
        }
        snapshot
    }

    /// Oldest first.
    pub fn snapshots(&self) -> Vec<MetricSnapshot> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<MetricSnapshot>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sample every `interval` until `shutdown` turns true.
pub async fn run_sampler(
    collector: Arc<MetricsCollector>,
    host: Arc<dyn HostView>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(interval_ms = interval.as_millis() as u64, "metrics sampler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = collector.sample(host.online_count());
                debug!(players = snapshot.players, tps = snapshot.tps, "metrics sampled");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("metrics sampler stopped");
}

// ---------------------------------------------------------------------------
// ProcfsProbe
// ---------------------------------------------------------------------------

/// Linux `/proc` readings for this process. Elsewhere every reading is None.
pub struct ProcfsProbe {
    last_cpu: Mutex<Option<(Instant, u64)>>,
}

/// USER_HZ; 100 on every mainstream Linux target.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

impl ProcfsProbe {
    pub fn new() -> Self {
        Self {
            last_cpu: Mutex::new(None),
        }
    }
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProbe for ProcfsProbe {
    fn memory_percent(&self) -> Option<f64> {
        let status = fs::read_to_string("/proc/self/status").ok()?;
        let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
        let rss = kib_field(&status, "VmRSS:")?;
        let total = kib_field(&meminfo, "MemTotal:")?;
        percent(rss as f64, total as f64)
    }

    /// Share of one core used since the previous call. The first call only
    /// primes the baseline.
    fn cpu_percent(&self) -> Option<f64> {
        let stat = fs::read_to_string("/proc/self/stat").ok()?;
        let ticks = cpu_ticks(&stat)?;
        let now = Instant::now();

        let mut last = self
            .last_cpu
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = last.replace((now, ticks));
        let (then, prev_ticks) = previous?;

        let elapsed = now.duration_since(then).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let used = ticks.saturating_sub(prev_ticks) as f64 / CLOCK_TICKS_PER_SEC;
        percent(used, elapsed)
    }
}

fn percent(part: f64, whole: f64) -> Option<f64> {
    if whole <= 0.0 {
        return None;
    }
    Some((part / whole * 100.0).clamp(0.0, 100.0))
}

/// Value in kB of a `Key:   1234 kB` line.
fn kib_field(text: &str, key: &str) -> Option<u64> {
    text.lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

/// utime + stime from `/proc/<pid>/stat`. The command name may contain
/// spaces, so fields are counted from the closing parenthesis.
fn cpu_ticks(stat: &str) -> Option<u64> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    let mut fields = after_comm.split_whitespace();
    // Fields after comm start at #3 (state); utime is #14, stime #15.
    let utime: u64 = fields.nth(11)?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some(utime + stime)
}
