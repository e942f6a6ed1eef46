//! Opt-in latency sampling for CLI commands and search stages.
//!
//! Samples are kept per thread; record them on the thread that will later
//! call [`collect_report`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

/// Per-operation latency percentiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpTiming {
    pub name: String,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub count: usize,
}

/// Aggregated timing report, operations sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimingReport {
    pub operations: Vec<OpTiming>,
}

thread_local! {
    static SAMPLES: RefCell<BTreeMap<String, Vec<Duration>>> = const { RefCell::new(BTreeMap::new()) };
}

static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns true when `RUNWAY_TIMING` is set to `1`, `true`, `yes` or `on`.
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("RUNWAY_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

/// Enable or disable collection. Disabling drops this thread's samples.
pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

pub fn clear_timings() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Run `f`, recording its wall time under `name` when collection is on.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    record(name, started.elapsed());
    result
}

/// Record an externally measured duration (e.g. from a worker thread).
pub fn record(name: &str, elapsed: Duration) {
    if !is_timing_enabled() {
        return;
    }
    SAMPLES.with(|samples| {
        samples
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(elapsed);
    });
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let grouped = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let operations = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            OpTiming {
                p50: percentile(&values, 50),
                p95: percentile(&values, 95),
                p99: percentile(&values, 99),
                count: values.len(),
                name,
            }
        })
        .collect();

    TimingReport { operations }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let operations: Vec<_> = self
            .operations
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "count": op.count,
                    "p50_us": op.p50.as_micros(),
                    "p95_us": op.p95.as_micros(),
                    "p99_us": op.p99.as_micros(),
                })
            })
            .collect();

        json!({ "operations": operations })
    }

    #[must_use]
    pub fn display_table(&self) -> String {
        use std::fmt::Write as _;

        if self.operations.is_empty() {
            return "No timing samples recorded.".to_string();
        }

        let mut out = String::new();
        out.push_str("operation                    count      p50      p95      p99\n");
        out.push_str("--------------------------------------------------------------\n");
        for op in &self.operations {
            let _ = writeln!(
                out,
                "{:<28} {:>6} {:>8} {:>8} {:>8}",
                op.name,
                op.count,
                format_duration(op.p50),
                format_duration(op.p95),
                format_duration(op.p99)
            );
        }
        out
    }
}

fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{}.{:03}s", micros / 1_000_000, (micros % 1_000_000) / 1_000)
    } else if micros >= 1_000 {
        format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
    } else {
        format!("{micros}us")
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_picks_nearest_rank() {
        let values: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        assert_eq!(percentile(&values, 50), Duration::from_millis(50));
        assert_eq!(percentile(&values, 95), Duration::from_millis(95));
        assert_eq!(percentile(&values, 99), Duration::from_millis(99));
        assert_eq!(percentile(&[], 50), Duration::ZERO);
    }

    #[test]
    fn records_only_when_enabled() {
        set_timing_enabled(false);
        record("search.keyword", Duration::from_millis(3));
        assert!(collect_report().is_empty());

        set_timing_enabled(true);
        record("search.keyword", Duration::from_millis(3));
        record("search.keyword", Duration::from_millis(5));
        let value = timed("search.fusion", || 7);
        assert_eq!(value, 7);

        let report = collect_report();
        set_timing_enabled(false);

        assert_eq!(report.operations.len(), 2);
        assert_eq!(report.operations[0].name, "search.fusion");
        assert_eq!(report.operations[1].name, "search.keyword");
        assert_eq!(report.operations[1].count, 2);
        assert!(report.display_table().contains("search.keyword"));
        assert_eq!(report.to_json()["operations"][1]["p99_us"], 5000);
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_micros(12)), "12us");
        assert_eq!(format_duration(Duration::from_micros(1_250)), "1.250ms");
        assert_eq!(format_duration(Duration::from_millis(2_500)), "2.500s");
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("ON"));
        assert!(is_truthy(" yes "));
        assert!(!is_truthy("0"));
    }
}
