//! Evaluation metrics and statistics tracking

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::info;

use crate::types::transaction::{RiskAssessment, RiskLevel};

/// Metrics collector for the evaluation pipeline
pub struct EvaluationMetrics {
    /// Total transactions evaluated
    pub transactions_evaluated: AtomicU64,
    /// Evaluations that came back high risk
    pub high_risk_evaluations: AtomicU64,
    /// Evaluations by risk level
    by_level: RwLock<HashMap<String, u64>>,
    /// Flag occurrence counts
    by_flag: RwLock<HashMap<String, u64>>,
    /// Evaluation latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Risk score distribution in buckets of ten points
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl EvaluationMetrics {
    pub fn new() -> Self {
        Self {
            transactions_evaluated: AtomicU64::new(0),
            high_risk_evaluations: AtomicU64::new(0),
            by_level: RwLock::new(HashMap::new()),
            by_flag: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one completed evaluation
    pub fn record(&self, assessment: &RiskAssessment, latency: Duration) {
        self.transactions_evaluated.fetch_add(1, Ordering::Relaxed);
        if assessment.level == RiskLevel::High {
            self.high_risk_evaluations.fetch_add(1, Ordering::Relaxed);
        }

        let level = format!("{:?}", assessment.level).to_lowercase();
        *self.by_level.write().entry(level).or_insert(0) += 1;

        {
            let mut by_flag = self.by_flag.write();
            for flag in &assessment.flags {
                *by_flag.entry(flag.clone()).or_insert(0) += 1;
            }
        }

        {
            let mut latencies = self.latencies.write();
            latencies.push(latency.as_micros() as u64);
            // Keep only the most recent window for memory efficiency
            if latencies.len() > 10_000 {
                latencies.drain(0..5_000);
            }
        }

        let bucket = ((assessment.score / 10.0) as usize).min(9);
        self.score_buckets.write()[bucket] += 1;
    }

    /// Get latency statistics
    pub fn latency_stats(&self) -> LatencyStats {
        let latencies = self.latencies.read();
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = latencies.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (evaluations per second)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_evaluated.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read()
    }

    /// Get evaluations by risk level
    pub fn by_level(&self) -> HashMap<String, u64> {
        self.by_level.read().clone()
    }

    /// Get flag occurrence counts
    pub fn by_flag(&self) -> HashMap<String, u64> {
        self.by_flag.read().clone()
    }

    /// Log a summary of everything collected so far
    pub fn log_summary(&self) {
        let evaluated = self.transactions_evaluated.load(Ordering::Relaxed);
        let high = self.high_risk_evaluations.load(Ordering::Relaxed);
        let high_rate = if evaluated > 0 {
            high as f64 / evaluated as f64 * 100.0
        } else {
            0.0
        };
        let latency = self.latency_stats();

        info!(
            evaluated,
            high_risk = high,
            high_risk_rate = format!("{high_rate:.1}%"),
            throughput = format!("{:.1}/s", self.throughput()),
            latency_mean_us = latency.mean_us,
            latency_p95_us = latency.p95_us,
            latency_p99_us = latency.p99_us,
            "evaluation metrics summary"
        );

        for (level, count) in self.by_level() {
            let pct = if evaluated > 0 {
                count as f64 / evaluated as f64 * 100.0
            } else {
                0.0
            };
            info!(level, count, pct = format!("{pct:.1}%"), "evaluations by level");
        }
        for (flag, count) in self.by_flag() {
            info!(flag, count, "flag occurrences");
        }
    }
}

impl Default for EvaluationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluation latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: std::sync::Arc<EvaluationMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<EvaluationMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Log summaries until the task is aborted
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.log_summary();
        }
    }
}
