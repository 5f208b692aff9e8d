//! Model performance tracking
//!
//! Every evaluation appends a usage record; operators later report the
//! confirmed outcome, exactly once per transaction. Summaries aggregate the
//! records into average score, per-flag firing rates and false positive /
//! negative rates against the model's flag threshold.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::{LifecycleError, StoreError};
use crate::store::ModelStore;
use crate::types::model::{Outcome, PerformanceRecord, PerformanceSummary, RiskModel};

/// Flag threshold assumed when a model does not carry one.
const DEFAULT_FLAG_THRESHOLD: f64 = 60.0;

/// Reporting window for performance summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Day,
    Week,
    Month,
    All,
}

impl Timeframe {
    fn cutoff(&self) -> Option<chrono::DateTime<Utc>> {
        let now = Utc::now();
        match self {
            Timeframe::Day => Some(now - Duration::hours(24)),
            Timeframe::Week => Some(now - Duration::days(7)),
            Timeframe::Month => Some(now - Duration::days(30)),
            Timeframe::All => None,
        }
    }
}

/// Side-by-side comparison of two model summaries.
#[derive(Debug, Clone)]
pub struct ModelComparison {
    pub timeframe: Timeframe,
    pub first: PerformanceSummary,
    pub second: PerformanceSummary,
    /// `first - second` for each metric both sides report.
    pub differences: HashMap<String, f64>,
    /// Per-flag firing-rate difference in percentage points.
    pub risk_factor_differences: HashMap<String, f64>,
}

/// Records model usage and aggregates it into summaries.
pub struct PerformanceTracker {
    store: Arc<dyn ModelStore>,
}

impl PerformanceTracker {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    /// Append a usage record for one evaluation.
    pub async fn record(
        &self,
        model: &RiskModel,
        customer_id: &str,
        transaction_id: &str,
        risk_score: f64,
        risk_factors: Vec<String>,
    ) -> Result<(), LifecycleError> {
        let record =
            PerformanceRecord::new(model, customer_id, transaction_id, risk_score, risk_factors);
        self.store.append_performance(&record).await?;
        Ok(())
    }

    /// Report the confirmed outcome of a scored transaction.
    ///
    /// Exactly-once: a second report for the same transaction is rejected.
    pub async fn record_outcome(
        &self,
        model_id: &str,
        transaction_id: &str,
        outcome: Outcome,
    ) -> Result<(), LifecycleError> {
        match self
            .store
            .record_outcome(model_id, transaction_id, outcome)
            .await
        {
            Ok(()) => {
                info!(model = %model_id, transaction = %transaction_id, ?outcome, "outcome recorded");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(LifecycleError::RecordNotFound {
                model_id: model_id.to_string(),
                transaction_id: transaction_id.to_string(),
            }),
            Err(StoreError::Conflict(_)) => Err(LifecycleError::OutcomeAlreadySet {
                transaction_id: transaction_id.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Summarize usage of a model version over a timeframe.
    ///
    /// False positive rate: share of outcome-bearing records scored at or
    /// above the flag threshold that turned out legitimate. False negative
    /// rate: share scored below it that turned out fraudulent.
    pub async fn summarize(
        &self,
        model_id: &str,
        version: Option<u32>,
        timeframe: Timeframe,
    ) -> Result<PerformanceSummary, LifecycleError> {
        let model = self
            .store
            .find_model(model_id, version)
            .await?
            .ok_or_else(|| LifecycleError::ModelNotFound {
                model_id: model_id.to_string(),
            })?;

        let records = self
            .store
            .find_performance(&model.model_id, model.version, timeframe.cutoff())
            .await?;

        Ok(summarize_records(&model, &records))
    }

    /// Compare two models over the same timeframe.
    pub async fn compare(
        &self,
        model_id: &str,
        other_model_id: &str,
        timeframe: Timeframe,
    ) -> Result<ModelComparison, LifecycleError> {
        let first = self.summarize(model_id, None, timeframe).await?;
        let second = self.summarize(other_model_id, None, timeframe).await?;

        let mut differences = HashMap::new();
        let metrics = [
            ("avg_risk_score", first.avg_risk_score, second.avg_risk_score),
            (
                "false_positive_rate",
                first.false_positive_rate,
                second.false_positive_rate,
            ),
            (
                "false_negative_rate",
                first.false_negative_rate,
                second.false_negative_rate,
            ),
        ];
        for (name, a, b) in metrics {
            if let (Some(a), Some(b)) = (a, b) {
                differences.insert(name.to_string(), a - b);
            }
        }

        let mut risk_factor_differences = HashMap::new();
        for (factor, pct) in &first.risk_factor_distribution {
            let other = second
                .risk_factor_distribution
                .get(factor)
                .copied()
                .unwrap_or(0.0);
            risk_factor_differences.insert(factor.clone(), pct - other);
        }

        Ok(ModelComparison {
            timeframe,
            first,
            second,
            differences,
            risk_factor_differences,
        })
    }
}

fn summarize_records(model: &RiskModel, records: &[PerformanceRecord]) -> PerformanceSummary {
    if records.is_empty() {
        return PerformanceSummary {
            model_id: model.model_id.clone(),
            version: model.version,
            total_evaluations: 0,
            avg_risk_score: None,
            risk_factor_distribution: HashMap::new(),
            false_positive_rate: None,
            false_negative_rate: None,
        };
    }

    let total = records.len() as f64;
    let avg_risk_score = records.iter().map(|r| r.risk_score).sum::<f64>() / total;

    let mut factor_counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        for factor in &record.risk_factors {
            *factor_counts.entry(factor.clone()).or_default() += 1;
        }
    }
    let risk_factor_distribution = factor_counts
        .into_iter()
        .map(|(factor, count)| (factor, count as f64 / total * 100.0))
        .collect();

    let flag_threshold = model
        .thresholds
        .get("flag")
        .copied()
        .unwrap_or(DEFAULT_FLAG_THRESHOLD);

    let with_outcome: Vec<&PerformanceRecord> =
        records.iter().filter(|r| r.outcome.is_some()).collect();

    let (false_positive_rate, false_negative_rate) = if with_outcome.is_empty() {
        (None, None)
    } else {
        let total_with_outcome = with_outcome.len() as f64;
        let false_positives = with_outcome
            .iter()
            .filter(|r| r.risk_score >= flag_threshold && r.outcome == Some(Outcome::Legitimate))
            .count() as f64;
        let false_negatives = with_outcome
            .iter()
            .filter(|r| r.risk_score < flag_threshold && r.outcome == Some(Outcome::Fraud))
            .count() as f64;
        (
            Some(false_positives / total_with_outcome * 100.0),
            Some(false_negatives / total_with_outcome * 100.0),
        )
    };

    PerformanceSummary {
        model_id: model.model_id.clone(),
        version: model.version,
        total_evaluations: records.len() as u64,
        avg_risk_score: Some(avg_risk_score),
        risk_factor_distribution,
        false_positive_rate,
        false_negative_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    async fn seeded_tracker() -> (Arc<InMemoryStore>, PerformanceTracker, RiskModel) {
        let store = Arc::new(InMemoryStore::new());
        let model = RiskModel::default_model();
        store.insert_model(&model).await.unwrap();
        let tracker = PerformanceTracker::new(store.clone());
        (store, tracker, model)
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let (_, tracker, model) = seeded_tracker().await;

        let summary = tracker
            .summarize(&model.model_id, None, Timeframe::All)
            .await
            .unwrap();
        assert_eq!(summary.total_evaluations, 0);
        assert!(summary.avg_risk_score.is_none());
        assert!(summary.false_positive_rate.is_none());
    }

    #[tokio::test]
    async fn test_summary_aggregates_records() {
        let (_, tracker, model) = seeded_tracker().await;

        tracker
            .record(&model, "c1", "t1", 80.0, vec!["unusual_amount".to_string()])
            .await
            .unwrap();
        tracker
            .record(&model, "c1", "t2", 20.0, vec![])
            .await
            .unwrap();
        tracker
            .record(&model, "c2", "t3", 65.0, vec!["unusual_amount".to_string()])
            .await
            .unwrap();

        // t1 flagged but legitimate (false positive), t2 low and fraud
        // (false negative), t3 flagged and fraud (true positive)
        tracker
            .record_outcome(&model.model_id, "t1", Outcome::Legitimate)
            .await
            .unwrap();
        tracker
            .record_outcome(&model.model_id, "t2", Outcome::Fraud)
            .await
            .unwrap();
        tracker
            .record_outcome(&model.model_id, "t3", Outcome::Fraud)
            .await
            .unwrap();

        let summary = tracker
            .summarize(&model.model_id, None, Timeframe::All)
            .await
            .unwrap();
        assert_eq!(summary.total_evaluations, 3);
        assert!((summary.avg_risk_score.unwrap() - 55.0).abs() < 1e-9);
        assert!(
            (summary.risk_factor_distribution["unusual_amount"] - 2.0 / 3.0 * 100.0).abs() < 1e-9
        );
        assert!((summary.false_positive_rate.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.false_negative_rate.unwrap() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_outcome_errors_are_specific() {
        let (_, tracker, model) = seeded_tracker().await;
        tracker
            .record(&model, "c1", "t1", 80.0, vec![])
            .await
            .unwrap();

        let err = tracker
            .record_outcome(&model.model_id, "ghost", Outcome::Fraud)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::RecordNotFound { .. }));

        tracker
            .record_outcome(&model.model_id, "t1", Outcome::Fraud)
            .await
            .unwrap();
        let err = tracker
            .record_outcome(&model.model_id, "t1", Outcome::Legitimate)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::OutcomeAlreadySet { .. }));
    }

    #[tokio::test]
    async fn test_compare_reports_differences() {
        let store = Arc::new(InMemoryStore::new());
        let mut a = RiskModel::default_model();
        a.model_id = "a".to_string();
        let mut b = RiskModel::default_model();
        b.model_id = "b".to_string();
        b.status = crate::types::model::ModelStatus::Inactive;
        store.insert_model(&a).await.unwrap();
        store.insert_model(&b).await.unwrap();

        let tracker = PerformanceTracker::new(store);
        tracker.record(&a, "c", "t1", 60.0, vec![]).await.unwrap();
        tracker.record(&b, "c", "t2", 40.0, vec![]).await.unwrap();

        let comparison = tracker.compare("a", "b", Timeframe::All).await.unwrap();
        assert!((comparison.differences["avg_risk_score"] - 20.0).abs() < 1e-9);
    }
}
