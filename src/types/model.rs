//! Risk model and model performance data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a risk model version.
///
/// Transitions: `draft -> active <-> inactive`, any non-archived state may be
/// archived (subject to the sole-active rule), and `archived -> inactive` via
/// restore. Archived is otherwise terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Draft,
    Active,
    Inactive,
    Archived,
}

/// Per-factor configuration carried by a risk model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactorConfig {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_factor_active")]
    pub active: bool,
}

fn default_factor_active() -> bool {
    true
}

/// Aggregate performance metrics for a model version.
///
/// All fields stay unset until enough outcome feedback has accumulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub false_positive_rate: Option<f64>,
    pub false_negative_rate: Option<f64>,
    pub avg_processing_time_ms: Option<f64>,
}

/// A versioned risk scoring configuration.
///
/// Identified by `(model_id, version)`; version is strictly increasing per
/// model id. At most one model across the whole store is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModel {
    pub model_id: String,
    pub version: u32,
    pub status: ModelStatus,
    pub description: String,
    /// Factor id -> scoring weight
    pub weights: HashMap<String, f64>,
    /// Named score cutoffs, e.g. `flag` and `block`
    pub thresholds: HashMap<String, f64>,
    pub risk_factors: Vec<RiskFactorConfig>,
    #[serde(default)]
    pub performance: ModelPerformance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RiskModel {
    /// Threshold for a factor id, if the factor is configured and active.
    pub fn factor_threshold(&self, factor_id: &str) -> Option<f64> {
        self.risk_factors
            .iter()
            .find(|f| f.id == factor_id && f.active)
            .and_then(|f| f.threshold)
    }

    /// The default model installed when the store holds no active model.
    pub fn default_model() -> Self {
        let now = Utc::now();
        let weights = HashMap::from([
            ("amount".to_string(), 0.25),
            ("location".to_string(), 0.25),
            ("device".to_string(), 0.20),
            ("velocity".to_string(), 0.15),
            ("pattern".to_string(), 0.15),
        ]);
        let thresholds = HashMap::from([
            ("flag".to_string(), 60.0),
            ("block".to_string(), 85.0),
        ]);
        let risk_factors = vec![
            RiskFactorConfig {
                id: "amount".to_string(),
                description: "Transaction amount far above the customer average".to_string(),
                threshold: Some(3.0),
                active: true,
            },
            RiskFactorConfig {
                id: "location".to_string(),
                description: "Transaction from an unusual location".to_string(),
                threshold: Some(500.0),
                active: true,
            },
            RiskFactorConfig {
                id: "device".to_string(),
                description: "Transaction from an unknown device".to_string(),
                threshold: None,
                active: true,
            },
            RiskFactorConfig {
                id: "velocity".to_string(),
                description: "Multiple transactions in a short timeframe".to_string(),
                threshold: Some(5.0),
                active: true,
            },
            RiskFactorConfig {
                id: "pattern".to_string(),
                description: "Transaction resembles a known fraud pattern".to_string(),
                threshold: None,
                active: false,
            },
        ];

        Self {
            model_id: "default-risk-model".to_string(),
            version: 1,
            status: ModelStatus::Active,
            description: "Default risk scoring model".to_string(),
            weights,
            thresholds,
            risk_factors,
            performance: ModelPerformance::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Confirmed outcome of a previously scored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Legitimate,
    Fraud,
}

/// Append-only log entry recording one model evaluation.
///
/// `outcome` starts unset and is written exactly once by the out-of-band
/// feedback call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub record_id: String,
    pub model_id: String,
    pub model_version: u32,
    pub customer_id: String,
    pub transaction_id: String,
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub feedback_time: Option<DateTime<Utc>>,
}

impl PerformanceRecord {
    pub fn new(
        model: &RiskModel,
        customer_id: impl Into<String>,
        transaction_id: impl Into<String>,
        risk_score: f64,
        risk_factors: Vec<String>,
    ) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            model_id: model.model_id.clone(),
            model_version: model.version,
            customer_id: customer_id.into(),
            transaction_id: transaction_id.into(),
            risk_score,
            risk_factors,
            timestamp: Utc::now(),
            outcome: None,
            feedback_time: None,
        }
    }
}

/// Aggregated usage metrics for one model version over a timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub model_id: String,
    pub version: u32,
    pub total_evaluations: u64,
    pub avg_risk_score: Option<f64>,
    /// Factor id -> percentage of evaluations where the factor fired
    pub risk_factor_distribution: HashMap<String, f64>,
    pub false_positive_rate: Option<f64>,
    pub false_negative_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_shape() {
        let model = RiskModel::default_model();
        assert_eq!(model.version, 1);
        assert_eq!(model.status, ModelStatus::Active);
        assert_eq!(model.weights.len(), 5);
        assert_eq!(model.thresholds.get("flag"), Some(&60.0));
        assert!(model.performance.false_positive_rate.is_none());
    }

    #[test]
    fn test_factor_threshold_respects_active_flag() {
        let model = RiskModel::default_model();
        assert_eq!(model.factor_threshold("velocity"), Some(5.0));
        // pattern factor is configured but inactive
        assert_eq!(model.factor_threshold("pattern"), None);
        assert_eq!(model.factor_threshold("nonexistent"), None);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ModelStatus::Archived).unwrap(),
            "\"archived\""
        );
        let status: ModelStatus = serde_json::from_str("\"draft\"").unwrap();
        assert_eq!(status, ModelStatus::Draft);
    }

    #[test]
    fn test_performance_record_starts_without_outcome() {
        let model = RiskModel::default_model();
        let record = PerformanceRecord::new(&model, "cust_1", "tx_1", 42.0, vec![]);
        assert!(record.outcome.is_none());
        assert!(record.feedback_time.is_none());
        assert_eq!(record.model_version, 1);
    }
}
