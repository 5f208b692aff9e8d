//! Risk evaluation pipeline
//!
//! `RiskEvaluator` wires the detectors, the aggregator and the similarity
//! ranker to the store collaborators and the live model snapshot. Evaluation
//! is fatal only on customer-store failure; the similarity path degrades to
//! a neutral signal when the embedding provider or vector search is down.

use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tracing::{info, warn};

use crate::config::{DetectionConfig, FactorWeights, SimilarityConfig};
use crate::engine::aggregator::{self, FactorRisks, FEEDBACK_INCREMENT_PER_FLAG};
use crate::engine::detectors::{self, DetectorOutcome};
use crate::engine::similarity;
use crate::error::EvaluateError;
use crate::lifecycle::performance::PerformanceTracker;
use crate::lifecycle::propagator::CurrentModel;
use crate::metrics::EvaluationMetrics;
use crate::store::{CustomerStore, EmbeddingProvider, SimilarTransaction, TransactionStore};
use crate::types::model::RiskModel;
use crate::types::transaction::{
    Disposition, RiskAssessment, RiskDiagnostics, RiskLevel, Transaction,
};

/// Outcome of the peer-similarity path.
///
/// `available` is false when the signal degraded to its neutral default
/// because a collaborator was unreachable.
#[derive(Debug, Clone)]
pub struct SimilarityReport {
    pub neighbors: Vec<SimilarTransaction>,
    pub risk_score: f64,
    pub available: bool,
}

impl SimilarityReport {
    fn degraded() -> Self {
        Self {
            neighbors: Vec::new(),
            risk_score: 0.5,
            available: false,
        }
    }
}

/// Display-oriented re-ranking of a neighbor set.
#[derive(Debug, Clone)]
pub struct DisplayRanking {
    pub neighbors: Vec<SimilarTransaction>,
    pub risk_score: f64,
}

/// Scores transactions against the active risk model.
pub struct RiskEvaluator {
    customers: Arc<dyn CustomerStore>,
    transactions: Arc<dyn TransactionStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    model: CurrentModel,
    tracker: Arc<PerformanceTracker>,
    metrics: Arc<EvaluationMetrics>,
    detection: DetectionConfig,
    similarity: SimilarityConfig,
}

impl RiskEvaluator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customers: Arc<dyn CustomerStore>,
        transactions: Arc<dyn TransactionStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        model: CurrentModel,
        tracker: Arc<PerformanceTracker>,
        metrics: Arc<EvaluationMetrics>,
        detection: DetectionConfig,
        similarity: SimilarityConfig,
    ) -> Self {
        Self {
            customers,
            transactions,
            embeddings,
            model,
            tracker,
            metrics,
            detection,
            similarity,
        }
    }

    /// Evaluate a transaction and produce its risk assessment.
    ///
    /// Missing customer data short-circuits to a documented default score;
    /// only a customer-store failure is surfaced to the caller.
    pub async fn evaluate(&self, tx: &Transaction) -> Result<RiskAssessment, EvaluateError> {
        let started = Instant::now();

        let customer_id = match tx.customer_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                warn!(transaction = %tx.transaction_id, "transaction carries no customer reference");
                let assessment = short_circuit(
                    50.0,
                    RiskLevel::Medium,
                    detectors::FLAG_MISSING_CUSTOMER_REFERENCE,
                );
                self.metrics.record(&assessment, started.elapsed());
                return Ok(assessment);
            }
        };

        let customer = match self.customers.find_customer(customer_id).await? {
            Some(customer) => customer,
            None => {
                warn!(customer = %customer_id, "customer not found, scoring without profile");
                let assessment =
                    short_circuit(70.0, RiskLevel::High, detectors::FLAG_CUSTOMER_NOT_FOUND);
                self.metrics.record(&assessment, started.elapsed());
                return Ok(assessment);
            }
        };

        let model = self.model.snapshot();
        let detection = self.effective_detection(&model);

        let amount = if factor_enabled(&model, "amount") {
            detectors::check_amount(tx, &customer, &detection)
        } else {
            DetectorOutcome::CLEAR
        };
        let location = if factor_enabled(&model, "location") {
            detectors::check_location(tx, &customer, &detection)
        } else {
            DetectorOutcome::CLEAR
        };
        let device = if factor_enabled(&model, "device") {
            detectors::check_device(tx, &customer)
        } else {
            DetectorOutcome::CLEAR
        };
        let velocity = if factor_enabled(&model, "velocity") {
            let window = Duration::minutes(detection.velocity_window_minutes);
            let recent = self
                .transactions
                .count_recent(customer_id, tx.timestamp, window)
                .await?;
            detectors::check_velocity(recent, &detection)
        } else {
            DetectorOutcome::CLEAR
        };

        let mut flags = Vec::new();
        if amount.anomalous {
            flags.push(detectors::FLAG_UNUSUAL_AMOUNT.to_string());
        }
        if location.anomalous {
            flags.push(detectors::FLAG_UNEXPECTED_LOCATION.to_string());
        }
        if device.anomalous {
            flags.push(detectors::FLAG_UNKNOWN_DEVICE.to_string());
        }
        if velocity.anomalous {
            flags.push(detectors::FLAG_VELOCITY_ALERT.to_string());
        }

        let factors = FactorRisks {
            amount: amount.contribution(),
            location: location.contribution(),
            device: device.contribution(),
            velocity: velocity.contribution(),
            pattern: 0.0,
        };

        let customer_base_risk = customer.risk_profile.overall_risk_score;
        let weights = effective_weights(&model, &self.detection.weights);
        let score = aggregator::combine(&factors, &weights, customer_base_risk);
        let level = RiskLevel::from_score(score);

        let assessment = RiskAssessment {
            score: aggregator::round2(score),
            level,
            flags: flags.clone(),
            disposition: level.into(),
            diagnostics: RiskDiagnostics {
                customer_base_risk: aggregator::round2(customer_base_risk),
                transaction_factors: crate::types::transaction::FactorBreakdown {
                    amount: aggregator::round2(factors.amount * 100.0),
                    location: aggregator::round2(factors.location * 100.0),
                    device: aggregator::round2(factors.device * 100.0),
                    velocity: aggregator::round2(factors.velocity * 100.0),
                    pattern: 0.0,
                },
            },
        };

        if level == RiskLevel::High {
            self.spawn_customer_feedback(customer_id, flags.clone());
        }
        self.spawn_performance_record(&model, customer_id, tx, &assessment);

        info!(
            transaction = %tx.transaction_id,
            customer = %customer_id,
            score = assessment.score,
            level = ?level,
            flags = flags.len(),
            "transaction evaluated"
        );
        self.metrics.record(&assessment, started.elapsed());
        Ok(assessment)
    }

    /// Find the transaction's nearest historical neighbors and score them.
    ///
    /// Collaborator failures on this path degrade to a neutral report
    /// instead of failing the evaluation.
    pub async fn similar_transactions(&self, tx: &Transaction) -> SimilarityReport {
        let text = transaction_text(tx);

        let embedding = match self.embeddings.embed(&text).await {
            Ok(embedding) => embedding,
            Err(error) => {
                warn!(%error, "embedding provider unavailable, degrading similarity signal");
                return SimilarityReport::degraded();
            }
        };

        let neighbors = match self
            .transactions
            .nearest_neighbors(&embedding, self.similarity.neighbor_limit)
            .await
        {
            Ok(neighbors) => neighbors,
            Err(error) => {
                warn!(%error, "vector search failed, degrading similarity signal");
                return SimilarityReport::degraded();
            }
        };

        let corpus_size = if neighbors.is_empty() {
            self.transactions.count_all().await.unwrap_or(0)
        } else {
            0
        };

        let risk_score =
            similarity::similarity_risk_score(tx.amount, &neighbors, corpus_size, &self.similarity);
        info!(
            transaction = %tx.transaction_id,
            neighbors = neighbors.len(),
            risk_score,
            "similarity signal computed"
        );

        SimilarityReport {
            neighbors,
            risk_score,
            available: true,
        }
    }

    /// Re-rank a neighbor set for display and recompute its risk signal.
    pub async fn display_ranking(
        &self,
        tx: &Transaction,
        neighbors: &[SimilarTransaction],
    ) -> DisplayRanking {
        let unusual = similarity::is_unusual(tx);
        let displayed = similarity::rank_for_display(unusual, neighbors, &self.similarity);

        let corpus_size = if displayed.is_empty() {
            self.transactions.count_all().await.unwrap_or(0)
        } else {
            0
        };
        let risk_score =
            similarity::display_risk_score(tx.amount, &displayed, corpus_size, &self.similarity);

        DisplayRanking {
            neighbors: displayed,
            risk_score,
        }
    }

    /// Detection thresholds with the active model's per-factor overrides.
    fn effective_detection(&self, model: &RiskModel) -> DetectionConfig {
        let mut detection = self.detection.clone();
        if let Some(threshold) = model.factor_threshold("amount") {
            detection.amount_z_threshold = threshold;
        }
        if let Some(threshold) = model.factor_threshold("location") {
            detection.max_location_distance_km = threshold;
        }
        if let Some(threshold) = model.factor_threshold("velocity") {
            if threshold >= 1.0 {
                detection.velocity_threshold = threshold as usize;
            }
        }
        detection
    }

    fn spawn_customer_feedback(&self, customer_id: &str, flags: Vec<String>) {
        let customers = Arc::clone(&self.customers);
        let customer_id = customer_id.to_string();
        let increment = FEEDBACK_INCREMENT_PER_FLAG * flags.len() as f64;
        tokio::spawn(async move {
            if let Err(error) = customers
                .apply_risk_feedback(&customer_id, &flags, increment)
                .await
            {
                warn!(customer = %customer_id, %error, "customer risk feedback dropped");
            }
        });
    }

    fn spawn_performance_record(
        &self,
        model: &Arc<RiskModel>,
        customer_id: &str,
        tx: &Transaction,
        assessment: &RiskAssessment,
    ) {
        let tracker = Arc::clone(&self.tracker);
        let model = Arc::clone(model);
        let customer_id = customer_id.to_string();
        let transaction_id = tx.transaction_id.clone();
        let score = assessment.score;
        let flags = assessment.flags.clone();
        tokio::spawn(async move {
            if let Err(error) = tracker
                .record(&model, &customer_id, &transaction_id, score, flags)
                .await
            {
                warn!(transaction = %transaction_id, %error, "performance record dropped");
            }
        });
    }
}

fn short_circuit(score: f64, level: RiskLevel, flag: &str) -> RiskAssessment {
    RiskAssessment {
        score,
        level,
        flags: vec![flag.to_string()],
        disposition: Disposition::Suspicious,
        diagnostics: RiskDiagnostics::default(),
    }
}

fn factor_enabled(model: &RiskModel, factor_id: &str) -> bool {
    model
        .risk_factors
        .iter()
        .find(|f| f.id == factor_id)
        .map_or(true, |f| f.active)
}

fn effective_weights(model: &RiskModel, defaults: &FactorWeights) -> FactorWeights {
    let weight = |id: &str, fallback: f64| model.weights.get(id).copied().unwrap_or(fallback);
    FactorWeights {
        amount: weight("amount", defaults.amount),
        location: weight("location", defaults.location),
        device: weight("device", defaults.device),
        velocity: weight("velocity", defaults.velocity),
        pattern: weight("pattern", defaults.pattern),
    }
}

/// Canonical text rendering of a transaction for embedding.
///
/// The stored corpus is embedded from this exact shape, so retrieval quality
/// depends on keeping it stable.
pub fn transaction_text(tx: &Transaction) -> String {
    let device = tx
        .device_info
        .as_ref()
        .map(|d| format!("{}, {}, {}", d.device_type, d.os, d.browser))
        .unwrap_or_else(|| "N/A".to_string());

    let mut text = format!(
        "Transaction ID: {}\nAmount: {} {}\nMerchant: {}\nMerchant Category: {}\n\
         Transaction Type: {}\nPayment Method: {}\nLocation: {}, {}, {}\nDevice: {}\n",
        tx.transaction_id,
        tx.amount,
        tx.currency,
        tx.merchant.name,
        tx.merchant.category,
        tx.transaction_type,
        tx.payment_method,
        tx.location.city,
        tx.location.state,
        tx.location.country,
        device,
    );

    if let Some(risk) = &tx.risk_assessment {
        let flags = if risk.flags.is_empty() {
            "None".to_string()
        } else {
            risk.flags.join(", ")
        };
        text.push_str(&format!(
            "Risk Score: {}\nRisk Level: {:?}\nRisk Flags: {}\n",
            risk.score, risk.level, flags
        ));
    }

    text
}
