//! In-memory reference implementation of the store collaborators
//!
//! Backs the engine in tests and local runs. The change feed is a broadcast
//! channel standing in for the document store's push subscription; vector
//! search is a linear cosine-similarity scan.

use crate::error::StoreError;
use crate::types::customer::CustomerProfile;
use crate::types::model::{ModelStatus, Outcome, PerformanceRecord, RiskModel};
use crate::types::transaction::Transaction;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::stream::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::warn;

use super::{
    ChangeOp, CustomerStore, ModelChange, ModelChangeFeed, ModelStore, SimilarTransaction,
    TransactionFilter, TransactionStore,
};

const CHANGE_FEED_CAPACITY: usize = 256;

/// In-process store implementing every collaborator trait.
pub struct InMemoryStore {
    customers: DashMap<String, CustomerProfile>,
    transactions: RwLock<Vec<(Transaction, Option<Vec<f32>>)>>,
    models: RwLock<Vec<RiskModel>>,
    performance: RwLock<Vec<PerformanceRecord>>,
    changes: broadcast::Sender<ModelChange>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            customers: DashMap::new(),
            transactions: RwLock::new(Vec::new()),
            models: RwLock::new(Vec::new()),
            performance: RwLock::new(Vec::new()),
            changes,
        }
    }

    pub fn insert_customer(&self, profile: CustomerProfile) {
        self.customers.insert(profile.customer_id.clone(), profile);
    }

    fn emit(&self, op: ChangeOp, model: &RiskModel) {
        // No receivers is fine; events are only for live subscribers.
        let _ = self.changes.send(ModelChange {
            op,
            model: Some(model.clone()),
            model_id: model.model_id.clone(),
            version: model.version,
        });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic embedding provider hashing character trigrams into a fixed
/// dimension. A stand-in for a real embedding model: equal texts embed
/// identically and near-equal texts land close, which is all the similarity
/// path needs outside production.
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl super::EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];
        let bytes = text.as_bytes();
        for window in bytes.windows(3) {
            let mut hash: u64 = 1469598103934665603;
            for byte in window {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(1099511628211);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn find_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        Ok(self.customers.get(customer_id).map(|c| c.clone()))
    }

    async fn apply_risk_feedback(
        &self,
        customer_id: &str,
        flags: &[String],
        increment: f64,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| StoreError::NotFound(format!("customer {customer_id}")))?;

        for flag in flags {
            if !entry.risk_profile.risk_factors.contains(flag) {
                entry.risk_profile.risk_factors.push(flag.clone());
            }
        }
        let bumped = entry.risk_profile.overall_risk_score + increment.max(0.0);
        entry.risk_profile.overall_risk_score = bumped.min(100.0);
        entry.risk_profile.last_risk_assessment = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn insert_transaction(
        &self,
        tx: &Transaction,
        embedding: Option<Vec<f32>>,
    ) -> Result<(), StoreError> {
        self.transactions.write().push((tx.clone(), embedding));
        Ok(())
    }

    async fn count_recent(
        &self,
        customer_id: &str,
        end: DateTime<Utc>,
        window: Duration,
    ) -> Result<usize, StoreError> {
        let start = end - window;
        let count = self
            .transactions
            .read()
            .iter()
            .filter(|(tx, _)| {
                tx.customer_id.as_deref() == Some(customer_id)
                    && tx.timestamp >= start
                    && tx.timestamp < end
            })
            .count();
        Ok(count)
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        Ok(self.transactions.read().len() as u64)
    }

    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SimilarTransaction>, StoreError> {
        let mut scored: Vec<SimilarTransaction> = self
            .transactions
            .read()
            .iter()
            .filter_map(|(tx, stored)| {
                let stored = stored.as_ref()?;
                Some(SimilarTransaction {
                    transaction_id: tx.transaction_id.clone(),
                    timestamp: tx.timestamp,
                    amount: tx.amount,
                    merchant: tx.merchant.clone(),
                    transaction_type: tx.transaction_type.clone(),
                    payment_method: tx.payment_method.clone(),
                    risk_assessment: tx.risk_assessment.clone(),
                    similarity: cosine_similarity(embedding, stored),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut matched: Vec<Transaction> = self
            .transactions
            .read()
            .iter()
            .map(|(tx, _)| tx)
            .filter(|tx| {
                if let Some(id) = &filter.customer_id {
                    if tx.customer_id.as_deref() != Some(id.as_str()) {
                        return false;
                    }
                }
                if let Some(start) = filter.start {
                    if tx.timestamp < start {
                        return false;
                    }
                }
                if let Some(end) = filter.end {
                    if tx.timestamp > end {
                        return false;
                    }
                }
                if let Some(min) = filter.min_amount {
                    if tx.amount < min {
                        return false;
                    }
                }
                if let Some(max) = filter.max_amount {
                    if tx.amount > max {
                        return false;
                    }
                }
                if let Some(level) = filter.risk_level {
                    if tx.risk_assessment.as_ref().map(|r| r.level) != Some(level) {
                        return false;
                    }
                }
                if let Some(flag) = &filter.flag {
                    let has_flag = tx
                        .risk_assessment
                        .as_ref()
                        .is_some_and(|r| r.flags.contains(flag));
                    if !has_flag {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if filter.limit > 0 {
            matched.truncate(filter.limit);
        }
        Ok(matched)
    }
}

#[async_trait]
impl ModelStore for InMemoryStore {
    async fn insert_model(&self, model: &RiskModel) -> Result<(), StoreError> {
        {
            let mut models = self.models.write();
            if models
                .iter()
                .any(|m| m.model_id == model.model_id && m.version == model.version)
            {
                return Err(StoreError::Conflict(format!(
                    "model {} v{} already exists",
                    model.model_id, model.version
                )));
            }
            models.push(model.clone());
        }
        self.emit(ChangeOp::Insert, model);
        Ok(())
    }

    async fn replace_model(&self, model: &RiskModel) -> Result<(), StoreError> {
        {
            let mut models = self.models.write();
            let slot = models
                .iter_mut()
                .find(|m| m.model_id == model.model_id && m.version == model.version)
                .ok_or_else(|| {
                    StoreError::NotFound(format!("model {} v{}", model.model_id, model.version))
                })?;
            *slot = model.clone();
        }
        self.emit(ChangeOp::Replace, model);
        Ok(())
    }

    async fn find_model(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<Option<RiskModel>, StoreError> {
        let models = self.models.read();
        let found = match version {
            Some(v) => models
                .iter()
                .find(|m| m.model_id == model_id && m.version == v),
            None => models
                .iter()
                .filter(|m| m.model_id == model_id && m.status != ModelStatus::Archived)
                .max_by_key(|m| m.version),
        };
        Ok(found.cloned())
    }

    async fn find_versions(&self, model_id: &str) -> Result<Vec<RiskModel>, StoreError> {
        let mut versions: Vec<RiskModel> = self
            .models
            .read()
            .iter()
            .filter(|m| m.model_id == model_id)
            .cloned()
            .collect();
        versions.sort_by_key(|m| m.version);
        Ok(versions)
    }

    async fn list_models(&self, status: Option<ModelStatus>) -> Result<Vec<RiskModel>, StoreError> {
        let mut listed: Vec<RiskModel> = self
            .models
            .read()
            .iter()
            .filter(|m| status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(listed)
    }

    async fn activate_exclusive(&self, model_id: &str, version: u32) -> Result<(), StoreError> {
        // The write lock makes the deactivate-all/activate-one sequence a
        // single all-or-nothing step: the target is checked before anything
        // is touched, and no reader can observe the intermediate state.
        let transitioned: Vec<RiskModel> = {
            let mut models = self.models.write();
            if !models
                .iter()
                .any(|m| m.model_id == model_id && m.version == version)
            {
                return Err(StoreError::NotFound(format!("model {model_id} v{version}")));
            }

            let now = Utc::now();
            let mut transitioned = Vec::new();
            for m in models.iter_mut() {
                if m.model_id == model_id && m.version == version {
                    m.status = ModelStatus::Active;
                    m.updated_at = now;
                    transitioned.push(m.clone());
                } else if m.status == ModelStatus::Active {
                    m.status = ModelStatus::Inactive;
                    m.updated_at = now;
                    transitioned.push(m.clone());
                }
            }
            transitioned
        };

        for model in &transitioned {
            self.emit(ChangeOp::Update, model);
        }
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<ModelChangeFeed, StoreError> {
        let rx = self.changes.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(change) => return Some((change, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "model change feed lagged, skipping events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn append_performance(&self, record: &PerformanceRecord) -> Result<(), StoreError> {
        self.performance.write().push(record.clone());
        Ok(())
    }

    async fn find_performance(
        &self,
        model_id: &str,
        version: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PerformanceRecord>, StoreError> {
        let records = self
            .performance
            .read()
            .iter()
            .filter(|r| {
                r.model_id == model_id
                    && r.model_version == version
                    && since.is_none_or(|cutoff| r.timestamp >= cutoff)
            })
            .cloned()
            .collect();
        Ok(records)
    }

    async fn record_outcome(
        &self,
        model_id: &str,
        transaction_id: &str,
        outcome: Outcome,
    ) -> Result<(), StoreError> {
        let mut records = self.performance.write();
        let record = records
            .iter_mut()
            .find(|r| r.model_id == model_id && r.transaction_id == transaction_id)
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "performance record for model {model_id}, transaction {transaction_id}"
                ))
            })?;

        if record.outcome.is_some() {
            return Err(StoreError::Conflict(format!(
                "outcome already recorded for transaction {transaction_id}"
            )));
        }
        record.outcome = Some(outcome);
        record.feedback_time = Some(Utc::now());
        Ok(())
    }
}
