//! Collaborator interfaces: document store and embedding provider
//!
//! The persistence layer and the embedding model are external systems; the
//! engine only depends on the contracts below. [`memory`] provides the
//! in-process reference implementation used by tests.

pub mod memory;

use crate::error::{EmbeddingError, StoreError};
use crate::types::customer::CustomerProfile;
use crate::types::model::{ModelStatus, Outcome, PerformanceRecord, RiskModel};
use crate::types::transaction::{Merchant, RiskAssessment, RiskLevel, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use memory::{HashEmbedding, InMemoryStore};

/// Text-to-vector embedding provider.
///
/// May fail transiently; the similarity path degrades rather than aborting
/// the evaluation when it does.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed dimension of produced vectors.
    fn dimension(&self) -> usize;
}

/// Customer profile lookups and the one-way risk feedback write.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Resolve a customer by their identifier.
    ///
    /// "Not found" is a first-class outcome (`Ok(None)`), never a silent
    /// fallback to some other customer.
    async fn find_customer(&self, customer_id: &str)
        -> Result<Option<CustomerProfile>, StoreError>;

    /// Union `flags` into the customer's risk factors and raise their
    /// baseline score by `increment`. The baseline only ever goes up.
    async fn apply_risk_feedback(
        &self,
        customer_id: &str,
        flags: &[String],
        increment: f64,
    ) -> Result<(), StoreError>;
}

/// Filters for historical transaction queries.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub customer_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub flag: Option<String>,
    pub limit: usize,
}

/// A neighbor returned by the vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarTransaction {
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub merchant: Merchant,
    pub transaction_type: String,
    pub payment_method: String,
    pub risk_assessment: Option<RiskAssessment>,
    /// Vector search similarity score reported by the store
    pub similarity: f64,
}

/// Historical transaction persistence and the vector similarity primitive.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a transaction along with its embedding, if one was computed.
    async fn insert_transaction(
        &self,
        tx: &Transaction,
        embedding: Option<Vec<f32>>,
    ) -> Result<(), StoreError>;

    /// Transactions for `customer_id` in the window `[end - window, end)`.
    async fn count_recent(
        &self,
        customer_id: &str,
        end: DateTime<Utc>,
        window: Duration,
    ) -> Result<usize, StoreError>;

    /// Total transactions held, across all customers.
    async fn count_all(&self) -> Result<u64, StoreError>;

    /// Top-K nearest historical transactions by vector distance.
    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SimilarTransaction>, StoreError>;

    /// Filtered listing, newest first.
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;
}

/// Operation type carried by a model change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Replace,
    Delete,
}

/// One change-feed notification from the risk model collection.
#[derive(Debug, Clone)]
pub struct ModelChange {
    pub op: ChangeOp,
    /// Full document after the change; absent for deletes
    pub model: Option<RiskModel>,
    pub model_id: String,
    pub version: u32,
}

/// Push-based subscription to model collection writes.
pub type ModelChangeFeed = BoxStream<'static, ModelChange>;

/// Versioned risk model persistence, the atomic activation primitive, and
/// the model performance log.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn insert_model(&self, model: &RiskModel) -> Result<(), StoreError>;

    /// Replace the stored document for `(model_id, version)`.
    async fn replace_model(&self, model: &RiskModel) -> Result<(), StoreError>;

    /// Fetch a specific version, or the latest non-archived version when
    /// `version` is `None`.
    async fn find_model(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<Option<RiskModel>, StoreError>;

    /// Every stored version of `model_id`, any status.
    async fn find_versions(&self, model_id: &str) -> Result<Vec<RiskModel>, StoreError>;

    /// All models, optionally filtered by status, newest update first.
    async fn list_models(&self, status: Option<ModelStatus>) -> Result<Vec<RiskModel>, StoreError>;

    /// Deactivate every active model and activate `(model_id, version)`, as
    /// one all-or-nothing step.
    async fn activate_exclusive(&self, model_id: &str, version: u32) -> Result<(), StoreError>;

    /// Subscribe to insert/update/replace/delete events on the model
    /// collection.
    async fn subscribe_changes(&self) -> Result<ModelChangeFeed, StoreError>;

    async fn append_performance(&self, record: &PerformanceRecord) -> Result<(), StoreError>;

    /// Performance records for a model version, optionally bounded below by
    /// `since`.
    async fn find_performance(
        &self,
        model_id: &str,
        version: u32,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PerformanceRecord>, StoreError>;

    /// Record the confirmed outcome for a previously logged evaluation.
    ///
    /// Fails with [`StoreError::NotFound`] when no record matches and with
    /// [`StoreError::Conflict`] when the outcome was already written.
    async fn record_outcome(
        &self,
        model_id: &str,
        transaction_id: &str,
        outcome: Outcome,
    ) -> Result<(), StoreError>;
}
