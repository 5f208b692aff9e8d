//! Error types for the risk engine

use thiserror::Error;

/// Errors surfaced by the document store collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the embedding provider collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected embedding dimension: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}

/// Rejections from the risk model lifecycle.
///
/// Every variant is a synchronous, specific refusal with no partial state
/// change behind it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("risk model not found: {model_id}")]
    ModelNotFound { model_id: String },
    #[error("model {model_id} v{version} is already archived")]
    AlreadyArchived { model_id: String, version: u32 },
    #[error("model {model_id} v{version} is not archived")]
    NotArchived { model_id: String, version: u32 },
    #[error("cannot archive the only active model; activate another model first")]
    CannotArchiveOnlyActive,
    #[error("cannot activate an archived model")]
    CannotActivateArchived,
    #[error("status cannot be set to active through update; use the activation coordinator")]
    ActivationReserved,
    #[error("performance record not found for model {model_id}, transaction {transaction_id}")]
    RecordNotFound {
        model_id: String,
        transaction_id: String,
    },
    #[error("outcome already recorded for transaction {transaction_id}")]
    OutcomeAlreadySet { transaction_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fatal errors on the main evaluation path.
///
/// Input incompleteness and collaborator failures on the similarity path
/// degrade to defaults instead of producing these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluateError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
