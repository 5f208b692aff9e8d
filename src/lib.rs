//! Real-time transaction fraud risk engine
//!
//! Two coupled subsystems: the risk evaluation engine, which combines
//! independent anomaly detectors into a calibrated 0-100 score and ranks a
//! transaction against its nearest historical neighbors for a
//! peer-similarity signal, and the risk model lifecycle manager, a versioned
//! model registry with a single-active-model invariant and live propagation
//! of the active model to running evaluators.
//!
//! Persistence and the embedding model are external collaborators behind the
//! traits in [`store`]; [`store::InMemoryStore`] is the in-process reference
//! implementation.

pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod metrics;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use engine::{DisplayRanking, RiskEvaluator, SimilarityReport};
pub use error::{EvaluateError, LifecycleError, StoreError};
pub use lifecycle::{
    ActivationCoordinator, ActivationOutcome, CurrentModel, ModelDraft, ModelPropagator,
    ModelRegistry, ModelUpdate, PerformanceTracker, Timeframe,
};
pub use metrics::EvaluationMetrics;
pub use types::{RiskAssessment, RiskLevel, RiskModel, Transaction};
