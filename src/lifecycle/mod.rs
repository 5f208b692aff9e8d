//! Risk model lifecycle management
//!
//! Versioned model registry, the single-active-model activation path, live
//! propagation of the active model to evaluators, and per-model performance
//! tracking.

pub mod activation;
pub mod performance;
pub mod propagator;
pub mod registry;

pub use activation::{ActivationCoordinator, ActivationOutcome};
pub use performance::{ModelComparison, PerformanceTracker, Timeframe};
pub use propagator::{CurrentModel, ModelEvent, ModelPropagator};
pub use registry::{ModelDraft, ModelRegistry, ModelUpdate};
