//! Single-active-model activation
//!
//! At most one model is active across the whole store at any instant. The
//! coordinator serializes concurrent activation attempts with a mutex and
//! delegates the deactivate-all/activate-one swap to the store's atomic
//! transaction primitive; the lock is never widened beyond that sequence.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::LifecycleError;
use crate::store::ModelStore;
use crate::types::model::{ModelStatus, RiskModel};

/// Result of an activation request.
#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    Activated(RiskModel),
    /// The requested version was already the active one; no state changed.
    AlreadyActive(RiskModel),
}

/// Serializes activations and enforces the activation preconditions.
pub struct ActivationCoordinator {
    store: Arc<dyn ModelStore>,
    lock: Mutex<()>,
}

impl ActivationCoordinator {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Activate a model version, deactivating whichever model was active.
    ///
    /// Archived models cannot be activated. Activating the already-active
    /// version is a no-op reported as such.
    pub async fn activate(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<ActivationOutcome, LifecycleError> {
        let _guard = self.lock.lock().await;

        let model = self
            .store
            .find_model(model_id, version)
            .await?
            .ok_or_else(|| LifecycleError::ModelNotFound {
                model_id: model_id.to_string(),
            })?;

        match model.status {
            ModelStatus::Active => return Ok(ActivationOutcome::AlreadyActive(model)),
            ModelStatus::Archived => return Err(LifecycleError::CannotActivateArchived),
            ModelStatus::Draft | ModelStatus::Inactive => {}
        }

        self.store
            .activate_exclusive(&model.model_id, model.version)
            .await?;

        let activated = self
            .store
            .find_model(&model.model_id, Some(model.version))
            .await?
            .ok_or_else(|| LifecycleError::ModelNotFound {
                model_id: model.model_id.clone(),
            })?;

        info!(model = %activated.model_id, version = activated.version, "model activated");
        Ok(ActivationOutcome::Activated(activated))
    }
}
