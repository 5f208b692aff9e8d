//! Versioned risk model registry
//!
//! Versions are strictly increasing per model id and history is immutable
//! once a version has served traffic: editing an active model forks a new
//! draft version, while drafts and inactive models are edited in place.
//! Archived versions are terminal except for restore back to inactive.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::LifecycleError;
use crate::store::ModelStore;
use crate::types::model::{
    ModelPerformance, ModelStatus, RiskFactorConfig, RiskModel,
};

/// Payload for creating a model (or a new version of an existing id).
#[derive(Debug, Clone)]
pub struct ModelDraft {
    pub model_id: String,
    pub description: String,
    pub weights: HashMap<String, f64>,
    pub thresholds: HashMap<String, f64>,
    pub risk_factors: Vec<RiskFactorConfig>,
}

/// Partial update applied to an existing model.
///
/// `status` may move a model between draft, inactive and archived;
/// activation goes through [`ActivationCoordinator`] only.
///
/// [`ActivationCoordinator`]: crate::lifecycle::ActivationCoordinator
#[derive(Debug, Clone, Default)]
pub struct ModelUpdate {
    pub description: Option<String>,
    pub weights: Option<HashMap<String, f64>>,
    pub thresholds: Option<HashMap<String, f64>>,
    pub risk_factors: Option<Vec<RiskFactorConfig>>,
    pub status: Option<ModelStatus>,
}

/// Create, edit, archive and restore model versions.
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    /// Create a model version: 1 for a new id, `max(version) + 1` otherwise.
    /// New versions always start as drafts.
    pub async fn create(&self, draft: ModelDraft) -> Result<RiskModel, LifecycleError> {
        let versions = self.store.find_versions(&draft.model_id).await?;
        let version = versions.iter().map(|m| m.version).max().unwrap_or(0) + 1;

        let now = Utc::now();
        let model = RiskModel {
            model_id: draft.model_id,
            version,
            status: ModelStatus::Draft,
            description: draft.description,
            weights: draft.weights,
            thresholds: draft.thresholds,
            risk_factors: draft.risk_factors,
            performance: ModelPerformance::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_model(&model).await?;

        info!(model = %model.model_id, version, "model version created");
        Ok(model)
    }

    /// Apply an update to the latest non-archived version of a model.
    ///
    /// Updating an active model forks a new draft version carrying the
    /// merged fields with performance metrics reset; history is never
    /// mutated. Setting `status: active` here is rejected.
    pub async fn update(
        &self,
        model_id: &str,
        update: ModelUpdate,
    ) -> Result<RiskModel, LifecycleError> {
        if update.status == Some(ModelStatus::Active) {
            return Err(LifecycleError::ActivationReserved);
        }

        let model = self
            .store
            .find_model(model_id, None)
            .await?
            .ok_or_else(|| LifecycleError::ModelNotFound {
                model_id: model_id.to_string(),
            })?;

        if model.status == ModelStatus::Active && update.status != Some(ModelStatus::Archived) {
            let mut forked = merge(model, update);
            forked.version += 1;
            forked.status = ModelStatus::Draft;
            forked.performance = ModelPerformance::default();
            forked.updated_at = Utc::now();
            self.store.insert_model(&forked).await?;

            info!(
                model = %forked.model_id,
                version = forked.version,
                "active model edit forked a new draft version"
            );
            return Ok(forked);
        }

        if update.status == Some(ModelStatus::Archived) {
            self.ensure_archivable(&model).await?;
        }

        let mut updated = merge(model, update);
        updated.updated_at = Utc::now();
        self.store.replace_model(&updated).await?;

        info!(model = %updated.model_id, version = updated.version, "model updated in place");
        Ok(updated)
    }

    /// Archive a model version (soft delete). The sole active model cannot
    /// be archived; activate a replacement first.
    pub async fn archive(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<RiskModel, LifecycleError> {
        let model = self.find_required(model_id, version).await?;
        if model.status == ModelStatus::Archived {
            return Err(LifecycleError::AlreadyArchived {
                model_id: model.model_id,
                version: model.version,
            });
        }
        self.ensure_archivable(&model).await?;

        let mut archived = model;
        archived.status = ModelStatus::Archived;
        archived.updated_at = Utc::now();
        self.store.replace_model(&archived).await?;

        info!(model = %archived.model_id, version = archived.version, "model archived");
        Ok(archived)
    }

    /// Restore an archived version to inactive.
    pub async fn restore(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<RiskModel, LifecycleError> {
        let model = match version {
            Some(v) => self.find_required(model_id, Some(v)).await?,
            // Latest archived version when none is pinned.
            None => self
                .store
                .find_versions(model_id)
                .await?
                .into_iter()
                .filter(|m| m.status == ModelStatus::Archived)
                .max_by_key(|m| m.version)
                .ok_or_else(|| LifecycleError::ModelNotFound {
                    model_id: model_id.to_string(),
                })?,
        };

        if model.status != ModelStatus::Archived {
            return Err(LifecycleError::NotArchived {
                model_id: model.model_id,
                version: model.version,
            });
        }

        let mut restored = model;
        restored.status = ModelStatus::Inactive;
        restored.updated_at = Utc::now();
        self.store.replace_model(&restored).await?;

        info!(model = %restored.model_id, version = restored.version, "archived model restored");
        Ok(restored)
    }

    /// Fetch a model: a pinned version, or the latest non-archived one.
    pub async fn get(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<RiskModel, LifecycleError> {
        self.find_required(model_id, version).await
    }

    /// List models, optionally filtered by status, most recently updated
    /// first.
    pub async fn list(&self, status: Option<ModelStatus>) -> Result<Vec<RiskModel>, LifecycleError> {
        Ok(self.store.list_models(status).await?)
    }

    async fn find_required(
        &self,
        model_id: &str,
        version: Option<u32>,
    ) -> Result<RiskModel, LifecycleError> {
        self.store
            .find_model(model_id, version)
            .await?
            .ok_or_else(|| LifecycleError::ModelNotFound {
                model_id: model_id.to_string(),
            })
    }

    async fn ensure_archivable(&self, model: &RiskModel) -> Result<(), LifecycleError> {
        if model.status != ModelStatus::Active {
            return Ok(());
        }
        let active = self.store.list_models(Some(ModelStatus::Active)).await?;
        if active.len() <= 1 {
            return Err(LifecycleError::CannotArchiveOnlyActive);
        }
        Ok(())
    }
}

fn merge(mut model: RiskModel, update: ModelUpdate) -> RiskModel {
    if let Some(description) = update.description {
        model.description = description;
    }
    if let Some(weights) = update.weights {
        model.weights = weights;
    }
    if let Some(thresholds) = update.thresholds {
        model.thresholds = thresholds;
    }
    if let Some(risk_factors) = update.risk_factors {
        model.risk_factors = risk_factors;
    }
    if let Some(status) = update.status {
        model.status = status;
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn draft(model_id: &str) -> ModelDraft {
        ModelDraft {
            model_id: model_id.to_string(),
            description: "test model".to_string(),
            weights: HashMap::from([("amount".to_string(), 0.5)]),
            thresholds: HashMap::from([("flag".to_string(), 60.0)]),
            risk_factors: vec![],
        }
    }

    fn registry() -> (Arc<InMemoryStore>, ModelRegistry) {
        let store = Arc::new(InMemoryStore::new());
        let registry = ModelRegistry::new(store.clone());
        (store, registry)
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_versions() {
        let (_, registry) = registry();

        let v1 = registry.create(draft("m")).await.unwrap();
        let v2 = registry.create(draft("m")).await.unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(v1.status, ModelStatus::Draft);
        assert_eq!(v2.status, ModelStatus::Draft);
    }

    #[tokio::test]
    async fn test_update_draft_edits_in_place() {
        let (_, registry) = registry();
        registry.create(draft("m")).await.unwrap();

        let updated = registry
            .update(
                "m",
                ModelUpdate {
                    description: Some("revised".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.description, "revised");
    }

    #[tokio::test]
    async fn test_update_active_forks_draft_and_resets_performance() {
        let (store, registry) = registry();
        let model = registry.create(draft("m")).await.unwrap();
        store.activate_exclusive("m", model.version).await.unwrap();

        let forked = registry
            .update(
                "m",
                ModelUpdate {
                    weights: Some(HashMap::from([("amount".to_string(), 0.9)])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(forked.version, 2);
        assert_eq!(forked.status, ModelStatus::Draft);
        assert_eq!(forked.weights["amount"], 0.9);
        assert!(forked.performance.false_positive_rate.is_none());

        // v1 left untouched and still active
        let v1 = registry.get("m", Some(1)).await.unwrap();
        assert_eq!(v1.status, ModelStatus::Active);
        assert_eq!(v1.weights["amount"], 0.5);
    }

    #[tokio::test]
    async fn test_update_to_active_is_rejected() {
        let (_, registry) = registry();
        registry.create(draft("m")).await.unwrap();

        let err = registry
            .update(
                "m",
                ModelUpdate {
                    status: Some(ModelStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ActivationReserved));
    }

    #[tokio::test]
    async fn test_archive_sole_active_is_rejected() {
        let (store, registry) = registry();
        let model = registry.create(draft("m")).await.unwrap();
        store.activate_exclusive("m", model.version).await.unwrap();

        let err = registry.archive("m", None).await.unwrap_err();
        assert!(matches!(err, LifecycleError::CannotArchiveOnlyActive));

        // Same rule when archiving through an update
        let err = registry
            .update(
                "m",
                ModelUpdate {
                    status: Some(ModelStatus::Archived),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::CannotArchiveOnlyActive));

        let unchanged = registry.get("m", Some(1)).await.unwrap();
        assert_eq!(unchanged.status, ModelStatus::Active);
    }

    #[tokio::test]
    async fn test_double_archive_is_rejected() {
        let (_, registry) = registry();
        registry.create(draft("m")).await.unwrap();

        registry.archive("m", Some(1)).await.unwrap();
        let err = registry.archive("m", Some(1)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyArchived { .. }));
    }

    #[tokio::test]
    async fn test_restore_goes_to_inactive_only() {
        let (_, registry) = registry();
        registry.create(draft("m")).await.unwrap();
        registry.archive("m", Some(1)).await.unwrap();

        let restored = registry.restore("m", None).await.unwrap();
        assert_eq!(restored.status, ModelStatus::Inactive);

        let err = registry.restore("m", Some(1)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotArchived { .. }));
    }

    #[tokio::test]
    async fn test_missing_model_errors() {
        let (_, registry) = registry();
        let err = registry.get("ghost", None).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ModelNotFound { .. }));
    }
}
