//! Live propagation of the active model
//!
//! A background task owns the store's change-feed subscription, maintains an
//! atomically-swapped snapshot of the active model for evaluators, and fans
//! change events out to lightweight observers with periodic keep-alives.
//! Evaluators read the snapshot through [`CurrentModel`] without locking.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::config::PropagatorConfig;
use crate::error::LifecycleError;
use crate::store::{ModelChange, ModelStore};
use crate::types::model::{ModelStatus, RiskModel};

/// Event fanned out to propagator observers.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// The active model snapshot was replaced.
    ActiveChanged(Arc<RiskModel>),
    /// Raw change-feed notification, for observers mirroring the feed.
    Change(ModelChange),
    /// Periodic liveness signal for long-lived observers.
    KeepAlive,
}

/// Read handle on the active model snapshot.
///
/// Cheap to clone; `snapshot` never blocks on writers.
#[derive(Clone)]
pub struct CurrentModel {
    rx: watch::Receiver<Arc<RiskModel>>,
}

impl CurrentModel {
    pub fn snapshot(&self) -> Arc<RiskModel> {
        self.rx.borrow().clone()
    }

    /// A handle pinned to one model, for wiring an evaluator without a
    /// running propagator.
    pub fn fixed(model: RiskModel) -> Self {
        // The sender is dropped; the receiver keeps serving the last value.
        let (_tx, rx) = watch::channel(Arc::new(model));
        Self { rx }
    }
}

/// Background task propagating model changes from the store.
pub struct ModelPropagator {
    store: Arc<dyn ModelStore>,
    snapshot_tx: watch::Sender<Arc<RiskModel>>,
    snapshot_rx: watch::Receiver<Arc<RiskModel>>,
    events: broadcast::Sender<ModelEvent>,
    config: PropagatorConfig,
}

impl ModelPropagator {
    /// Bootstrap the propagator: load the active model from the store, or
    /// install the default model when none is active.
    pub async fn new(
        store: Arc<dyn ModelStore>,
        config: PropagatorConfig,
    ) -> Result<Self, LifecycleError> {
        let active = store
            .list_models(Some(ModelStatus::Active))
            .await?
            .into_iter()
            .next();

        let initial = match active {
            Some(model) => {
                info!(model = %model.model_id, version = model.version, "loaded active model");
                model
            }
            None => {
                let model = RiskModel::default_model();
                store.insert_model(&model).await?;
                info!(model = %model.model_id, "no active model found, installed default");
                model
            }
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(initial));
        let (events, _) = broadcast::channel(config.observer_capacity);

        Ok(Self {
            store,
            snapshot_tx,
            snapshot_rx,
            events,
            config,
        })
    }

    /// Handle for evaluators to read the active model snapshot.
    pub fn current(&self) -> CurrentModel {
        CurrentModel {
            rx: self.snapshot_rx.clone(),
        }
    }

    /// Subscribe to propagated model events.
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Run the subscription loop until the task is aborted.
    ///
    /// The change feed is resubscribed with a fixed backoff whenever it
    /// errors or ends; observers keep receiving keep-alives in between.
    pub async fn run(&self) {
        let backoff = Duration::from_secs(self.config.resubscribe_backoff_secs);
        loop {
            match self.store.subscribe_changes().await {
                Ok(mut feed) => {
                    let mut keepalive =
                        tokio::time::interval(Duration::from_secs(self.config.keepalive_secs));
                    loop {
                        tokio::select! {
                            change = feed.next() => match change {
                                Some(change) => self.handle_change(change),
                                None => {
                                    warn!("model change feed ended, resubscribing");
                                    break;
                                }
                            },
                            _ = keepalive.tick() => {
                                let _ = self.events.send(ModelEvent::KeepAlive);
                            }
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "failed to subscribe to model changes");
                }
            }
            tokio::time::sleep(backoff).await;
        }
    }

    /// Spawn `run` on the runtime and hand back the task handle.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    fn handle_change(&self, change: ModelChange) {
        if let Some(model) = change
            .model
            .as_ref()
            .filter(|m| m.status == ModelStatus::Active)
        {
            let current = self.snapshot_rx.borrow().clone();
            if current.model_id != model.model_id
                || current.version != model.version
                || current.updated_at != model.updated_at
            {
                let snapshot = Arc::new(model.clone());
                // send_replace so the swap succeeds with zero evaluators
                self.snapshot_tx.send_replace(snapshot.clone());
                info!(
                    model = %snapshot.model_id,
                    version = snapshot.version,
                    "active model snapshot replaced"
                );
                let _ = self.events.send(ModelEvent::ActiveChanged(snapshot));
            }
        }

        let _ = self.events.send(ModelEvent::Change(change));
    }
}
