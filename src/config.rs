//! Configuration management for the risk engine

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub propagator: PropagatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default weights attached to each anomaly detector.
///
/// Used when the active risk model does not carry a weight for a factor.
/// The pattern factor is reserved for a pattern-matching detector and
/// contributes nothing while that detector is unused.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FactorWeights {
    #[serde(default = "default_weight_amount")]
    pub amount: f64,
    #[serde(default = "default_weight_location")]
    pub location: f64,
    #[serde(default = "default_weight_device")]
    pub device: f64,
    #[serde(default = "default_weight_velocity")]
    pub velocity: f64,
    #[serde(default = "default_weight_pattern")]
    pub pattern: f64,
}

fn default_weight_amount() -> f64 {
    0.25
}

fn default_weight_location() -> f64 {
    0.25
}

fn default_weight_device() -> f64 {
    0.20
}

fn default_weight_velocity() -> f64 {
    0.15
}

fn default_weight_pattern() -> f64 {
    0.15
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            amount: default_weight_amount(),
            location: default_weight_location(),
            device: default_weight_device(),
            velocity: default_weight_velocity(),
            pattern: default_weight_pattern(),
        }
    }
}

/// Anomaly detection thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Standard deviations above average that make an amount suspicious
    #[serde(default = "default_amount_z_threshold")]
    pub amount_z_threshold: f64,
    /// Amount-to-average ratio that makes an amount suspicious
    #[serde(default = "default_amount_ratio_threshold")]
    pub amount_ratio_threshold: f64,
    /// Distance (km) from any usual location considered suspicious
    #[serde(default = "default_max_location_distance_km")]
    pub max_location_distance_km: f64,
    /// Trailing window for the velocity check, in minutes
    #[serde(default = "default_velocity_window_minutes")]
    pub velocity_window_minutes: i64,
    /// Transaction count in the window considered suspicious
    #[serde(default = "default_velocity_threshold")]
    pub velocity_threshold: usize,
    #[serde(default)]
    pub weights: FactorWeights,
}

fn default_amount_z_threshold() -> f64 {
    3.0
}

fn default_amount_ratio_threshold() -> f64 {
    5.0
}

fn default_max_location_distance_km() -> f64 {
    500.0
}

fn default_velocity_window_minutes() -> i64 {
    60
}

fn default_velocity_threshold() -> usize {
    5
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            amount_z_threshold: default_amount_z_threshold(),
            amount_ratio_threshold: default_amount_ratio_threshold(),
            max_location_distance_km: default_max_location_distance_km(),
            velocity_window_minutes: default_velocity_window_minutes(),
            velocity_threshold: default_velocity_threshold(),
            weights: FactorWeights::default(),
        }
    }
}

/// Peer similarity ranker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityConfig {
    /// Nearest neighbors retrieved from the vector search
    #[serde(default = "default_neighbor_limit")]
    pub neighbor_limit: usize,
    /// Neighbors kept after display re-ranking
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
    /// Corpus size above which zero neighbors is treated as suspicious
    #[serde(default = "default_min_corpus_size")]
    pub min_corpus_size: u64,
}

fn default_neighbor_limit() -> usize {
    15
}

fn default_display_limit() -> usize {
    5
}

fn default_min_corpus_size() -> u64 {
    10
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            neighbor_limit: default_neighbor_limit(),
            display_limit: default_display_limit(),
            min_corpus_size: default_min_corpus_size(),
        }
    }
}

/// Live model propagation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PropagatorConfig {
    /// Seconds between keep-alive events to observers
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Seconds to wait before resubscribing after a feed failure
    #[serde(default = "default_resubscribe_backoff_secs")]
    pub resubscribe_backoff_secs: u64,
    /// Broadcast buffer per observer before events are dropped
    #[serde(default = "default_observer_capacity")]
    pub observer_capacity: usize,
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_resubscribe_backoff_secs() -> u64 {
    5
}

fn default_observer_capacity() -> usize {
    64
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            resubscribe_backoff_secs: default_resubscribe_backoff_secs(),
            observer_capacity: default_observer_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            similarity: SimilarityConfig::default(),
            propagator: PropagatorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
