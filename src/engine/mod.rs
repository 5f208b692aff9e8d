//! Transaction risk evaluation
//!
//! The evaluation pipeline: independent anomaly detectors feed a weighted
//! aggregator for the headline score, and a separate peer-similarity ranker
//! scores the transaction against its nearest historical neighbors.

pub mod aggregator;
pub mod detectors;
pub mod evaluator;
pub mod similarity;

pub use evaluator::{DisplayRanking, RiskEvaluator, SimilarityReport};
