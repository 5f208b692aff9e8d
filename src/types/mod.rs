//! Type definitions for the risk engine

pub mod customer;
pub mod model;
pub mod transaction;

pub use customer::CustomerProfile;
pub use model::{ModelStatus, Outcome, PerformanceRecord, RiskModel};
pub use transaction::{RiskAssessment, RiskLevel, Transaction};
