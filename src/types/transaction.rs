//! Transaction data structures and risk assessment results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Merchant receiving the payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Merchant {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub id: String,
}

/// Where the transaction took place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLocation {
    pub city: String,
    pub state: String,
    pub country: String,
    pub coordinates: GeoPoint,
}

/// Device the transaction was initiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub os: String,
    pub browser: String,
    pub ip: String,
}

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Determine risk level from a 0-100 score.
    ///
    /// Boundaries: `<35` low, `<55` medium, otherwise high.
    pub fn from_score(score: f64) -> Self {
        if score < 35.0 {
            RiskLevel::Low
        } else if score < 55.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// What the assessment concluded about the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Legitimate,
    Suspicious,
    Fraudulent,
}

impl From<RiskLevel> for Disposition {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Disposition::Legitimate,
            RiskLevel::Medium => Disposition::Suspicious,
            RiskLevel::High => Disposition::Fraudulent,
        }
    }
}

/// Per-factor contribution breakdown, each on a 0-100 scale.
///
/// Factors that did not fire are reported as zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub amount: f64,
    pub location: f64,
    pub device: f64,
    pub velocity: f64,
    pub pattern: f64,
}

/// Diagnostics attached to an assessment for explainability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDiagnostics {
    pub customer_base_risk: f64,
    pub transaction_factors: FactorBreakdown,
}

/// Result of evaluating a transaction for fraud risk.
///
/// Produced fresh per evaluation; an existing assessment is replaced
/// wholesale, never merged field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Combined risk score (0-100)
    pub score: f64,
    pub level: RiskLevel,
    /// Detected fraud flags (e.g. `unusual_amount`, `unknown_device`)
    pub flags: Vec<String>,
    pub disposition: Disposition,
    #[serde(default)]
    pub diagnostics: RiskDiagnostics,
}

/// A financial transaction to be scored for fraud risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Owning customer; absent when the caller could not resolve one
    pub customer_id: Option<String>,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub currency: String,
    pub merchant: Merchant,
    pub location: TransactionLocation,
    pub device_info: Option<DeviceInfo>,
    /// purchase, withdrawal, transfer, deposit
    pub transaction_type: String,
    pub payment_method: String,
    /// completed, pending, failed, refunded
    pub status: String,
    pub risk_assessment: Option<RiskAssessment>,
}

impl Transaction {
    /// Create a transaction with required fields and neutral defaults.
    pub fn new(transaction_id: impl Into<String>, customer_id: Option<String>, amount: f64) -> Self {
        Self {
            customer_id,
            transaction_id: transaction_id.into(),
            timestamp: Utc::now(),
            amount,
            currency: "USD".to_string(),
            merchant: Merchant {
                name: "unknown".to_string(),
                category: "unknown".to_string(),
                id: String::new(),
            },
            location: TransactionLocation {
                city: String::new(),
                state: String::new(),
                country: String::new(),
                coordinates: GeoPoint::new(0.0, 0.0),
            },
            device_info: None,
            transaction_type: "purchase".to_string(),
            payment_method: "card".to_string(),
            status: "completed".to_string(),
            risk_assessment: None,
        }
    }
}
