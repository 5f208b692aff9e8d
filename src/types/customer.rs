//! Customer profile data structures

use crate::types::transaction::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device the customer has previously transacted from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownDevice {
    pub device_id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub os: String,
    pub browser: String,
    /// IP addresses this device has been seen on
    #[serde(default)]
    pub ip_range: Vec<String>,
}

/// A location the customer usually transacts from, with visit frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsualLocation {
    pub city: String,
    pub state: String,
    pub country: String,
    pub location: GeoPoint,
    pub frequency: f64,
}

/// Statistical summary of the customer's transaction history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatterns {
    pub avg_transaction_amount: f64,
    pub std_transaction_amount: f64,
    #[serde(default)]
    pub avg_transactions_per_day: f64,
    #[serde(default)]
    pub common_merchant_categories: Vec<String>,
    #[serde(default)]
    pub usual_transaction_locations: Vec<UsualLocation>,
}

/// Behavioral baseline the anomaly detectors compare against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralProfile {
    #[serde(default)]
    pub devices: Vec<KnownDevice>,
    pub transaction_patterns: TransactionPatterns,
}

/// Accumulated risk state for a customer.
///
/// `overall_risk_score` only ever moves upward, via the high-risk feedback
/// path; nothing in the engine decreases it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Baseline risk score (0-100)
    pub overall_risk_score: f64,
    pub last_risk_assessment: DateTime<Utc>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub last_reported_fraud: Option<DateTime<Utc>>,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            overall_risk_score: 0.0,
            last_risk_assessment: Utc::now(),
            risk_factors: Vec::new(),
            last_reported_fraud: None,
        }
    }
}

/// A customer and the behavioral baseline used to score their transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub behavioral_profile: BehavioralProfile,
    pub risk_profile: RiskProfile,
}

impl CustomerProfile {
    /// Create a profile with an empty baseline (no history, zero base risk).
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            behavioral_profile: BehavioralProfile::default(),
            risk_profile: RiskProfile::default(),
        }
    }

    /// Set the amount statistics used by the amount anomaly detector.
    pub fn with_amount_stats(mut self, avg: f64, std: f64) -> Self {
        self.behavioral_profile.transaction_patterns.avg_transaction_amount = avg;
        self.behavioral_profile.transaction_patterns.std_transaction_amount = std;
        self
    }

    /// Add a usual transaction location.
    pub fn with_usual_location(mut self, point: GeoPoint, frequency: f64) -> Self {
        self.behavioral_profile
            .transaction_patterns
            .usual_transaction_locations
            .push(UsualLocation {
                city: String::new(),
                state: String::new(),
                country: String::new(),
                location: point,
                frequency,
            });
        self
    }

    /// Register a known device.
    pub fn with_device(mut self, device_id: impl Into<String>, ip_range: Vec<String>) -> Self {
        self.behavioral_profile.devices.push(KnownDevice {
            device_id: device_id.into(),
            device_type: "desktop".to_string(),
            os: "unknown".to_string(),
            browser: "unknown".to_string(),
            ip_range,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_builder() {
        let profile = CustomerProfile::new("cust_1")
            .with_amount_stats(58.33, 38.81)
            .with_usual_location(GeoPoint::new(-54.5, -31.3), 0.31)
            .with_device("dev_1", vec!["90.58.120.143".to_string()]);

        let patterns = &profile.behavioral_profile.transaction_patterns;
        assert_eq!(patterns.avg_transaction_amount, 58.33);
        assert_eq!(patterns.usual_transaction_locations.len(), 1);
        assert_eq!(profile.behavioral_profile.devices.len(), 1);
        assert_eq!(profile.risk_profile.overall_risk_score, 0.0);
    }

    #[test]
    fn test_profile_serialization_roundtrip() {
        let profile = CustomerProfile::new("cust_2").with_amount_stats(100.0, 25.0);

        let json = serde_json::to_string(&profile).unwrap();
        let back: CustomerProfile = serde_json::from_str(&json).unwrap();

        assert_eq!(back.customer_id, "cust_2");
        assert_eq!(
            back.behavioral_profile.transaction_patterns.avg_transaction_amount,
            100.0
        );
    }
}
