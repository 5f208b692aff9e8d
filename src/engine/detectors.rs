//! Per-dimension anomaly detectors
//!
//! Each detector is a pure function over a transaction and the customer's
//! behavioral profile, returning whether the dimension looks anomalous and a
//! normalized risk contribution in `[0, 1]`. Detectors never touch storage;
//! the velocity check takes a pre-computed transaction count so it stays pure.

use crate::config::DetectionConfig;
use crate::geo::haversine_km;
use crate::types::customer::CustomerProfile;
use crate::types::transaction::Transaction;

pub const FLAG_UNUSUAL_AMOUNT: &str = "unusual_amount";
pub const FLAG_UNEXPECTED_LOCATION: &str = "unexpected_location";
pub const FLAG_UNKNOWN_DEVICE: &str = "unknown_device";
pub const FLAG_VELOCITY_ALERT: &str = "velocity_alert";
pub const FLAG_MISSING_CUSTOMER_REFERENCE: &str = "missing_customer_reference";
pub const FLAG_CUSTOMER_NOT_FOUND: &str = "customer_not_found";

/// Result of a single detector run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOutcome {
    pub anomalous: bool,
    pub risk: f64,
}

impl DetectorOutcome {
    pub const CLEAR: DetectorOutcome = DetectorOutcome {
        anomalous: false,
        risk: 0.0,
    };

    fn flagged(risk: f64) -> Self {
        Self {
            anomalous: true,
            risk,
        }
    }

    /// Risk contribution that feeds the aggregator: zero unless anomalous.
    pub fn contribution(&self) -> f64 {
        if self.anomalous {
            self.risk
        } else {
            0.0
        }
    }
}

/// Compare the amount against the customer's historical mean and deviation.
///
/// A customer with no amount history (zero mean or zero deviation) cannot be
/// baselined, which is itself mildly suspicious. Extreme multiples of the
/// average dominate the z-score so they get their own risk bands.
pub fn check_amount(
    tx: &Transaction,
    customer: &CustomerProfile,
    config: &DetectionConfig,
) -> DetectorOutcome {
    let patterns = &customer.behavioral_profile.transaction_patterns;
    let avg = patterns.avg_transaction_amount;
    let std = patterns.std_transaction_amount;

    if avg == 0.0 || std == 0.0 {
        return DetectorOutcome::flagged(0.6);
    }

    let z_score = (tx.amount - avg).abs() / std;
    let ratio = tx.amount / avg;

    let anomalous = z_score > config.amount_z_threshold || ratio > config.amount_ratio_threshold;

    let risk = if ratio >= 10.0 {
        1.0
    } else if ratio >= 5.0 {
        0.85 + ((ratio - 5.0) / 5.0) * 0.15
    } else {
        (z_score / (config.amount_z_threshold * 2.0)).min(1.0)
    };

    DetectorOutcome { anomalous, risk }
}

/// Distance from the nearest usual transaction location.
///
/// No usual locations on file means the dimension cannot be checked and is
/// scored as a moderate anomaly. Past the distance threshold the risk floors
/// at 0.85 so a genuinely unexpected location always weighs in heavily.
pub fn check_location(
    tx: &Transaction,
    customer: &CustomerProfile,
    config: &DetectionConfig,
) -> DetectorOutcome {
    let usual = &customer
        .behavioral_profile
        .transaction_patterns
        .usual_transaction_locations;

    if usual.is_empty() {
        return DetectorOutcome::flagged(0.5);
    }

    let min_distance_km = usual
        .iter()
        .map(|loc| haversine_km(tx.location.coordinates, loc.location))
        .fold(f64::INFINITY, f64::min);

    let max_distance = config.max_location_distance_km;
    let anomalous = min_distance_km > max_distance;

    let risk = if anomalous {
        (min_distance_km / (max_distance * 1.2)).min(1.0).max(0.85)
    } else {
        (min_distance_km / max_distance).min(0.5)
    };

    DetectorOutcome { anomalous, risk }
}

/// Match the transaction's device against the customer's known devices.
///
/// A device id match clears the check outright. A bare IP-range match without
/// the id is only partial reassurance; a device the customer has never used
/// at all scores near the top of the range.
pub fn check_device(tx: &Transaction, customer: &CustomerProfile) -> DetectorOutcome {
    let device = match &tx.device_info {
        Some(d) if !d.device_id.is_empty() => d,
        _ => return DetectorOutcome::flagged(0.5),
    };

    let mut ip_match = false;
    for known in &customer.behavioral_profile.devices {
        if known.device_id == device.device_id {
            return DetectorOutcome::CLEAR;
        }
        if !device.ip.is_empty() && known.ip_range.iter().any(|ip| *ip == device.ip) {
            ip_match = true;
        }
    }

    if ip_match {
        DetectorOutcome::flagged(0.5)
    } else {
        DetectorOutcome::flagged(0.9)
    }
}

/// Transaction count in the trailing window, against the velocity threshold.
pub fn check_velocity(recent_count: usize, config: &DetectionConfig) -> DetectorOutcome {
    let threshold = config.velocity_threshold;
    let anomalous = recent_count >= threshold;
    let risk = (recent_count as f64 / (threshold as f64 * 1.5)).min(1.0);

    DetectorOutcome { anomalous, risk }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{DeviceInfo, GeoPoint};

    fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    fn tx(amount: f64) -> Transaction {
        Transaction::new("tx_1", Some("cust_1".to_string()), amount)
    }

    #[test]
    fn test_amount_no_history_is_moderate_anomaly() {
        let customer = CustomerProfile::new("cust_1");
        let outcome = check_amount(&tx(100.0), &customer, &config());
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 0.6);
    }

    #[test]
    fn test_amount_within_baseline_is_clear() {
        let customer = CustomerProfile::new("cust_1").with_amount_stats(100.0, 20.0);
        let outcome = check_amount(&tx(110.0), &customer, &config());
        assert!(!outcome.anomalous);
        // z = 0.5, risk = 0.5 / 6
        assert!((outcome.risk - 0.5 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_amount_extreme_ratio_saturates() {
        let customer = CustomerProfile::new("cust_1").with_amount_stats(100.0, 20.0);
        let outcome = check_amount(&tx(1000.0), &customer, &config());
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 1.0);
    }

    #[test]
    fn test_amount_mid_ratio_band() {
        let customer = CustomerProfile::new("cust_1").with_amount_stats(100.0, 20.0);
        // ratio 7 -> 0.85 + (2/5)*0.15 = 0.91
        let outcome = check_amount(&tx(700.0), &customer, &config());
        assert!(outcome.anomalous);
        assert!((outcome.risk - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_location_no_usual_locations() {
        let customer = CustomerProfile::new("cust_1");
        let outcome = check_location(&tx(10.0), &customer, &config());
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 0.5);
    }

    #[test]
    fn test_location_nearby_is_clear() {
        let customer =
            CustomerProfile::new("cust_1").with_usual_location(GeoPoint::new(2.3522, 48.8566), 10.0);
        let mut t = tx(10.0);
        t.location.coordinates = GeoPoint::new(2.35, 48.85);
        let outcome = check_location(&t, &customer, &config());
        assert!(!outcome.anomalous);
        assert!(outcome.risk < 0.01);
    }

    #[test]
    fn test_location_far_away_floors_at_085() {
        // Paris profile, New York transaction (~5800 km)
        let customer =
            CustomerProfile::new("cust_1").with_usual_location(GeoPoint::new(2.3522, 48.8566), 10.0);
        let mut t = tx(10.0);
        t.location.coordinates = GeoPoint::new(-74.0060, 40.7128);
        let outcome = check_location(&t, &customer, &config());
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 1.0);
    }

    #[test]
    fn test_location_just_over_threshold_uses_floor() {
        // ~510 km ratio: 510/600 = 0.85 exactly at the floor
        let customer =
            CustomerProfile::new("cust_1").with_usual_location(GeoPoint::new(0.0, 0.0), 10.0);
        let mut t = tx(10.0);
        t.location.coordinates = GeoPoint::new(0.0, 4.6); // ~511 km north
        let outcome = check_location(&t, &customer, &config());
        assert!(outcome.anomalous);
        assert!(outcome.risk >= 0.85);
    }

    #[test]
    fn test_device_known_id_is_clear() {
        let customer = CustomerProfile::new("cust_1").with_device("dev_1", vec![]);
        let mut t = tx(10.0);
        t.device_info = Some(DeviceInfo {
            device_id: "dev_1".to_string(),
            device_type: "mobile".to_string(),
            os: "iOS".to_string(),
            browser: "Safari".to_string(),
            ip: "10.0.0.1".to_string(),
        });
        assert_eq!(check_device(&t, &customer), DetectorOutcome::CLEAR);
    }

    #[test]
    fn test_device_missing_info_is_moderate() {
        let customer = CustomerProfile::new("cust_1");
        let outcome = check_device(&tx(10.0), &customer);
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 0.5);
    }

    #[test]
    fn test_device_ip_range_match_only() {
        let customer =
            CustomerProfile::new("cust_1").with_device("dev_1", vec!["10.0.0.1".to_string()]);
        let mut t = tx(10.0);
        t.device_info = Some(DeviceInfo {
            device_id: "dev_other".to_string(),
            device_type: "desktop".to_string(),
            os: "Linux".to_string(),
            browser: "Firefox".to_string(),
            ip: "10.0.0.1".to_string(),
        });
        let outcome = check_device(&t, &customer);
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 0.5);
    }

    #[test]
    fn test_device_fully_unknown() {
        let customer = CustomerProfile::new("cust_1").with_device("dev_1", vec![]);
        let mut t = tx(10.0);
        t.device_info = Some(DeviceInfo {
            device_id: "dev_other".to_string(),
            device_type: "desktop".to_string(),
            os: "Linux".to_string(),
            browser: "Firefox".to_string(),
            ip: "172.16.0.9".to_string(),
        });
        let outcome = check_device(&t, &customer);
        assert!(outcome.anomalous);
        assert_eq!(outcome.risk, 0.9);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn amount_risk_stays_in_unit_range(
                amount in 0.0f64..1_000_000.0,
                avg in 0.0f64..100_000.0,
                std in 0.0f64..10_000.0,
            ) {
                let customer = CustomerProfile::new("c").with_amount_stats(avg, std);
                let outcome = check_amount(&tx(amount), &customer, &config());
                prop_assert!((0.0..=1.0).contains(&outcome.risk));
            }

            #[test]
            fn location_risk_monotonic_in_distance(degrees in 0.0f64..80.0) {
                let customer =
                    CustomerProfile::new("c").with_usual_location(GeoPoint::new(0.0, 0.0), 1.0);
                let mut near = tx(10.0);
                near.location.coordinates = GeoPoint::new(0.0, degrees / 2.0);
                let mut far = tx(10.0);
                far.location.coordinates = GeoPoint::new(0.0, degrees);

                let near = check_location(&near, &customer, &config());
                let far = check_location(&far, &customer, &config());
                prop_assert!(far.risk >= near.risk);
                prop_assert!((0.0..=1.0).contains(&far.risk));
            }

            #[test]
            fn velocity_risk_monotonic_in_count(count in 0usize..100) {
                let cfg = config();
                let lower = check_velocity(count, &cfg);
                let higher = check_velocity(count + 1, &cfg);
                prop_assert!(higher.risk >= lower.risk);
                prop_assert!((0.0..=1.0).contains(&lower.risk));
            }
        }
    }

    #[test]
    fn test_velocity_threshold_boundary() {
        let cfg = config();
        assert!(!check_velocity(4, &cfg).anomalous);
        let outcome = check_velocity(5, &cfg);
        assert!(outcome.anomalous);
        // 5 / 7.5
        assert!((outcome.risk - 5.0 / 7.5).abs() < 1e-9);
        assert_eq!(check_velocity(20, &cfg).risk, 1.0);
    }
}
