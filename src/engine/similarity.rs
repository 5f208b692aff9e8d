//! Peer-similarity risk scoring
//!
//! Ranks a transaction against its nearest historical neighbors and distills
//! the neighborhood into a single risk signal. Two passes share the same
//! scoring formulas: the raw top-K statistic over everything the vector
//! search returned, and a display-oriented pass over the five neighbors the
//! caller will actually show, re-ranked by risk-category priority.

use crate::config::SimilarityConfig;
use crate::store::SimilarTransaction;
use crate::types::transaction::{Disposition, RiskLevel, Transaction};

/// Score used when neighbors exist but every weight cancels out.
const NEUTRAL_SCORE: f64 = 0.5;

/// Position weights for the five displayed ranks.
const DISPLAY_POSITION_WEIGHTS: [f64; 5] = [1.0, 0.9, 0.8, 0.7, 0.6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RiskBucket {
    Low,
    Medium,
    High,
}

struct NeighborScore {
    similarity: f64,
    risk_score: f64,
    flag_count: usize,
    bucket: RiskBucket,
}

fn bucket_of(neighbor: &SimilarTransaction) -> RiskBucket {
    match &neighbor.risk_assessment {
        Some(assessment) => match (assessment.level, assessment.disposition) {
            (RiskLevel::High, _) | (_, Disposition::Fraudulent) => RiskBucket::High,
            (RiskLevel::Medium, _) | (_, Disposition::Suspicious) => RiskBucket::Medium,
            _ => RiskBucket::Low,
        },
        // No assessment on file reads as medium, not safe.
        None => RiskBucket::Medium,
    }
}

/// Similarity of the two amounts as a coarse bucket on the smaller/larger
/// ratio. Non-positive amounts cannot be compared and count as similar.
fn amount_similarity(current: f64, neighbor: f64) -> f64 {
    if current <= 0.0 || neighbor <= 0.0 {
        return 1.0;
    }
    let ratio = current.min(neighbor) / current.max(neighbor);
    if ratio > 0.95 {
        1.0
    } else if ratio > 0.8 {
        0.8
    } else if ratio > 0.5 {
        0.6
    } else {
        0.4
    }
}

fn score_neighbor(
    current_amount: f64,
    neighbor: &SimilarTransaction,
    position_weight: f64,
) -> NeighborScore {
    let weighted_similarity = neighbor.similarity * position_weight;
    let final_similarity =
        weighted_similarity * 0.7 + amount_similarity(current_amount, neighbor.amount) * 0.3;

    let (risk_score, flag_count) = match &neighbor.risk_assessment {
        Some(assessment) => (assessment.score / 100.0, assessment.flags.len()),
        None => (NEUTRAL_SCORE, 0),
    };

    NeighborScore {
        similarity: final_similarity,
        risk_score,
        flag_count,
        bucket: bucket_of(neighbor),
    }
}

fn combine_scores(scores: &[NeighborScore]) -> f64 {
    let high: Vec<&NeighborScore> = scores
        .iter()
        .filter(|s| s.bucket == RiskBucket::High)
        .collect();
    let has_medium = scores.iter().any(|s| s.bucket == RiskBucket::Medium);

    let risk = if !high.is_empty() {
        // High-risk company dominates: weighted mean over the high bucket,
        // boosted per additional high-risk match.
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for s in &high {
            let weight = s.similarity * (1.0 + 0.1 * s.flag_count as f64);
            weighted_sum += s.risk_score * weight;
            total_weight += weight;
        }
        let base = (weighted_sum / total_weight.max(1.0)).min(1.0);
        let boost = (0.05 * high.len() as f64).min(0.2);
        (base + boost).min(1.0)
    } else if !has_medium {
        // Only low-risk neighbors: the closer the company, the safer.
        let avg_similarity =
            scores.iter().map(|s| s.similarity).sum::<f64>() / scores.len() as f64;
        (1.0 - avg_similarity.powf(1.5)).max(0.05)
    } else {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for s in scores {
            let weight = s.similarity * (1.0 + 0.2 * s.flag_count as f64);
            weighted_sum += s.risk_score * weight;
            total_weight += weight;
        }
        if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            NEUTRAL_SCORE
        }
    };

    risk.clamp(0.0, 1.0)
}

/// Risk signal over the raw nearest-neighbor list, in retrieval order.
///
/// An empty neighborhood in a populated corpus is itself a signal: the
/// transaction resembles nothing seen before.
pub fn similarity_risk_score(
    current_amount: f64,
    neighbors: &[SimilarTransaction],
    corpus_size: u64,
    config: &SimilarityConfig,
) -> f64 {
    if neighbors.is_empty() {
        return if corpus_size > config.min_corpus_size {
            0.75
        } else {
            NEUTRAL_SCORE
        };
    }

    let scores: Vec<NeighborScore> = neighbors
        .iter()
        .enumerate()
        .map(|(idx, n)| {
            let position_weight = if idx < 5 {
                1.0
            } else {
                (1.0 - (idx - 5) as f64 * 0.05).max(0.5)
            };
            score_neighbor(current_amount, n, position_weight)
        })
        .collect();

    combine_scores(&scores)
}

/// Whether the transaction's own assessment marks it as out of the ordinary.
///
/// A transaction without an assessment counts as unusual, same as a medium
/// level, so its risky lookalikes still surface first.
pub fn is_unusual(tx: &Transaction) -> bool {
    tx.risk_assessment
        .as_ref()
        .is_none_or(|a| a.level != RiskLevel::Low || !a.flags.is_empty())
}

/// Reorder neighbors for display by risk-category priority and truncate.
///
/// An unusual transaction surfaces its riskiest lookalikes first; a normal
/// one surfaces the safe company it keeps. Within a category the retrieval
/// order is preserved.
pub fn rank_for_display(
    unusual: bool,
    neighbors: &[SimilarTransaction],
    config: &SimilarityConfig,
) -> Vec<SimilarTransaction> {
    let priority = if unusual {
        [RiskBucket::High, RiskBucket::Medium, RiskBucket::Low]
    } else {
        [RiskBucket::Low, RiskBucket::Medium, RiskBucket::High]
    };

    let mut ranked = Vec::with_capacity(config.display_limit);
    for bucket in priority {
        for neighbor in neighbors.iter().filter(|n| bucket_of(n) == bucket) {
            ranked.push(neighbor.clone());
            if ranked.len() == config.display_limit {
                return ranked;
            }
        }
    }
    ranked
}

/// Risk signal recomputed over the displayed neighbors, with the fixed
/// per-rank position weights.
pub fn display_risk_score(
    current_amount: f64,
    displayed: &[SimilarTransaction],
    corpus_size: u64,
    config: &SimilarityConfig,
) -> f64 {
    if displayed.is_empty() {
        return if corpus_size > config.min_corpus_size {
            0.75
        } else {
            NEUTRAL_SCORE
        };
    }

    let scores: Vec<NeighborScore> = displayed
        .iter()
        .take(DISPLAY_POSITION_WEIGHTS.len())
        .enumerate()
        .map(|(idx, n)| score_neighbor(current_amount, n, DISPLAY_POSITION_WEIGHTS[idx]))
        .collect();

    combine_scores(&scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{Merchant, RiskAssessment, RiskDiagnostics};
    use chrono::Utc;
    use proptest::prelude::*;

    fn neighbor(id: &str, amount: f64, similarity: f64, level: Option<RiskLevel>) -> SimilarTransaction {
        SimilarTransaction {
            transaction_id: id.to_string(),
            timestamp: Utc::now(),
            amount,
            merchant: Merchant::default(),
            transaction_type: "purchase".to_string(),
            payment_method: "credit_card".to_string(),
            risk_assessment: level.map(|level| RiskAssessment {
                score: match level {
                    RiskLevel::Low => 10.0,
                    RiskLevel::Medium => 45.0,
                    RiskLevel::High => 80.0,
                },
                level,
                flags: if level == RiskLevel::High {
                    vec![
                        "unusual_amount".to_string(),
                        "unknown_device".to_string(),
                    ]
                } else {
                    vec![]
                },
                disposition: level.into(),
                diagnostics: RiskDiagnostics::default(),
            }),
            similarity,
        }
    }

    fn config() -> SimilarityConfig {
        SimilarityConfig::default()
    }

    #[test]
    fn test_zero_neighbors_depends_on_corpus_size() {
        assert_eq!(similarity_risk_score(50.0, &[], 15, &config()), 0.75);
        assert_eq!(similarity_risk_score(50.0, &[], 5, &config()), 0.5);
    }

    #[test]
    fn test_high_risk_neighbors_dominate() {
        let neighbors = vec![
            neighbor("t1", 100.0, 0.95, Some(RiskLevel::High)),
            neighbor("t2", 100.0, 0.9, Some(RiskLevel::High)),
            neighbor("t3", 100.0, 0.85, Some(RiskLevel::Low)),
        ];
        let score = similarity_risk_score(100.0, &neighbors, 100, &config());
        // High bucket mean ~0.8 plus a 0.10 boost for two matches
        assert!(score > 0.8);
    }

    #[test]
    fn test_only_low_risk_neighbors_read_as_safe() {
        let neighbors = vec![
            neighbor("t1", 100.0, 0.95, Some(RiskLevel::Low)),
            neighbor("t2", 100.0, 0.93, Some(RiskLevel::Low)),
        ];
        let score = similarity_risk_score(100.0, &neighbors, 100, &config());
        assert!(score < 0.2);
        assert!(score >= 0.05);
    }

    #[test]
    fn test_missing_assessment_reads_as_medium() {
        let neighbors = vec![neighbor("t1", 100.0, 0.9, None)];
        let score = similarity_risk_score(100.0, &neighbors, 100, &config());
        // Mixed/medium path with risk_score 0.5
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_amount_similarity_buckets() {
        assert_eq!(amount_similarity(100.0, 98.0), 1.0);
        assert_eq!(amount_similarity(100.0, 85.0), 0.8);
        assert_eq!(amount_similarity(100.0, 60.0), 0.6);
        assert_eq!(amount_similarity(100.0, 10.0), 0.4);
        assert_eq!(amount_similarity(0.0, 10.0), 1.0);
    }

    #[test]
    fn test_display_ranking_priority() {
        let neighbors = vec![
            neighbor("low_1", 100.0, 0.9, Some(RiskLevel::Low)),
            neighbor("high_1", 100.0, 0.8, Some(RiskLevel::High)),
            neighbor("med_1", 100.0, 0.7, Some(RiskLevel::Medium)),
            neighbor("low_2", 100.0, 0.6, Some(RiskLevel::Low)),
        ];

        let unusual = rank_for_display(true, &neighbors, &config());
        let ids: Vec<&str> = unusual.iter().map(|n| n.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["high_1", "med_1", "low_1", "low_2"]);

        let normal = rank_for_display(false, &neighbors, &config());
        let ids: Vec<&str> = normal.iter().map(|n| n.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["low_1", "low_2", "med_1", "high_1"]);
    }

    #[test]
    fn test_display_ranking_truncates() {
        let neighbors: Vec<SimilarTransaction> = (0..8)
            .map(|i| neighbor(&format!("t{i}"), 100.0, 0.9, Some(RiskLevel::Low)))
            .collect();
        assert_eq!(rank_for_display(false, &neighbors, &config()).len(), 5);
    }

    #[test]
    fn test_is_unusual_predicate() {
        let mut tx = Transaction::new("tx", Some("c".to_string()), 10.0);
        // No assessment yet reads as unusual, matching the medium default.
        assert!(is_unusual(&tx));

        tx.risk_assessment = Some(RiskAssessment {
            score: 10.0,
            level: RiskLevel::Low,
            flags: vec![],
            disposition: Disposition::Legitimate,
            diagnostics: RiskDiagnostics::default(),
        });
        assert!(!is_unusual(&tx));

        tx.risk_assessment = Some(RiskAssessment {
            score: 10.0,
            level: RiskLevel::Low,
            flags: vec!["unknown_device".to_string()],
            disposition: Disposition::Legitimate,
            diagnostics: RiskDiagnostics::default(),
        });
        assert!(is_unusual(&tx));
    }

    proptest! {
        #[test]
        fn prop_score_always_in_unit_range(
            sims in prop::collection::vec(0.0f64..=1.0, 0..15),
            amount in 0.0f64..10_000.0,
            corpus in 0u64..1000,
        ) {
            let neighbors: Vec<SimilarTransaction> = sims
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let level = match i % 4 {
                        0 => Some(RiskLevel::Low),
                        1 => Some(RiskLevel::Medium),
                        2 => Some(RiskLevel::High),
                        _ => None,
                    };
                    neighbor(&format!("t{i}"), amount * 0.5, *s, level)
                })
                .collect();
            let score = similarity_risk_score(amount, &neighbors, corpus, &config());
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
