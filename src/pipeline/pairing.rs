//! Selection of interferometric pairs within a sub-swath

use crate::core::product::Product;
use crate::types::{SarError, SarResult, Subswath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Split products per sub-swath, in acquisition (discovery) order
pub type SubswathGroup = BTreeMap<Subswath, Vec<Product>>;

/// Group single-swath products by their sub-swath, keeping their order
pub fn group_by_subswath(products: Vec<Product>) -> SarResult<SubswathGroup> {
    let mut group = SubswathGroup::new();
    for product in products {
        group.entry(product.subswath()?).or_default().push(product);
    }
    Ok(group)
}

/// Ordered (primary, secondary) pair with the members' positions in their group
#[derive(Debug, Clone, Copy)]
pub struct InterferometricPair<'a> {
    pub primary: &'a Product,
    pub secondary: &'a Product,
    pub primary_index: usize,
    pub secondary_index: usize,
}

/// Chooses candidate (primary, secondary) index pairs from an ordered group
pub trait PairingPolicy {
    fn candidates(&self, products: &[Product]) -> Vec<(usize, usize)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PairingStrategy {
    /// Only the first two acquisitions
    #[default]
    FirstTwo,
    /// Each acquisition with the next one
    Sequential,
    /// Every (i, j) with i < j
    AllCombinations,
    /// Every (i, j) with i < j acquired at most `days` apart
    MaxTemporalBaseline { days: i64 },
}

impl PairingPolicy for PairingStrategy {
    fn candidates(&self, products: &[Product]) -> Vec<(usize, usize)> {
        let n = products.len();
        match self {
            PairingStrategy::FirstTwo => {
                if n > 2 {
                    let ignored: Vec<&str> = products[2..].iter().map(|p| p.name.as_str()).collect();
                    log::warn!("Pairing only the first two acquisitions; ignoring {:?}", ignored);
                }
                if n >= 2 {
                    vec![(0, 1)]
                } else {
                    vec![]
                }
            }
            PairingStrategy::Sequential => (1..n).map(|j| (j - 1, j)).collect(),
            PairingStrategy::AllCombinations => {
                (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect()
            }
            PairingStrategy::MaxTemporalBaseline { days } => (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                .filter(|&(i, j)| {
                    let baseline = products[j].metadata.first_line_time - products[i].metadata.first_line_time;
                    baseline.num_days().abs() <= *days
                })
                .collect(),
        }
    }
}

/// Check that two products can form an interferometric pair
pub fn check_pair(primary: &Product, secondary: &Product) -> SarResult<()> {
    let incompatible = |reason: String| {
        SarError::IncompatiblePair(format!("{} / {}: {}", primary.name, secondary.name, reason))
    };

    if primary.name == secondary.name
        || primary.metadata.first_line_time == secondary.metadata.first_line_time
    {
        return Err(incompatible("same acquisition".to_string()));
    }
    let primary_swath = primary.subswath().map_err(|e| incompatible(e.to_string()))?;
    let secondary_swath = secondary.subswath().map_err(|e| incompatible(e.to_string()))?;
    if primary_swath != secondary_swath {
        return Err(incompatible(format!("sub-swaths differ ({} vs {})", primary_swath, secondary_swath)));
    }
    let primary_track = primary.metadata.relative_orbit();
    let secondary_track = secondary.metadata.relative_orbit();
    if primary_track != secondary_track {
        return Err(incompatible(format!(
            "relative orbits differ ({} vs {})",
            primary_track, secondary_track
        )));
    }
    if !primary.footprint()?.intersects(&secondary.footprint()?) {
        return Err(incompatible("footprints do not overlap".to_string()));
    }
    Ok(())
}

/// Resolve the pairs of one sub-swath group
pub fn resolve_pairs<'a>(
    products: &'a [Product],
    policy: &dyn PairingPolicy,
) -> SarResult<Vec<InterferometricPair<'a>>> {
    if products.len() < 2 {
        return Err(SarError::InsufficientAcquisitions(format!(
            "Pairing needs at least 2 acquisitions, got {}",
            products.len()
        )));
    }

    let candidates = policy.candidates(products);
    if candidates.is_empty() {
        return Err(SarError::InsufficientAcquisitions(format!(
            "No acquisition pair satisfies the pairing policy among {} acquisitions",
            products.len()
        )));
    }

    candidates
        .into_iter()
        .map(|(i, j)| {
            if i == j {
                return Err(SarError::InvalidParameter(format!(
                    "Pairing policy paired acquisition {} with itself",
                    i
                )));
            }
            let (Some(primary), Some(secondary)) = (products.get(i), products.get(j)) else {
                return Err(SarError::InvalidParameter(format!(
                    "Pairing policy returned ({}, {}) for a group of {} acquisitions",
                    i,
                    j,
                    products.len()
                )));
            };
            check_pair(primary, secondary)?;
            log::info!("Pair ({}, {}): {} / {}", i, j, primary.name, secondary.name);
            Ok(InterferometricPair { primary, secondary, primary_index: i, secondary_index: j })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_shapes() {
        // Index generation only depends on the group size
        let strategy = PairingStrategy::AllCombinations;
        let empty: Vec<Product> = Vec::new();
        assert!(strategy.candidates(&empty).is_empty());
        assert!(PairingStrategy::Sequential.candidates(&empty).is_empty());
    }

    #[test]
    fn test_strategy_serde() {
        let parsed: PairingStrategy = serde_json::from_str(r#"{"type":"max_temporal_baseline","days":24}"#).unwrap();
        assert_eq!(parsed, PairingStrategy::MaxTemporalBaseline { days: 24 });
        let parsed: PairingStrategy = serde_json::from_str(r#"{"type":"first_two"}"#).unwrap();
        assert_eq!(parsed, PairingStrategy::FirstTwo);
    }
}
