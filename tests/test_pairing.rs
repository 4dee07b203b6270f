mod common;

use common::{synthetic_product, PRIMARY, SECONDARY, THIRD};
use sarcoh::core::Product;
use sarcoh::pipeline::pairing::{check_pair, group_by_subswath};
use sarcoh::pipeline::{resolve_pairs, PairingPolicy, PairingStrategy};
use sarcoh::{SarError, Subswath};

fn stack() -> Vec<Product> {
    vec![
        synthetic_product("A", PRIMARY.start, 30639, 36.80, 50, 20),
        synthetic_product("B", SECONDARY.start, 30814, 36.802, 50, 20),
        synthetic_product("C", THIRD.start, 30989, 36.801, 50, 20),
    ]
}

#[test]
fn test_first_two_is_the_default() {
    let products = stack();
    let pairs = resolve_pairs(&products, &PairingStrategy::default()).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].primary.name.as_str(), pairs[0].secondary.name.as_str()), ("A", "B"));
}

#[test]
fn test_strategy_candidates() {
    let products = stack();
    assert_eq!(PairingStrategy::Sequential.candidates(&products), vec![(0, 1), (1, 2)]);
    assert_eq!(PairingStrategy::AllCombinations.candidates(&products), vec![(0, 1), (0, 2), (1, 2)]);
    assert_eq!(
        PairingStrategy::MaxTemporalBaseline { days: 12 }.candidates(&products),
        vec![(0, 1), (1, 2)]
    );
    let err = resolve_pairs(&products, &PairingStrategy::MaxTemporalBaseline { days: 5 }).unwrap_err();
    assert!(matches!(err, SarError::InsufficientAcquisitions(_)));
}

#[test]
fn test_single_acquisition_is_insufficient() {
    let products = vec![synthetic_product("A", PRIMARY.start, 30639, 36.80, 50, 20)];
    assert!(matches!(
        resolve_pairs(&products, &PairingStrategy::FirstTwo),
        Err(SarError::InsufficientAcquisitions(_))
    ));
}

#[test]
fn test_incompatible_pairs() {
    let a = synthetic_product("A", PRIMARY.start, 30639, 36.80, 50, 20);

    let same_time = synthetic_product("A2", PRIMARY.start, 30639, 36.80, 50, 20);
    assert!(matches!(check_pair(&a, &same_time), Err(SarError::IncompatiblePair(_))));

    let other_track = synthetic_product("B", SECONDARY.start, 30815, 36.802, 50, 20);
    let err = check_pair(&a, &other_track).unwrap_err();
    assert!(err.to_string().contains("relative orbits"));

    let far_away = synthetic_product("F", SECONDARY.start, 30814, 40.0, 50, 20);
    let err = check_pair(&a, &far_away).unwrap_err();
    assert!(err.to_string().contains("footprints"));

    let products = vec![a, far_away];
    assert!(matches!(
        resolve_pairs(&products, &PairingStrategy::FirstTwo),
        Err(SarError::IncompatiblePair(_))
    ));
}

#[test]
fn test_grouping_keeps_order() {
    let grouped = group_by_subswath(stack()).unwrap();
    assert_eq!(grouped.len(), 1);
    let names: Vec<&str> = grouped[&Subswath::IW2].iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

struct LastTwo;

impl PairingPolicy for LastTwo {
    fn candidates(&self, products: &[Product]) -> Vec<(usize, usize)> {
        let n = products.len();
        vec![(n - 2, n - 1)]
    }
}

#[test]
fn test_custom_policy() {
    let products = stack();
    let pairs = resolve_pairs(&products, &LastTwo).unwrap();
    assert_eq!((pairs[0].primary_index, pairs[0].secondary_index), (1, 2));
}

struct Fixed(Vec<(usize, usize)>);

impl PairingPolicy for Fixed {
    fn candidates(&self, _products: &[Product]) -> Vec<(usize, usize)> {
        self.0.clone()
    }
}

#[test]
fn test_bad_policy_indices_are_rejected() {
    let products = stack();
    for bad in [vec![(0, 3)], vec![(7, 1)], vec![(1, 1)]] {
        let err = resolve_pairs(&products, &Fixed(bad.clone())).unwrap_err();
        assert!(matches!(err, SarError::InvalidParameter(_)), "{:?} gave {:?}", bad, err);
    }
}
