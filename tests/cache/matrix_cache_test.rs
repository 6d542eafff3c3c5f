use outbreak_cluster::cache::{CacheOutcome, CachedMatrix, DistanceMatrix, extend_or_rebuild};
use outbreak_cluster::{Case, Error, HybridMetric};

use crate::utils::{CENTER, date, north_of_center};

fn outbreak(n: usize) -> Vec<Case> {
    (0..n)
        .map(|i| {
            Case::new(
                i,
                "Dengue",
                north_of_center(i as f64 * 0.7),
                CENTER.1 + i as f64 * 0.001,
                date(2025, 2, 1 + (i as u32 % 20)),
            )
        })
        .collect()
}

#[test]
fn test_incremental_equals_from_scratch() {
    let metric = HybridMetric::default();
    let cases = outbreak(12);

    let mut entry = CachedMatrix::build("Dengue", &cases[..4], &metric).unwrap();
    for end in [7, 7, 12] {
        entry = entry.extend(&cases[..end], &metric).unwrap();
    }

    assert_eq!(entry.matrix, DistanceMatrix::build(&cases, &metric).unwrap());
    assert_eq!(entry.keys.len(), 12);
}

#[test]
fn test_extend_then_truncate_restores_old_matrix() {
    let metric = HybridMetric::default();
    let cases = outbreak(9);
    let old = DistanceMatrix::build(&cases[..5], &metric).unwrap();
    let grown = old.extend(&cases, &metric).unwrap();

    assert_eq!(grown.len(), 9);
    assert_eq!(grown.truncate(5), old);
}

#[test]
fn test_matrix_is_symmetric_with_zero_diagonal() {
    let metric = HybridMetric::default();
    let matrix = DistanceMatrix::build(&outbreak(6), &metric).unwrap();
    for i in 0..matrix.len() {
        assert_eq!(matrix.get(i, i), 0.0);
        for j in 0..matrix.len() {
            assert_eq!(matrix.get(i, j), matrix.get(j, i));
        }
    }
}

#[test]
fn test_prefix_violations_are_detected() {
    let metric = HybridMetric::default();
    let cases = outbreak(6);
    let cached = CachedMatrix::build("Dengue", &cases[..4], &metric).unwrap();

    // Reordered
    let mut reordered = cases.clone();
    reordered.swap(0, 1);
    // Deleted
    let deleted: Vec<Case> = cases.iter().skip(1).cloned().collect();
    // Edited date
    let mut edited = cases.clone();
    edited[2].date = date(2025, 5, 5);
    // Fewer cases than cached
    let shrunk = cases[..3].to_vec();

    for current in [&reordered, &deleted, &edited, &shrunk] {
        assert!(matches!(
            cached.validate_prefix(current, &metric),
            Err(Error::CacheIntegrity { .. })
        ));
        let (entry, outcome) =
            extend_or_rebuild("Dengue", Some(cached.clone()), current, &metric).unwrap();
        assert!(matches!(outcome, CacheOutcome::Rebuilt { .. }));
        assert_eq!(entry.matrix, DistanceMatrix::build(current, &metric).unwrap());
    }
}

#[test]
fn test_changed_id_breaks_prefix() {
    let metric = HybridMetric::default();
    let cases: Vec<Case> = outbreak(3)
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.with_id(format!("p{i}")))
        .collect();
    let cached = CachedMatrix::build("Dengue", &cases, &metric).unwrap();

    let mut renamed = cases.clone();
    renamed[0] = renamed[0].clone().with_id("someone-else");
    assert!(cached.validate_prefix(&renamed, &metric).is_err());
    assert!(cached.validate_prefix(&cases, &metric).is_ok());
}

#[test]
fn test_changed_weights_rebuild() {
    let cases = outbreak(4);
    let cached = CachedMatrix::build("Dengue", &cases, &HybridMetric::default()).unwrap();
    let heavier = HybridMetric::new(1.0 / 15.0, 5.0);

    let (entry, outcome) = extend_or_rebuild("Dengue", Some(cached), &cases, &heavier).unwrap();
    assert!(matches!(outcome, CacheOutcome::Rebuilt { .. }));
    assert_eq!(entry.metric, heavier);
}

#[test]
fn test_invalid_new_case_propagates() {
    let metric = HybridMetric::default();
    let mut cases = outbreak(3);
    let cached = CachedMatrix::build("Dengue", &cases, &metric).unwrap();
    cases.push(Case::new(3, "Dengue", 123.0, CENTER.1, date(2025, 2, 1)));

    assert!(matches!(
        extend_or_rebuild("Dengue", Some(cached), &cases, &metric),
        Err(Error::InvalidInput(_))
    ));
}
