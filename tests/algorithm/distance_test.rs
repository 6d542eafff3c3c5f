use crate::utils::{CENTER, assert_close, date, north_of_center};
use outbreak_cluster::algorithm::distance::haversine_km;
use outbreak_cluster::{Case, Error, GeoPoint, HybridMetric};

/// Distance is symmetric and zero on identical cases
#[test]
fn test_symmetry_and_identity() {
    let metric = HybridMetric::default();
    let points = [
        Case::new(0, "Dengue", CENTER.0, CENTER.1, date(2025, 10, 1)),
        Case::new(1, "Dengue", north_of_center(3.0), CENTER.1, date(2025, 10, 20)),
        Case::new(2, "Dengue", -23.5505, -46.6333, date(2024, 12, 31)),
        Case::new(3, "Dengue", 89.9, 179.9, date(2025, 1, 1)),
    ];

    for a in &points {
        assert_eq!(metric.distance(a, a).unwrap(), 0.0);
        for b in &points {
            let ab = metric.distance(a, b).unwrap();
            let ba = metric.distance(b, a).unwrap();
            assert_eq!(ab, ba);
            assert!(ab >= 0.0);
        }
    }
}

/// Geographic and temporal terms add up
#[test]
fn test_terms_are_additive() {
    let metric = HybridMetric::default();
    let a = Case::new(0, "Zika", CENTER.0, CENTER.1, date(2025, 3, 1));
    let b = Case::new(1, "Zika", north_of_center(2.0), CENTER.1, date(2025, 3, 13));

    // 2 km apart, 12 days apart -> 2 + 12 * 5/30 = 4 km-equivalent
    assert_close(metric.distance(&a, &b).unwrap(), 4.0, 1e-6);
}

/// Zero time weights reduce the metric to plain haversine
#[test]
fn test_zero_weight_is_pure_geography() {
    let metric = HybridMetric::new(0.0, 5.0);
    let a = GeoPoint::new(CENTER.0, CENTER.1);
    let b = GeoPoint::new(-27.5954, -48.5480);
    let d = metric
        .between(&a, date(2020, 1, 1), &b, date(2025, 1, 1))
        .unwrap();
    assert_eq!(d, haversine_km(&a, &b));
}

/// Invalid coordinates fail loudly
#[test]
fn test_invalid_coordinates() {
    let metric = HybridMetric::default();
    let good = Case::new(0, "COVID", CENTER.0, CENTER.1, date(2025, 1, 1));
    let bad = [
        Case::new(1, "COVID", f64::NAN, CENTER.1, date(2025, 1, 1)),
        Case::new(2, "COVID", CENTER.0, f64::INFINITY, date(2025, 1, 1)),
        Case::new(3, "COVID", -90.5, CENTER.1, date(2025, 1, 1)),
        Case::new(4, "COVID", CENTER.0, 181.0, date(2025, 1, 1)),
    ];
    for case in &bad {
        assert!(matches!(
            metric.distance(&good, case),
            Err(Error::InvalidInput(_))
        ));
    }
}
