use std::sync::Arc;

use outbreak_cluster::cache::CacheOutcome;
use outbreak_cluster::utils::arrow::cases::cluster_labels;
use outbreak_cluster::{
    CLUSTER_COLUMN, ClusterConfig, ClusterEngine, Error, FileMatrixStore, MatrixStore,
    MemoryMatrixStore, NOISE,
};

use crate::utils::{CENTER, Row, case_batch, cases, date, north_of_center, test_config};

/// Two COVID clusters, one Dengue cluster and a lone Zika case, interleaved
fn mixed_rows() -> Vec<Row<'static>> {
    let d = date(2025, 10, 10);
    vec![
        ("Dengue", CENTER.0, CENTER.1, d, "Centro"),
        ("COVID", CENTER.0, CENTER.1, d, "Centro"),
        ("COVID", north_of_center(40.0), CENTER.1, d, "Zona Norte"),
        ("Dengue", north_of_center(0.05), CENTER.1, d, "Centro"),
        ("COVID", north_of_center(0.5), CENTER.1, d, "Centro"),
        ("COVID", north_of_center(40.5), CENTER.1, d, "Zona Norte"),
        ("Dengue", north_of_center(0.1), CENTER.1, d, "Centro"),
        ("Zika", CENTER.0, CENTER.1, d, "Centro"),
    ]
}

/// COVID is clustered first (ids 0, 1), Dengue continues at 2
const MIXED_LABELS: [i32; 8] = [2, 0, 1, 2, 0, 1, 2, -1];

#[test]
fn test_three_close_cases_form_one_cluster() {
    let d = date(2025, 10, 10);
    let rows = [
        ("Dengue", CENTER.0, CENTER.1, d, "Centro"),
        ("Dengue", north_of_center(0.05), CENTER.1, d, "Centro"),
        ("Dengue", north_of_center(0.1), CENTER.1, d, "Centro"),
    ];
    let engine = ClusterEngine::new(test_config()).unwrap();
    let labeled = engine.cluster_batch(&case_batch(&rows)).unwrap();

    assert!(labeled.is_complete());
    assert_eq!(cluster_labels(&labeled.batch).unwrap(), vec![0, 0, 0]);
}

#[test]
fn test_distant_pair_is_noise() {
    let d = date(2025, 10, 10);
    let rows = [
        ("Dengue", CENTER.0, CENTER.1, d, "Centro"),
        ("Dengue", north_of_center(50.0), CENTER.1, d, "Zona Norte"),
    ];
    let engine = ClusterEngine::new(test_config()).unwrap();
    let labels = engine.cluster_cases(&cases(&rows)).unwrap().into_labels().unwrap();
    assert_eq!(labels, vec![NOISE, NOISE]);
}

#[test]
fn test_lone_case_is_noise() {
    let rows = [("Zika", CENTER.0, CENTER.1, date(2025, 1, 1), "Centro")];
    let engine = ClusterEngine::new(test_config()).unwrap();
    let assignment = engine.cluster_cases(&cases(&rows)).unwrap();
    assert_eq!(assignment.labels, vec![Some(NOISE)]);
    assert_eq!(assignment.cluster_count(), 0);
    assert_eq!(assignment.noise_count(), 1);
}

#[test]
fn test_empty_table_yields_empty_labeled_table() {
    let engine = ClusterEngine::new(test_config()).unwrap();
    let labeled = engine.cluster_batch(&case_batch(&[])).unwrap();
    assert_eq!(labeled.batch.num_rows(), 0);
    assert!(labeled.batch.schema().index_of(CLUSTER_COLUMN).is_ok());
    assert!(labeled.groups.is_empty());
}

#[test]
fn test_ids_are_rebased_across_diagnoses() {
    let engine = ClusterEngine::new(test_config()).unwrap();
    let labeled = engine.cluster_batch(&case_batch(&mixed_rows())).unwrap();

    assert_eq!(cluster_labels(&labeled.batch).unwrap(), MIXED_LABELS.to_vec());
    let offsets: Vec<(&str, i32, usize)> = labeled
        .groups
        .iter()
        .map(|g| (g.diagnosis.as_str(), g.offset, g.clusters))
        .collect();
    assert_eq!(offsets, vec![("COVID", 0, 2), ("Dengue", 2, 1), ("Zika", 3, 0)]);
}

#[test]
fn test_rows_and_pass_through_columns_are_preserved() {
    let batch = case_batch(&mixed_rows());
    let engine = ClusterEngine::new(test_config()).unwrap();
    let labeled = engine.cluster_batch(&batch).unwrap().into_complete().unwrap();

    assert_eq!(labeled.num_rows(), batch.num_rows());
    assert_eq!(labeled.num_columns(), batch.num_columns() + 1);
    for (idx, field) in batch.schema().fields().iter().enumerate() {
        assert_eq!(labeled.column(idx).as_ref(), batch.column(idx).as_ref(), "{}", field.name());
    }
}

#[test]
fn test_relabeling_replaces_cluster_column() {
    let engine = ClusterEngine::new(test_config()).unwrap();
    let first = engine
        .cluster_batch(&case_batch(&mixed_rows()))
        .unwrap()
        .into_complete()
        .unwrap();
    let second = engine.cluster_batch(&first).unwrap().into_complete().unwrap();

    assert_eq!(second.num_columns(), first.num_columns());
    assert_eq!(cluster_labels(&second).unwrap(), MIXED_LABELS.to_vec());
}

#[test]
fn test_runs_are_deterministic() {
    let rows = mixed_rows();
    let sequential = ClusterEngine::new(test_config()).unwrap();
    let parallel = ClusterEngine::new(ClusterConfig {
        parallel: true,
        threads: Some(4),
        ..ClusterConfig::default()
    })
    .unwrap();

    let expected = sequential.cluster_cases(&cases(&rows)).unwrap().into_labels().unwrap();
    for _ in 0..5 {
        let labels = parallel.cluster_cases(&cases(&rows)).unwrap().into_labels().unwrap();
        assert_eq!(labels, expected);
    }
}

#[test]
fn test_failed_group_is_isolated() {
    let mut rows = mixed_rows();
    let d = date(2025, 10, 10);
    rows.push(("Anthrax", 95.0, CENTER.1, d, "Centro"));
    rows.push(("Anthrax", CENTER.0, CENTER.1, d, "Centro"));

    let engine = ClusterEngine::new(test_config()).unwrap();
    let labeled = engine.cluster_batch(&case_batch(&rows)).unwrap();

    assert!(!labeled.is_complete());
    assert_eq!(labeled.failures.len(), 1);
    assert_eq!(labeled.failures[0].diagnosis, "Anthrax");
    assert!(matches!(labeled.failures[0].error, Error::InvalidInput(_)));

    // The failed group sorts first but does not shift the other groups' ids
    assert_eq!(labeled.batch.num_rows(), 8);
    assert_eq!(cluster_labels(&labeled.batch).unwrap(), MIXED_LABELS.to_vec());

    assert!(matches!(
        labeled.into_complete(),
        Err(Error::GroupFailed { ref diagnosis, .. }) if diagnosis == "Anthrax"
    ));
}

#[test]
fn test_assignment_leaves_failed_cases_unlabeled() {
    let d = date(2025, 10, 10);
    let rows = [
        ("Zika", f64::NAN, CENTER.1, d, "Centro"),
        ("Dengue", CENTER.0, CENTER.1, d, "Centro"),
        ("Zika", CENTER.0, CENTER.1, d, "Centro"),
        ("Dengue", CENTER.0, CENTER.1, d, "Centro"),
    ];
    let engine = ClusterEngine::new(test_config()).unwrap();
    let assignment = engine.cluster_cases(&cases(&rows)).unwrap();

    assert_eq!(assignment.labels, vec![None, Some(0), None, Some(0)]);
    assert!(assignment.into_labels().is_err());
}

#[test]
fn test_persistent_cache_is_extended() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn MatrixStore> = Arc::new(FileMatrixStore::new(dir.path()).unwrap());
    let engine = ClusterEngine::with_store(test_config(), Arc::clone(&store)).unwrap();

    let mut rows = mixed_rows();
    let first = engine.cluster_cases(&cases(&rows)).unwrap();
    assert!(first.groups.iter().all(|g| g.cache == CacheOutcome::Built));

    rows.push(("Dengue", north_of_center(0.15), CENTER.1, date(2025, 10, 11), "Centro"));
    let second = engine.cluster_cases(&cases(&rows)).unwrap();
    let dengue = second.groups.iter().find(|g| g.diagnosis == "Dengue").unwrap();
    assert_eq!(dengue.cache, CacheOutcome::Extended { reused: 3, added: 1 });
    let covid = second.groups.iter().find(|g| g.diagnosis == "COVID").unwrap();
    assert_eq!(covid.cache, CacheOutcome::Extended { reused: 4, added: 0 });

    // Same labels as a run without any cache
    let fresh = ClusterEngine::new(test_config()).unwrap();
    assert_eq!(
        second.into_labels().unwrap(),
        fresh.cluster_cases(&cases(&rows)).unwrap().into_labels().unwrap()
    );
    assert_eq!(store.load("Dengue").unwrap().unwrap().len(), 4);
}

#[test]
fn test_removed_case_rebuilds_cache() {
    let store = Arc::new(MemoryMatrixStore::new());
    let engine = ClusterEngine::with_store(test_config(), store.clone()).unwrap();

    let rows = mixed_rows();
    engine.cluster_cases(&cases(&rows)).unwrap();

    // Drop the first Dengue case; the cached Dengue prefix no longer matches
    let trimmed: Vec<Row<'_>> = rows[1..].to_vec();
    let run = engine.cluster_cases(&cases(&trimmed)).unwrap();
    let dengue = run.groups.iter().find(|g| g.diagnosis == "Dengue").unwrap();
    assert!(matches!(dengue.cache, CacheOutcome::Rebuilt { .. }));
    assert_eq!(store.load("Dengue").unwrap().unwrap().len(), 2);
}

#[test]
fn test_concurrent_runs_serialize() {
    let engine = Arc::new(ClusterEngine::new(ClusterConfig::default()).unwrap());
    let rows = mixed_rows();
    let expected = MIXED_LABELS.to_vec();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let cases = cases(&rows);
            std::thread::spawn(move || engine.cluster_cases(&cases).unwrap().into_labels().unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_invalid_parameters_are_rejected() {
    let config = ClusterConfig {
        eps: 0.0,
        ..test_config()
    };
    assert!(matches!(ClusterEngine::new(config), Err(Error::Config(_))));

    let config = ClusterConfig {
        min_samples: 0,
        ..test_config()
    };
    assert!(matches!(ClusterEngine::new(config), Err(Error::Config(_))));
}

#[test]
fn test_progress_does_not_change_labels() {
    let batch = case_batch(&mixed_rows());
    for parallel in [false, true] {
        let config = ClusterConfig { parallel, ..test_config() };
        let engine = ClusterEngine::new(config).unwrap().with_progress(true);
        let labeled = engine.cluster_batch(&batch).unwrap();
        assert_eq!(cluster_labels(&labeled.batch).unwrap(), MIXED_LABELS.to_vec());
    }
}
