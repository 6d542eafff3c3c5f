use std::collections::HashSet;

use outbreak_cluster::filter::BatchFilter;
use outbreak_cluster::report::{ClusterSummary, ClusteredOnlyFilter, publish_labeled};
use outbreak_cluster::utils::arrow::cases::cluster_labels;
use outbreak_cluster::{CLUSTER_COLUMN, ClusterEngine, ColumnConfig, Error, read_case_table};

use crate::utils::{CENTER, assert_close, case_batch, date, north_of_center, test_config};

fn labeled() -> arrow::record_batch::RecordBatch {
    let d = date(2025, 10, 10);
    let rows = [
        ("Dengue", CENTER.0, CENTER.1, d, "Centro"),
        ("Dengue", north_of_center(0.2), CENTER.1, date(2025, 10, 12), "Centro"),
        ("Dengue", north_of_center(0.4), CENTER.1, d, "Iririú"),
        ("Dengue", north_of_center(60.0), CENTER.1, d, "Zona Norte"),
        ("Zika", CENTER.0, CENTER.1, d, "Centro"),
    ];
    let engine = ClusterEngine::new(test_config()).unwrap();
    engine
        .cluster_batch(&case_batch(&rows))
        .unwrap()
        .into_complete()
        .unwrap()
}

#[test]
fn test_summary_counts() {
    let batch = labeled();
    let summary = ClusterSummary::from_batch(&batch, &ColumnConfig::default()).unwrap();

    assert_eq!(summary.total_cases, 5);
    assert_eq!(summary.total_clusters, 1);
    assert_eq!(summary.total_noise, 2);

    let dengue = &summary.diagnoses[0];
    assert_eq!(dengue.diagnosis, "Dengue");
    assert_eq!((dengue.cases, dengue.clustered, dengue.noise), (4, 3, 1));
    assert_eq!(dengue.neighborhoods[0].neighborhood, "Centro");
    assert_eq!(dengue.neighborhoods[0].cases, 2);
    assert_close(dengue.neighborhoods[0].percentage, 50.0, 1e-9);
    let total: f64 = dengue.neighborhoods.iter().map(|n| n.percentage).sum();
    assert_close(total, 100.0, 1e-9);

    let cluster = &summary.clusters[0];
    assert_eq!((cluster.id, cluster.size), (0, 3));
    assert_eq!(cluster.diagnosis, "Dengue");
    assert_close(cluster.centroid_latitude, north_of_center(0.2), 1e-9);
    assert_eq!(cluster.first_date, date(2025, 10, 10));
    assert_eq!(cluster.last_date, date(2025, 10, 12));
}

#[test]
fn test_summary_without_neighborhood_column() {
    let batch = labeled();
    let columns = ColumnConfig {
        neighborhood: None,
        ..ColumnConfig::default()
    };
    let summary = ClusterSummary::from_batch(&batch, &columns).unwrap();
    assert!(summary.diagnoses.iter().all(|d| d.neighborhoods.is_empty()));
}

#[test]
fn test_summary_needs_labels() {
    let d = date(2025, 10, 10);
    let unlabeled = case_batch(&[("Dengue", CENTER.0, CENTER.1, d, "Centro")]);
    assert!(matches!(
        ClusterSummary::from_batch(&unlabeled, &ColumnConfig::default()),
        Err(Error::ColumnNotFound { .. })
    ));
}

#[test]
fn test_clustered_only_filter() {
    let batch = labeled();
    let filter = ClusteredOnlyFilter;
    let valid = filter.filter(&batch).unwrap();

    assert_eq!(valid.num_rows(), 3);
    assert_eq!(cluster_labels(&valid).unwrap(), vec![0, 0, 0]);
    assert_eq!(
        filter.required_columns(),
        HashSet::from([CLUSTER_COLUMN.to_string()])
    );
}

#[test]
fn test_publish_writes_table_then_summary() {
    let dir = tempfile::tempdir().unwrap();
    let batch = labeled();
    let output = dir.path().join("labeled.parquet");
    let summary_path = dir.path().join("summary.json");

    let summary = publish_labeled(&batch, &ColumnConfig::default(), &output, Some(&summary_path), true)
        .unwrap()
        .unwrap();
    assert_eq!(summary.total_cases, 5);

    // Noise rows are left out of the table but still counted in the summary
    let written = read_case_table(&output).unwrap();
    assert_eq!(written.num_rows(), 5 - summary.total_noise);
    assert!(summary_path.exists());
}

#[test]
fn test_failed_table_write_leaves_summary_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let summary_path = dir.path().join("summary.json");
    std::fs::write(&summary_path, b"previous").unwrap();

    let result = publish_labeled(
        &labeled(),
        &ColumnConfig::default(),
        &dir.path().join("labeled.txt"),
        Some(&summary_path),
        false,
    );
    assert!(result.is_err());
    assert_eq!(std::fs::read(&summary_path).unwrap(), b"previous");
}
