use std::fs;

use outbreak_cluster::cache::CachedMatrix;
use outbreak_cluster::{Case, FileMatrixStore, HybridMetric, MatrixStore, MemoryMatrixStore};

use crate::utils::{CENTER, date, north_of_center};

fn entry(diagnosis: &str, n: usize) -> CachedMatrix {
    let cases: Vec<Case> = (0..n)
        .map(|i| {
            Case::new(i, diagnosis, north_of_center(i as f64 * 0.3), CENTER.1, date(2025, 4, 1))
                .with_id(format!("{diagnosis}-{i}"))
        })
        .collect();
    CachedMatrix::build(diagnosis, &cases, &HybridMetric::default()).unwrap()
}

#[test]
fn test_file_store_persists_entries() {
    let dir = tempfile::tempdir().unwrap();
    let stored = entry("Influenza", 5);
    {
        let store = FileMatrixStore::new(dir.path()).unwrap();
        store.save(&stored).unwrap();
    }

    // A new store over the same directory sees the same entry
    let store = FileMatrixStore::new(dir.path()).unwrap();
    assert_eq!(store.load("Influenza").unwrap(), Some(stored));
    assert_eq!(store.load("Zika").unwrap(), None);
}

#[test]
fn test_save_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMatrixStore::new(dir.path()).unwrap();
    store.save(&entry("Dengue", 3)).unwrap();
    store.save(&entry("Dengue", 4)).unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["matrix_Dengue.json".to_string()]);
    assert_eq!(store.load("Dengue").unwrap().unwrap().len(), 4);
}

#[test]
fn test_corrupt_artifact_is_treated_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMatrixStore::new(dir.path()).unwrap();

    fs::write(store.path_for("Dengue"), b"{\"format_version\": 1, \"diag").unwrap();
    assert_eq!(store.load("Dengue").unwrap(), None);
}

#[test]
fn test_wrong_version_and_shape_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMatrixStore::new(dir.path()).unwrap();
    store.save(&entry("Zika", 3)).unwrap();
    let path = store.path_for("Zika");
    let original: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    let mut wrong_version = original.clone();
    wrong_version["format_version"] = serde_json::json!(99);
    fs::write(&path, wrong_version.to_string()).unwrap();
    assert_eq!(store.load("Zika").unwrap(), None);

    let mut wrong_shape = original;
    wrong_shape["values"].as_array_mut().unwrap().pop();
    fs::write(&path, wrong_shape.to_string()).unwrap();
    assert_eq!(store.load("Zika").unwrap(), None);
}

#[test]
fn test_invalidate_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMatrixStore::new(dir.path()).unwrap();
    for diagnosis in ["COVID", "Dengue", "Zika"] {
        store.save(&entry(diagnosis, 2)).unwrap();
    }
    fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

    store.invalidate("COVID").unwrap();
    store.invalidate("COVID").unwrap();
    assert_eq!(store.load("COVID").unwrap(), None);
    assert!(store.load("Dengue").unwrap().is_some());

    store.clear().unwrap();
    assert_eq!(store.load("Dengue").unwrap(), None);
    assert!(dir.path().join("notes.txt").exists());
}

#[test]
fn test_diagnoses_with_special_characters() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMatrixStore::new(dir.path()).unwrap();
    let first = entry("COVID 19", 2);
    let second = entry("COVID/19", 3);
    store.save(&first).unwrap();
    store.save(&second).unwrap();

    assert_eq!(store.load("COVID 19").unwrap(), Some(first));
    assert_eq!(store.load("COVID/19").unwrap(), Some(second));
}

#[test]
fn test_memory_store() {
    let store = MemoryMatrixStore::new();
    store.save(&entry("Dengue", 2)).unwrap();
    store.save(&entry("Zika", 2)).unwrap();
    assert_eq!(store.len().unwrap(), 2);

    store.invalidate("Dengue").unwrap();
    assert_eq!(store.load("Dengue").unwrap(), None);
    store.clear().unwrap();
    assert_eq!(store.len().unwrap(), 0);
}

#[test]
fn test_escaped_looking_names_keep_their_own_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileMatrixStore::new(dir.path()).unwrap();

    // "X__583a" is what a naive escape of "X:" would produce
    assert_ne!(store.path_for("X:"), store.path_for("X__583a"));
    assert_ne!(store.path_for("Flu_A"), store.path_for("Flu A"));

    let colon = entry("X:", 3);
    let lookalike = entry("X__583a", 4);
    store.save(&colon).unwrap();
    store.save(&lookalike).unwrap();
    assert_eq!(store.load("X:").unwrap(), Some(colon));
    assert_eq!(store.load("X__583a").unwrap(), Some(lookalike));
}
