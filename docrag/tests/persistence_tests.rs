//! File store persistence: round trips, atomic replacement, and load failures.

use std::sync::Arc;

use docrag::{FileIndexStore, IndexStore, LoadFailureReason, RagError, VectorIndex};
use proptest::prelude::*;

fn load_reason(err: RagError) -> LoadFailureReason {
    match err {
        RagError::LoadFailure { reason, .. } => reason,
        other => panic!("expected LoadFailure, got {other:?}"),
    }
}

fn arb_index() -> impl Strategy<Value = VectorIndex> {
    (1usize..6).prop_flat_map(|dim| {
        proptest::collection::vec(
            (
                "\\PC{0,40}",
                proptest::collection::vec((-512i32..512).prop_map(|x| x as f32 / 16.0), dim),
            ),
            1..12,
        )
        .prop_map(|entries| VectorIndex::build(entries).unwrap())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// *For any* valid index, loading what was saved SHALL yield an index with
    /// the same dimension, chunk texts, and vectors.
    #[test]
    fn save_then_load_round_trips(index in arb_index()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let loaded = rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = FileIndexStore::new(dir.path());
            store.save("doc", &index).await.unwrap();
            store.load("doc").await.unwrap()
        });
        prop_assert_eq!(loaded, index);
    }
}

#[tokio::test]
async fn missing_blob_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileIndexStore::new(dir.path());
    let err = store.load("document_404").await.unwrap_err();
    assert_eq!(load_reason(err), LoadFailureReason::NotFound);
}

#[tokio::test]
async fn corrupted_blob_is_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileIndexStore::new(dir.path());
    let index = VectorIndex::build(vec![("hello", vec![1.0, 2.0, 3.0])]).unwrap();
    store.save("doc", &index).await.unwrap();

    let path = store.path_for("doc").unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 5);
    std::fs::write(&path, &bytes).unwrap();

    let err = store.load("doc").await.unwrap_err();
    assert!(matches!(load_reason(err), LoadFailureReason::Corrupt(_)));
}

#[tokio::test]
async fn newer_format_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileIndexStore::new(dir.path());
    std::fs::write(
        store.path_for("doc").unwrap(),
        br#"{"format_version": 2, "dimension": 1, "chunk_count": 0, "chunks": "zstd:..."}"#,
    )
    .unwrap();

    let err = store.load("doc").await.unwrap_err();
    assert_eq!(load_reason(err), LoadFailureReason::UnsupportedVersion(2));
}

#[tokio::test]
async fn stale_temp_files_do_not_affect_loads() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileIndexStore::new(dir.path());
    let index = VectorIndex::build(vec![("kept", vec![0.5])]).unwrap();
    store.save("doc", &index).await.unwrap();

    // A writer that crashed mid-write leaves only its temp file.
    std::fs::write(dir.path().join(".doc.crashed.tmp"), b"{\"format_version\":1,\"dim").unwrap();

    assert_eq!(store.load("doc").await.unwrap(), index);
}

#[tokio::test]
async fn concurrent_saves_leave_one_complete_index() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileIndexStore::new(dir.path()));
    let small = VectorIndex::build(vec![("small", vec![1.0, 1.0])]).unwrap();
    let large = VectorIndex::build(
        (0..200).map(|i| (format!("chunk {i}"), vec![i as f32, 0.0])).collect::<Vec<_>>(),
    )
    .unwrap();

    let mut handles = Vec::new();
    for round in 0..8 {
        let store = store.clone();
        let index = if round % 2 == 0 { small.clone() } else { large.clone() };
        handles.push(tokio::spawn(async move { store.save("doc", &index).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let loaded = store.load("doc").await.unwrap();
    assert!(loaded == small || loaded == large);
}
