//! Integration tests for chunked CSV export

mod common;

use billing_aggregator::core::export::TableExporter;
use billing_aggregator::domain::{AggregatorError, TableName};
use common::{read_csv, row, RecordingStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use test_case::test_case;
use tokio_util::sync::CancellationToken;
use tracing::Span;

fn five_rows() -> Vec<Vec<Option<String>>> {
    (1..=5)
        .map(|i| {
            let id = i.to_string();
            let amount = format!("{i}.50");
            row(&[Some(id.as_str()), Some(amount.as_str())])
        })
        .collect()
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_rows_are_split_into_chunks() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().with_table(
        "tripica_results",
        &["id", "amount"],
        five_rows(),
    ));
    let exporter = TableExporter::new(store.clone(), temp.path().join("out"), 2, Span::none());
    let table = TableName::new("tripica_results").unwrap();

    let outcome = exporter
        .export_table(&table, "tripica", &CancellationToken::new())
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.rows, 5);
    assert_eq!(
        file_names(&outcome.files),
        vec![
            "tripica_tripica_results_0000.csv",
            "tripica_tripica_results_0001.csv",
            "tripica_tripica_results_0002.csv",
        ]
    );
    assert_eq!(store.queries(), vec!["SELECT * FROM tripica_results"]);

    let chunks: Vec<Vec<Vec<String>>> = outcome.files.iter().map(|f| read_csv(f)).collect();
    for chunk in &chunks {
        assert_eq!(chunk[0], vec!["id", "amount"]);
    }
    let ids: Vec<Vec<&str>> = chunks
        .iter()
        .map(|chunk| chunk[1..].iter().map(|r| r[0].as_str()).collect())
        .collect();
    assert_eq!(ids, vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]);
}

#[tokio::test]
async fn test_exact_multiple_does_not_create_empty_chunk() {
    let temp = TempDir::new().unwrap();
    let rows = five_rows().into_iter().take(4).collect();
    let store = Arc::new(RecordingStore::new().with_table("t", &["id", "amount"], rows));
    let exporter = TableExporter::new(store, temp.path(), 2, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.files.len(), 2);
}

#[test_case(1, 1 ; "single row single file")]
#[test_case(3, 1 ; "one row per file")]
#[test_case(7, 3 ; "remainder in last file")]
#[test_case(10, 10 ; "exactly one full file")]
#[test_case(11, 10 ; "one row spills over")]
#[test_case(25, 4 ; "many files")]
#[tokio::test]
async fn test_chunk_layout(rows: usize, max: usize) {
    let temp = TempDir::new().unwrap();
    let source = (0..rows)
        .map(|i| {
            let id = i.to_string();
            row(&[Some(id.as_str())])
        })
        .collect();
    let store = Arc::new(RecordingStore::new().with_table("t", &["id"], source));
    let exporter = TableExporter::new(store, temp.path(), max, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;
    assert!(outcome.is_success(), "{:?}", outcome.error);

    let expected_files = rows.div_ceil(max);
    let expected_names: Vec<String> = (0..expected_files)
        .map(|i| format!("sys_t_{i:04}.csv"))
        .collect();
    assert_eq!(file_names(&outcome.files), expected_names);
    assert_eq!(outcome.rows, rows as u64);

    for (i, file) in outcome.files.iter().enumerate() {
        let records = read_csv(file);
        assert_eq!(records[0], vec!["id"]);
        let ids: Vec<usize> = records[1..].iter().map(|r| r[0].parse().unwrap()).collect();
        let expected: Vec<usize> = (i * max..((i + 1) * max).min(rows)).collect();
        assert_eq!(ids, expected, "rows of file {i}");
    }
}

#[tokio::test]
async fn test_nulls_become_empty_fields() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().with_table(
        "t",
        &["id", "note", "amount"],
        vec![row(&[Some("1"), None, Some("9.99")])],
    ));
    let exporter = TableExporter::new(store, temp.path(), 10, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    let content = std::fs::read_to_string(&outcome.files[0]).unwrap();
    assert_eq!(content, "id,note,amount\n1,,9.99\n");
}

#[tokio::test]
async fn test_values_needing_quotes() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().with_table(
        "t",
        &["id", "name"],
        vec![row(&[Some("1"), Some("Müller, \"GmbH\"")])],
    ));
    let exporter = TableExporter::new(store, temp.path(), 10, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    let records = read_csv(&outcome.files[0]);
    assert_eq!(records[1], vec!["1", "Müller, \"GmbH\""]);
}

#[tokio::test]
async fn test_empty_table_writes_header_only() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().with_table("t", &["id", "amount"], Vec::new()));
    let exporter = TableExporter::new(store, temp.path(), 10, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    assert!(outcome.is_success());
    assert_eq!(file_names(&outcome.files), vec!["sys_t_0000.csv"]);
    assert_eq!(
        std::fs::read_to_string(&outcome.files[0]).unwrap(),
        "id,amount\n"
    );
}

#[tokio::test]
async fn test_query_failure_produces_no_files() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().fail_table("t"));
    let exporter = TableExporter::new(store, temp.path().join("out"), 10, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    assert!(outcome.files.is_empty());
    match outcome.error {
        Some(AggregatorError::Export { table, message }) => {
            assert_eq!(table, "t");
            assert!(message.contains("permission denied"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_failure_keeps_completed_files() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().with_broken_table(
        "t",
        &["id", "amount"],
        five_rows(),
        3,
    ));
    let exporter = TableExporter::new(store, temp.path(), 2, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.rows, 3);
    assert_eq!(
        file_names(&outcome.files),
        vec!["sys_t_0000.csv", "sys_t_0001.csv"]
    );
    let report = outcome.report();
    assert!(report.error.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_cancelled_export_does_not_query() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new().with_table("t", &["id"], Vec::new()));
    let exporter = TableExporter::new(store.clone(), temp.path(), 10, Span::none());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &cancel)
        .await;

    assert!(outcome.error.unwrap().is_cancelled());
    assert!(store.queries().is_empty());
}

#[tokio::test]
async fn test_unwritable_output_dir_fails_export() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("exports");
    std::fs::write(&blocker, "not a directory").unwrap();

    let store = Arc::new(RecordingStore::new().with_table("t", &["id"], five_rows()));
    let exporter = TableExporter::new(store, &blocker, 2, Span::none());

    let outcome = exporter
        .export_table(&TableName::new("t").unwrap(), "sys", &CancellationToken::new())
        .await;

    assert!(outcome.files.is_empty());
    assert_eq!(outcome.rows, 0);
    let message = outcome.error.unwrap().to_string();
    assert!(message.contains("failed to create output directory"), "{message}");
}
