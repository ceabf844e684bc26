mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{Cell, Kind, write_parquet, write_sim_file};
use serde_json::json;
use tallies::source::BatchStream;
use tallies::{
    AgeBucket, DatasetProfile, InMemoryPartitionReader, LocalDirectoryLocator, Orchestrator,
    ParquetPartitionReader, PartitionLocator, PartitionReader, PartitionRef, QueryConfig,
    QueryRequest, RecordBatch, SummaryDocument, TallyError,
};
use tempfile::tempdir;

fn births_profile() -> DatasetProfile {
    DatasetProfile::new("SINASC", "CODMUNNASC").with_sex_column("SEXO")
}

fn write_births(path: &Path, rows: &[Vec<Cell>], rows_per_group: usize) {
    write_parquet(
        path,
        &[
            ("CODMUNNASC", Kind::Text),
            ("SEXO", Kind::Text),
            ("IDADEMAE", Kind::Text),
        ],
        rows,
        rows_per_group,
    );
}

#[test]
fn filtered_births_summary_matches_expected_document() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("DNBR2021.parquet");
    write_births(
        &path,
        &[
            vec![Cell::Text("260010.0"), Cell::Text("1"), Cell::Text("22")],
            vec![Cell::Text("260010"), Cell::Text("2"), Cell::Text("35")],
            vec![Cell::Text("310620"), Cell::Text("1"), Cell::Text("19")],
        ],
        2,
    );

    let report = Orchestrator::new(ParquetPartitionReader::new(), births_profile())
        .execute(
            &QueryRequest::new("DN", [2021]).with_regions(["PE"]),
            &[PartitionRef::new(2021, &path)],
        )
        .expect("query succeeds");

    let summary = report.outcome.summary();
    assert_eq!(
        serde_json::to_value(summary).expect("summary serializes"),
        json!({
            "totalRecords": 2,
            "columns": ["CODMUNNASC", "SEXO", "IDADEMAE"],
            "summaryByMunicipality": [
                {"municipalityCode": "260010", "total": 2, "bySex": {"1": 1, "2": 1}}
            ]
        })
    );
    assert_eq!(report.stats.rows_out_of_region, 1);
}

#[test]
fn sinasc_breakdowns_sum_to_totals() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("DNPE2022.parquet");
    write_births(
        &path,
        &[
            vec![Cell::Text("260010"), Cell::Text("1"), Cell::Text("19")],
            vec![Cell::Text("260010"), Cell::Text("2"), Cell::Text("20")],
            vec![Cell::Text("260010"), Cell::Null, Cell::Text("40")],
            vec![Cell::Text("260020"), Cell::Text("1"), Cell::Text("abc")],
            vec![Cell::Null, Cell::Text("1"), Cell::Text("30")],
        ],
        3,
    );

    let report = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sinasc())
        .execute(
            &QueryRequest::new("DN", [2022]),
            &[PartitionRef::new(2022, &path)],
        )
        .expect("query succeeds");

    let summary = report.outcome.summary();
    assert_eq!(summary.total_records(), 4);
    assert_eq!(report.stats.rows_invalid_code, 1);
    for entry in summary.municipalities() {
        assert!(entry.is_consistent(), "{entry:?}");
    }
    let recife = summary.municipality("260010").expect("260010 present");
    let ages = recife.by_age_group().expect("age breakdown");
    assert_eq!(ages.get(&AgeBucket::Under20), Some(&1));
    assert_eq!(ages.get(&AgeBucket::From20To29), Some(&1));
    assert_eq!(ages.get(&AgeBucket::From40), Some(&1));
    assert_eq!(recife.by_sex().expect("sex breakdown").get("unknown"), Some(&1));
    let other = summary.municipality("260020").expect("260020 present");
    assert_eq!(
        other.by_age_group().expect("age breakdown").get(&AgeBucket::Unknown),
        Some(&1)
    );
}

#[test]
fn missing_year_is_skipped_without_error() {
    let dir = tempdir().expect("tempdir");
    let present = dir.path().join("DOPE2022.parquet");
    write_sim_file(&present, &[Cell::Text("260010"), Cell::Text("260020")], 1);

    let report = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sim())
        .execute(
            &QueryRequest::new("DO", [2021, 2022]),
            &[
                PartitionRef::new(2021, dir.path().join("DOPE2021.parquet")),
                PartitionRef::new(2022, &present),
            ],
        )
        .expect("missing year is not fatal");

    assert_eq!(report.outcome.summary().total_records(), 2);
    assert_eq!(report.stats.partitions_missing, 1);
    assert_eq!(report.stats.partitions_read, 1);
}

#[test]
fn corrupt_partition_fails_the_whole_query() {
    let dir = tempdir().expect("tempdir");
    let good = dir.path().join("DOPE2021.parquet");
    write_sim_file(&good, &[Cell::Text("260010")], 1);
    let bad = dir.path().join("DOPE2022.parquet");
    fs::write(&bad, b"PAR1 but not really").expect("corrupt file");

    for parallel in [false, true] {
        let err = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sim())
            .with_config(QueryConfig::default().with_parallel_partitions(parallel))
            .execute(
                &QueryRequest::new("DO", [2021, 2022]),
                &[PartitionRef::new(2021, &good), PartitionRef::new(2022, &bad)],
            )
            .expect_err("corrupt partition is fatal");
        assert!(matches!(err, TallyError::PartitionRead { ref path, .. } if path == &bad));
    }
}

#[test]
fn corrupt_shard_after_good_batches_fails_the_whole_query() {
    let dir = tempdir().expect("tempdir");
    let earlier = dir.path().join("DOPE2021.parquet");
    write_sim_file(&earlier, &[Cell::Text("260010")], 1);
    let root = dir.path().join("DOPE2022.parquet");
    fs::create_dir_all(&root).expect("partition dir");
    write_sim_file(
        &root.join("part-0.parquet"),
        &[Cell::Text("260010"), Cell::Text("260020"), Cell::Text("260030")],
        1,
    );
    let bad = root.join("part-1.parquet");
    fs::write(&bad, b"PAR1 truncated shard").expect("corrupt shard");

    for parallel in [false, true] {
        let err = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sim())
            .with_config(QueryConfig::default().with_parallel_partitions(parallel))
            .execute(
                &QueryRequest::new("DO", [2021, 2022]),
                &[PartitionRef::new(2021, &earlier), PartitionRef::new(2022, &root)],
            )
            .expect_err("corrupt shard is fatal");
        assert!(
            matches!(err, TallyError::PartitionRead { ref path, .. } if path == &bad),
            "parallel={parallel}: {err}"
        );
    }
}

#[cfg(unix)]
#[test]
fn dangling_shard_link_fails_the_whole_query() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("DOPE2022.parquet");
    fs::create_dir_all(&root).expect("partition dir");
    write_sim_file(&root.join("a.parquet"), &[Cell::Text("260010")], 1);
    std::os::unix::fs::symlink(root.join("gone.parquet"), root.join("b.parquet"))
        .expect("dangling link");

    for parallel in [false, true] {
        let err = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sim())
            .with_config(QueryConfig::default().with_parallel_partitions(parallel))
            .execute(&QueryRequest::new("DO", [2022]), &[PartitionRef::new(2022, &root)])
            .expect_err("dangling shard is fatal");
        assert!(matches!(err, TallyError::PartitionRead { .. }), "{err}");
    }
}

#[test]
fn unrecognized_regions_yield_an_empty_summary() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("DENGBR22.parquet");
    write_parquet(
        &root,
        &[("ID_MN_RESI", Kind::Text)],
        &[vec![Cell::Text("260010")], vec![Cell::Text("310620")]],
        1,
    );

    let report = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sinan())
        .execute(
            &QueryRequest::new("DENG", [2022]).with_regions(["XX"]),
            &[PartitionRef::new(2022, &root)],
        )
        .expect("lenient policy accepts the request");

    assert!(report.outcome.is_empty());
    assert_eq!(report.outcome.summary().total_records(), 0);
    assert_eq!(report.stats.rows_out_of_region, 2);
}

#[test]
fn row_group_size_does_not_change_results() {
    let dir = tempdir().expect("tempdir");
    let codes = [
        Cell::Text("260010"),
        Cell::Text("260010.0"),
        Cell::Text("350010"),
        Cell::Null,
        Cell::Text("260020"),
        Cell::Text("abc"),
        Cell::Text("260010"),
    ];
    let mut outcomes = Vec::new();
    for rows_per_group in [1, 2, 3, 7] {
        let path = dir.path().join(format!("DOPE2022-{rows_per_group}.parquet"));
        write_sim_file(&path, &codes, rows_per_group);
        let report = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sim())
            .execute(&QueryRequest::new("DO", [2022]), &[PartitionRef::new(2022, &path)])
            .expect("query succeeds");
        outcomes.push(report.outcome);
    }
    assert!(outcomes.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(outcomes[0].summary().total_records(), 5);
}

#[test]
fn sinan_files_fall_back_to_notification_municipality() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("DENGBR22.parquet");
    fs::create_dir_all(&root).expect("partition dir");
    write_parquet(
        &root.join("0.parquet"),
        &[("ID_MN_RESI", Kind::Text)],
        &[vec![Cell::Text("260010")], vec![Cell::Text("310620")]],
        10,
    );
    write_parquet(
        &root.join("1.parquet"),
        &[("ID_MUNICIP", Kind::Double)],
        &[vec![Cell::Double(260010.0)]],
        10,
    );
    write_parquet(
        &root.join("2.parquet"),
        &[("DT_NOTIFIC", Kind::Text)],
        &[vec![Cell::Text("20220101")]],
        10,
    );

    let locator = LocalDirectoryLocator::nationwide(dir.path());
    let request = QueryRequest::new("DENG", [2022]);
    let partitions = locator
        .locate_all(&request.group_code, &request.years, None)
        .expect("locator resolves");
    let report = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sinan())
        .execute(&request, &partitions)
        .expect("query succeeds");

    let summary = report.outcome.summary();
    assert_eq!(summary.municipality("260010").expect("260010").total(), 2);
    assert_eq!(summary.total_records(), 3);
    assert_eq!(summary.columns(), ["ID_MN_RESI"]);
    assert_eq!(report.stats.files, 3);
    assert_eq!(report.stats.rows_missing_column, 1);
}

#[test]
fn export_document_is_written_with_metadata() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("DOPE2022.parquet");
    write_sim_file(&path, &[Cell::Text("260010")], 1);
    let request = QueryRequest::new("DO", [2022]).with_regions(["PE"]);
    let report = Orchestrator::new(ParquetPartitionReader::new(), DatasetProfile::sim())
        .execute(&request, &[PartitionRef::new(2022, &path)])
        .expect("query succeeds");

    let document = SummaryDocument::new(
        "SIM",
        request.group_code.clone(),
        &request.years,
        request.regions.as_deref(),
        report.outcome.into_summary(),
    );
    let written = document
        .write_to_dir(&dir.path().join("exports"))
        .expect("export writes");
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written).expect("export readable"))
            .expect("export is json");
    assert_eq!(raw["groupCode"], "DO");
    assert_eq!(raw["years"], json!([2022]));
    assert_eq!(raw["summary"]["summaryByMunicipality"][0]["municipalityCode"], "260010");
}

/// Reader producing a long trickle of single-row batches.
struct TrickleReader;

impl PartitionReader for TrickleReader {
    fn read<'a>(
        &'a self,
        partition: &PartitionRef,
        _columns: &[String],
    ) -> Result<BatchStream<'a>, TallyError> {
        let source = partition.path.clone();
        let columns = Arc::new(vec!["CODMUNOCOR".to_string()]);
        Ok(Box::new((0..60_000).map(move |_| {
            thread::sleep(Duration::from_millis(1));
            let row = json!({"CODMUNOCOR": "260010"})
                .as_object()
                .cloned()
                .expect("object row");
            Ok(RecordBatch {
                source: source.clone(),
                columns: Arc::clone(&columns),
                rows: vec![row],
            })
        })))
    }
}

#[test]
fn spawned_query_can_be_cancelled() {
    let orchestrator = Orchestrator::new(TrickleReader, DatasetProfile::sim());
    let handle = orchestrator.spawn(
        QueryRequest::new("DO", [2021, 2022]),
        vec![
            PartitionRef::new(2021, "DOPE2021"),
            PartitionRef::new(2022, "DOPE2022"),
        ],
    );
    thread::sleep(Duration::from_millis(20));
    handle.cancel();
    let err = handle.join().expect_err("cancelled query fails");
    assert!(matches!(err, TallyError::Cancelled));
}

#[test]
fn spawned_query_reports_completion() {
    let reader = InMemoryPartitionReader::new().with_partition(
        "DOPE2022",
        vec!["CODMUNOCOR".into()],
        vec![json!({"CODMUNOCOR": 260010}).as_object().cloned().expect("object row")],
    );
    let orchestrator = Orchestrator::new(reader, DatasetProfile::sim());
    let mut handle = orchestrator.spawn(
        QueryRequest::new("DO", [2022]),
        vec![PartitionRef::new(2022, "DOPE2022")],
    );
    while !handle.is_finished() {
        thread::sleep(Duration::from_millis(1));
    }
    let report = handle.join().expect("query succeeds");
    assert_eq!(report.outcome.summary().total_records(), 1);
}
