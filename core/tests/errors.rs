//! Fatal errors and the malformed-row policy.
//!
//! A fatal error must abort the run before anything is written.

use discrepancy_core::{
    config::{DebugPaths, MalformedRowPolicy, RunConfig, RunSettings},
    engine::{ReconEngine, ReconInputs},
    error::ReconError,
    report::MemoryReportWriter,
    types::Identity,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

fn at() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[test]
fn missing_version_file_is_source_unavailable_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let old = write(&dir, "old.csv", "d,order,sku\nx,A,S1\n");
    let config = RunConfig::new(old, dir.path().join("absent.csv")).with_output_dir(dir.path());

    let err = ReconEngine::build().run_config(&config, at()).unwrap_err();
    match &err {
        ReconError::SourceUnavailable { source_name, path, .. } => {
            assert_eq!(source_name, "new version");
            assert!(path.ends_with("absent.csv"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1, "only the input file may exist after a failed run");
}

#[test]
fn missing_debug_sheet_file_is_source_unavailable() {
    let dir = TempDir::new().unwrap();
    let config = RunConfig::new(
        write(&dir, "old.csv", "d,order,sku\n"),
        write(&dir, "new.csv", "d,order,sku\n"),
    )
    .with_debug(DebugPaths {
        reimbursements: write(&dir, "r.csv", "h\n"),
        returns_to_fba: dir.path().join("nope.csv"),
        date_range:     write(&dir, "d.csv", "h\n"),
    });

    let err = ReconInputs::open(&config).err().expect("must fail");
    assert!(
        matches!(&err, ReconError::SourceUnavailable { source_name, .. } if source_name == "returns_to_fba"),
        "unexpected error: {err}"
    );
}

#[test]
fn partial_debug_settings_are_rejected() {
    let settings = RunSettings {
        old_version: Some("old.csv".into()),
        new_version: Some("new.csv".into()),
        date_range: Some("d.csv".into()),
        ..RunSettings::default()
    };
    let err = settings.validate().unwrap_err();
    assert!(matches!(err, ReconError::IncompleteDebugContext { .. }));
    let message = err.to_string();
    assert!(message.contains("reimbursements"), "{message}");
    assert!(message.contains("returns_to_fba"), "{message}");
}

#[test]
fn malformed_row_fails_by_default() {
    let dir = TempDir::new().unwrap();
    let config = RunConfig::new(
        write(&dir, "old.csv", "d,order,sku\nx,A,S1\nx,B\n"),
        write(&dir, "new.csv", "d,order,sku\nx,A,S1\n"),
    );

    let mut writer = MemoryReportWriter::default();
    let err = ReconEngine::build()
        .run(ReconInputs::open(&config).unwrap(), &mut writer)
        .unwrap_err();

    match err {
        ReconError::MalformedRow { source_name, line, .. } => {
            assert_eq!(source_name, "old version");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(writer.writes, 0, "nothing may be written after a fatal error");
}

#[test]
fn malformed_rows_skipped_when_configured() {
    let dir = TempDir::new().unwrap();
    let config = RunConfig::new(
        write(&dir, "old.csv", "d,order,sku\nx,A,S1\nx,B\n"),
        write(&dir, "new.csv", "d,order,sku\nx,A,S1\n"),
    )
    .with_policy(MalformedRowPolicy::Skip)
    .with_debug(DebugPaths {
        reimbursements: write(&dir, "r.csv", "h\n"),
        returns_to_fba: write(&dir, "f.csv", "a,order,sku,d,e,f,qty\nx,A,S1,x,x,x,many\n"),
        date_range:     write(&dir, "d.csv", "h\n"),
    });

    let mut writer = MemoryReportWriter::default();
    let summary = ReconEngine::build()
        .run(ReconInputs::open(&config).unwrap(), &mut writer)
        .unwrap();

    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(summary.fine, 1);
    assert_eq!(writer.rows.len(), 1);
    assert_eq!(writer.rows[0].returned_qty, "");
}

fn debug_with_returns(dir: &TempDir, returns_to_fba: &[u8]) -> DebugPaths {
    let returns_path = dir.path().join("f.csv");
    fs::write(&returns_path, returns_to_fba).expect("write fixture");
    DebugPaths {
        reimbursements: write(dir, "r.csv", "h\n"),
        returns_to_fba: returns_path,
        date_range:     write(dir, "d.csv", "h\n"),
    }
}

#[test]
fn undecodable_bytes_in_unread_columns_do_not_affect_the_run() {
    let dir = TempDir::new().unwrap();
    let returns = b"a,order,sku,d,e,title,qty\nx,A,S1,x,x,Caf\xe9 Mug,1\n";

    for policy in [MalformedRowPolicy::Fail, MalformedRowPolicy::Skip] {
        let config = RunConfig::new(
            write(&dir, "old.csv", "d,order,sku\nx,A,S1\n"),
            write(&dir, "new.csv", "d,order,sku\nx,A,S1\n"),
        )
        .with_policy(policy)
        .with_debug(debug_with_returns(&dir, returns));

        let mut writer = MemoryReportWriter::default();
        let summary = ReconEngine::build()
            .run(ReconInputs::open(&config).unwrap(), &mut writer)
            .unwrap();

        assert_eq!(summary.rows_skipped, 0, "{policy:?}");
        assert_eq!(writer.rows[0].returned_qty, "1", "{policy:?}");
    }
}

#[test]
fn undecodable_identity_is_a_malformed_row_naming_its_source() {
    let dir = TempDir::new().unwrap();
    let returns = b"a,order,sku,d,e,title,qty\nx,A\xe9,S1,x,x,Mug,1\nx,A,S1,x,x,Mug,2\n";
    let config = RunConfig::new(
        write(&dir, "old.csv", "d,order,sku\nx,A,S1\n"),
        write(&dir, "new.csv", "d,order,sku\nx,A,S1\n"),
    )
    .with_debug(debug_with_returns(&dir, returns));

    let err = ReconEngine::build()
        .reconcile(ReconInputs::open(&config).unwrap())
        .unwrap_err();
    match err {
        ReconError::MalformedRow { source_name, line, .. } => {
            assert_eq!(source_name, "returns_to_fba");
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let outcome = ReconEngine::build()
        .reconcile(ReconInputs::open(&config.with_policy(MalformedRowPolicy::Skip)).unwrap())
        .unwrap();
    assert_eq!(outcome.summary.rows_skipped, 1);
    let entry = outcome.ledger.get(&Identity::new("A", "S1")).unwrap();
    assert_eq!(entry.returned_qty.recorded(), Some(2));
}

#[test]
fn overflowing_quantity_is_a_malformed_row() {
    let dir = TempDir::new().unwrap();
    let returns = format!("a,order,sku,d,e,title,qty\nx,A,S1,x,x,Mug,{}\nx,A,S1,x,x,Mug,1\n", u64::MAX);
    let config = RunConfig::new(
        write(&dir, "old.csv", "d,order,sku\nx,A,S1\n"),
        write(&dir, "new.csv", "d,order,sku\n"),
    )
    .with_debug(debug_with_returns(&dir, returns.as_bytes()));

    let err = ReconEngine::build()
        .reconcile(ReconInputs::open(&config).unwrap())
        .unwrap_err();
    assert!(
        matches!(&err, ReconError::MalformedRow { line: 3, detail, .. } if detail.contains("overflow")),
        "unexpected error: {err}"
    );

    let outcome = ReconEngine::build()
        .reconcile(ReconInputs::open(&config.with_policy(MalformedRowPolicy::Skip)).unwrap())
        .unwrap();
    assert_eq!(outcome.summary.rows_skipped, 1);
    let entry = outcome.ledger.get(&Identity::new("A", "S1")).unwrap();
    assert_eq!(entry.returned_qty.recorded(), Some(u64::MAX));
}
