mod common;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use clinic_report::loader::load_dataset;
use clinic_report::reports::{compute_total, group_sum, top_n};
use clinic_report::{
    aggregate, LoadError, RecordFilter, ReportOptions, Selection, Settings, WorkbookCache,
};
use common::{write_workbook, WorkbookSpec, DATE_CELL_ROW};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

fn fixture(spec: &WorkbookSpec) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("resumen.xlsx");
    write_workbook(&path, spec).unwrap();
    (dir, path)
}

#[test]
fn loads_all_three_sheets() {
    let (_dir, path) = fixture(&WorkbookSpec::default());
    let dataset = load_dataset(&path).unwrap();

    assert_eq!(dataset.records.len(), 3);
    let first = &dataset.records[0];
    assert_eq!(first.invoice_number, "F-1001");
    assert_eq!(first.patient, "Ana Ruiz");
    assert_eq!(first.payer, "SURA");
    assert_eq!(first.amount, dec!(100));
    assert_eq!(first.branch, "FUNDADORES");
    assert_eq!(first.invoice_date, NaiveDate::from_ymd_opt(2026, 1, 5));

    assert_eq!(dataset.shipments.headers, vec!["guia", "num_factura"]);
    assert_eq!(dataset.shipment_count(), 2);

    assert_eq!(dataset.goal.total_goal, dec!(500));
    assert_eq!(dataset.goal.branch_goal("SUBA"), Some(dec!(150)));
}

#[test]
fn date_cells_load_as_invoice_dates() {
    let (_dir, path) = fixture(&WorkbookSpec::default());

    let mut workbook = open_workbook_auto(&path).unwrap();
    let range = workbook.worksheet_range("resumen").unwrap();
    let cell = range.get_value((DATE_CELL_ROW as u32 + 1, 6)).unwrap();
    assert!(matches!(cell, Data::DateTime(_)), "got {:?}", cell);

    let dataset = load_dataset(&path).unwrap();
    let record = &dataset.records[DATE_CELL_ROW];
    assert_eq!(record.invoice_number, "F-1003");
    assert_eq!(record.invoice_date, NaiveDate::from_ymd_opt(2026, 1, 20));
}

#[test]
fn td_without_total_row_sums_branches() {
    let spec = WorkbookSpec {
        td_total: None,
        ..WorkbookSpec::default()
    };
    let (_dir, path) = fixture(&spec);
    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.goal.total_goal, dec!(450));
}

#[test]
fn missing_sheet_fails_loudly() {
    let spec = WorkbookSpec {
        with_td: false,
        ..WorkbookSpec::default()
    };
    let (_dir, path) = fixture(&spec);
    match load_dataset(&path) {
        Err(LoadError::MissingSheet(name)) => assert_eq!(name, "TD"),
        other => panic!("expected MissingSheet, got {:?}", other.map(|d| d.records.len())),
    }
}

#[test]
fn missing_column_fails_loudly() {
    let spec = WorkbookSpec {
        resumen_headers: vec!["num_factura", "paciente", "responsable", "SEDE", "servicio", "fecha_fact"],
        ..WorkbookSpec::default()
    };
    let (_dir, path) = fixture(&spec);
    match load_dataset(&path) {
        Err(LoadError::MissingColumn { sheet, column }) => {
            assert_eq!(sheet, "resumen");
            assert_eq!(column, "valor_total");
        }
        other => panic!("expected MissingColumn, got {:?}", other.map(|d| d.records.len())),
    }
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = TempDir::new().unwrap();
    let result = load_dataset(&dir.path().join("resumen.xlsx"));
    assert!(matches!(result, Err(LoadError::Open { .. })));
}

#[test]
fn end_to_end_metrics() {
    let (_dir, path) = fixture(&WorkbookSpec::default());
    let dataset = load_dataset(&path).unwrap();
    let goal = Settings::default().resolve_goal(&dataset.goal).unwrap();
    let options = ReportOptions { top_n: 10, tail: 10 };

    let all = aggregate(&dataset, &goal, &RecordFilter::default(), &options).unwrap();
    assert_eq!(all.total_billed, dec!(175));
    assert_eq!(all.completion, 0.35);
    assert_eq!(all.by_branch.get("FUNDADORES"), Some(dec!(125)));
    assert_eq!(all.top_payers[0], ("SURA".to_string(), dec!(100)));
    assert_eq!(all.top_payers[1], ("SANITAS".to_string(), dec!(75)));
    assert_eq!(all.shipment_count, 2);

    let lab_in_january = RecordFilter {
        service: Selection::Only("LABORATORIO".to_string()),
        from: NaiveDate::from_ymd_opt(2026, 1, 15),
        to: NaiveDate::from_ymd_opt(2026, 1, 31),
        ..RecordFilter::default()
    };
    let lab = aggregate(&dataset, &goal, &lab_in_january, &options).unwrap();
    assert_eq!(lab.record_count, 1);
    assert_eq!(lab.total_billed, dec!(25));
    assert_eq!(lab.recent[0].invoice_number, "F-1003");
}

#[test]
fn group_sums_match_total_on_loaded_data() {
    let (_dir, path) = fixture(&WorkbookSpec::default());
    let dataset = load_dataset(&path).unwrap();
    let total = compute_total(&dataset.records);
    let by_payer = group_sum(&dataset.records, |r| r.payer.as_str());
    assert_eq!(by_payer.total(), total);
    assert!(total > Decimal::ZERO);
    assert_eq!(top_n(&by_payer, 1), vec![("SURA".to_string(), dec!(100))]);
}

#[test]
fn cache_reuses_snapshot_until_workbook_changes() {
    let (_dir, path) = fixture(&WorkbookSpec::default());
    let mut cache = WorkbookCache::new();

    let first = cache.get_or_load(&path, load_dataset).unwrap();
    let again = cache.get_or_load(&path, load_dataset).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(cache.loads(), 1);

    let spec = WorkbookSpec {
        td_total: Some(1_000.0),
        ..WorkbookSpec::default()
    };
    // Sleep past coarse mtime resolution; xlsx sizes can coincide.
    std::fs::remove_file(&path).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1100));
    write_workbook(&path, &spec).unwrap();

    let reloaded = cache.get_or_load(&path, load_dataset).unwrap();
    assert_eq!(cache.loads(), 2);
    assert_eq!(reloaded.goal.total_goal, dec!(1000));
    assert_eq!(first.goal.total_goal, dec!(500));
}
