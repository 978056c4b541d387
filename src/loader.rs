use crate::config::DEFAULT_IDEAL_COMPLETION;
use crate::error::LoadError;
use crate::types::{BillingRecord, BranchGoal, CellValue, Dataset, Goal, SheetTable};
use crate::util::{excel_serial_to_date, number_to_text, parse_amount_safe, parse_date_safe};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

pub const RESUMEN_SHEET: &str = "resumen";
pub const ENVIOS_SHEET: &str = "envios";
pub const TD_SHEET: &str = "TD";
pub const REQUIRED_SHEETS: [&str; 3] = [RESUMEN_SHEET, ENVIOS_SHEET, TD_SHEET];

pub const COL_INVOICE: &str = "num_factura";
pub const COL_PATIENT: &str = "paciente";
pub const COL_PAYER: &str = "responsable";
pub const COL_AMOUNT: &str = "valor_total";
pub const COL_BRANCH: &str = "SEDE";
pub const COL_SERVICE: &str = "servicio";
pub const COL_DATE: &str = "fecha_fact";
pub const COL_GOAL: &str = "meta";

/// Branch label of the TD row that carries the overall monthly goal.
pub const TOTAL_ROW_LABEL: &str = "TOTAL";

type Workbook = Sheets<BufReader<File>>;

/// Read the whole workbook: billing rows, shipments and targets.
pub fn load_dataset(path: &Path) -> Result<Dataset, LoadError> {
    let mut workbook: Workbook = open_workbook_auto(path).map_err(|e| LoadError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let resumen = read_sheet(&mut workbook, RESUMEN_SHEET)?;
    let shipments = read_sheet(&mut workbook, ENVIOS_SHEET)?;
    let td = read_sheet(&mut workbook, TD_SHEET)?;

    let dataset = Dataset {
        source: path.to_path_buf(),
        records: billing_records(&resumen)?,
        shipments,
        goal: goal_from_td(&td, DEFAULT_IDEAL_COMPLETION)?,
    };
    info!(
        path = %path.display(),
        records = dataset.records.len(),
        shipments = dataset.shipment_count(),
        branch_goals = dataset.goal.branch_goals.len(),
        "workbook loaded"
    );
    Ok(dataset)
}

/// Read one named sheet. Sheet names are matched after trimming, like headers.
pub fn read_sheet(workbook: &mut Workbook, name: &str) -> Result<SheetTable, LoadError> {
    let actual = workbook
        .sheet_names()
        .iter()
        .find(|n| n.trim() == name)
        .cloned()
        .ok_or_else(|| LoadError::MissingSheet(name.to_string()))?;

    let range = workbook
        .worksheet_range(&actual)
        .map_err(|e| LoadError::ReadSheet {
            sheet: name.to_string(),
            reason: e.to_string(),
        })?;

    table_from_range(name, &range)
}

/// First non-empty row becomes the (trimmed) header row.
pub fn table_from_range(name: &str, range: &Range<Data>) -> Result<SheetTable, LoadError> {
    let start_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut rows = range.rows().enumerate();

    let (header_idx, header) = rows
        .by_ref()
        .find(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .ok_or_else(|| LoadError::EmptySheet(name.to_string()))?;

    let headers: Vec<String> = header
        .iter()
        .map(|c| cell_text(&cell_value(c)))
        .collect();
    let data: Vec<Vec<CellValue>> = rows
        .map(|(_, row)| row.iter().map(cell_value).collect())
        .collect();

    Ok(SheetTable {
        name: name.to_string(),
        header_row: start_row + header_idx + 1,
        headers,
        rows: data,
    })
}

pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_date(serial)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Number(serial))
        }
        Data::DateTimeIso(s) => parse_date_safe(Some(s.as_str()))
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

/// Text view of a cell, trimmed.
pub fn cell_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => number_to_text(*n),
        CellValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
    }
}

fn cell_amount(cell: &CellValue) -> Option<Decimal> {
    match cell {
        CellValue::Empty => Some(Decimal::ZERO),
        CellValue::Number(n) => Decimal::try_from(*n).ok(),
        CellValue::Text(s) if s.trim().is_empty() => Some(Decimal::ZERO),
        CellValue::Text(s) => parse_amount_safe(Some(s.as_str())),
        _ => None,
    }
}

fn cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => parse_date_safe(Some(s.as_str())),
        _ => None,
    }
}

fn require_column(table: &SheetTable, column: &str) -> Result<usize, LoadError> {
    table
        .column_index(column)
        .ok_or_else(|| LoadError::MissingColumn {
            sheet: table.name.clone(),
            column: column.to_string(),
        })
}

/// Map `resumen` rows to billing records. Blank rows are skipped.
pub fn billing_records(table: &SheetTable) -> Result<Vec<BillingRecord>, LoadError> {
    let invoice = require_column(table, COL_INVOICE)?;
    let patient = require_column(table, COL_PATIENT)?;
    let payer = require_column(table, COL_PAYER)?;
    let amount = require_column(table, COL_AMOUNT)?;
    let branch = require_column(table, COL_BRANCH)?;
    let service = require_column(table, COL_SERVICE)?;
    let date = require_column(table, COL_DATE)?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut blank_rows = 0usize;

    for (i, row) in table.rows.iter().enumerate() {
        if row.iter().all(CellValue::is_empty) {
            blank_rows += 1;
            continue;
        }

        let raw_amount = table.cell(i, amount);
        let value = match cell_amount(raw_amount) {
            Some(v) if v >= Decimal::ZERO => v,
            _ => {
                return Err(LoadError::InvalidValue {
                    sheet: table.name.clone(),
                    row: table.sheet_row(i),
                    column: COL_AMOUNT.to_string(),
                    value: cell_text(raw_amount),
                })
            }
        };

        records.push(BillingRecord {
            invoice_number: cell_text(table.cell(i, invoice)),
            patient: cell_text(table.cell(i, patient)),
            payer: cell_text(table.cell(i, payer)),
            branch: cell_text(table.cell(i, branch)),
            service: cell_text(table.cell(i, service)),
            invoice_date: cell_date(table.cell(i, date)),
            amount: value,
        });
    }

    if blank_rows > 0 {
        debug!(sheet = %table.name, blank_rows, "skipped blank rows");
    }
    Ok(records)
}

/// Read targets from the TD sheet (`SEDE` / `meta` columns).
///
/// The `TOTAL` row is the monthly goal; every other row is a branch goal.
/// Without a `TOTAL` row the monthly goal is the sum of the branch goals.
pub fn goal_from_td(table: &SheetTable, ideal_fraction: f64) -> Result<Goal, LoadError> {
    let branch_col = require_column(table, COL_BRANCH)?;
    let goal_col = require_column(table, COL_GOAL)?;

    let mut total: Option<Decimal> = None;
    let mut branch_goals = Vec::new();

    for i in 0..table.rows.len() {
        let label = cell_text(table.cell(i, branch_col));
        let raw = table.cell(i, goal_col);
        if label.is_empty() || raw.is_empty() {
            continue;
        }
        let value = match cell_amount(raw) {
            Some(v) => v,
            None => {
                return Err(LoadError::InvalidValue {
                    sheet: table.name.clone(),
                    row: table.sheet_row(i),
                    column: COL_GOAL.to_string(),
                    value: cell_text(raw),
                })
            }
        };

        if label.eq_ignore_ascii_case(TOTAL_ROW_LABEL) {
            total = Some(value);
        } else {
            branch_goals.push(BranchGoal {
                branch: label,
                goal: value,
            });
        }
    }

    let total_goal = total.unwrap_or_else(|| branch_goals.iter().map(|g| g.goal).sum());
    debug!(%total_goal, branches = branch_goals.len(), "targets read from TD");

    Ok(Goal {
        total_goal,
        ideal_fraction,
        branch_goals,
    })
}
