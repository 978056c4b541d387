use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::path::PathBuf;
use tabled::Tabled;

/// A single cell as read from the workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// One sheet with trimmed headers and the rows below them.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub name: String,
    /// 1-based worksheet row holding the headers.
    pub header_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// 1-based worksheet row number of data row `row`.
    pub fn sheet_row(&self, row: usize) -> usize {
        self.header_row + row + 1
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// One invoice row from the `resumen` sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingRecord {
    #[serde(rename = "num_factura")]
    pub invoice_number: String,
    #[serde(rename = "paciente")]
    pub patient: String,
    #[serde(rename = "responsable")]
    pub payer: String,
    #[serde(rename = "SEDE")]
    pub branch: String,
    #[serde(rename = "servicio")]
    pub service: String,
    #[serde(rename = "fecha_fact")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(rename = "valor_total")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchGoal {
    pub branch: String,
    pub goal: Decimal,
}

/// Targets for the reporting period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub total_goal: Decimal,
    pub ideal_fraction: f64,
    pub branch_goals: Vec<BranchGoal>,
}

impl Goal {
    pub fn new(total_goal: Decimal, ideal_fraction: f64) -> Self {
        Self {
            total_goal,
            ideal_fraction,
            branch_goals: Vec::new(),
        }
    }

    pub fn branch_goal(&self, branch: &str) -> Option<Decimal> {
        self.branch_goals
            .iter()
            .find(|g| g.branch == branch)
            .map(|g| g.goal)
    }
}

/// Everything loaded from one workbook snapshot.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: PathBuf,
    pub records: Vec<BillingRecord>,
    pub shipments: SheetTable,
    pub goal: Goal,
}

impl Dataset {
    /// Non-blank rows of the `envios` sheet.
    pub fn shipment_count(&self) -> usize {
        self.shipments
            .rows
            .iter()
            .filter(|row| !row.iter().all(CellValue::is_empty))
            .count()
    }
}

/// Sums per group key, iterated in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSums {
    entries: Vec<(String, Decimal)>,
    index: HashMap<String, usize>,
}

impl GroupedSums {
    pub fn add(&mut self, key: &str, amount: Decimal) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += amount,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), amount));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Decimal> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.entries.iter().map(|(_, v)| *v).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn entries(&self) -> &[(String, Decimal)] {
        &self.entries
    }
}

impl Serialize for GroupedSums {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchProgress {
    pub branch: String,
    pub billed: Decimal,
    pub goal: Option<Decimal>,
    pub completion: Option<f64>,
}

/// Metrics for one filter selection, handed to the renderer as-is.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub total_billed: Decimal,
    pub total_goal: Decimal,
    pub completion: f64,
    pub ideal_fraction: f64,
    pub delta_vs_ideal: f64,
    pub by_branch: GroupedSums,
    pub by_payer: GroupedSums,
    pub by_service: GroupedSums,
    pub top_payers: Vec<(String, Decimal)>,
    pub branch_progress: Vec<BranchProgress>,
    pub record_count: usize,
    pub shipment_count: usize,
    #[serde(skip)]
    pub records: Vec<BillingRecord>,
    pub recent: Vec<BillingRecord>,
}

#[derive(Debug, Tabled, Clone)]
pub struct GroupRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Billed")]
    pub total: String,
    #[tabled(rename = "Share")]
    pub share: String,
    #[tabled(rename = "")]
    pub bar: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct RankingRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    #[tabled(rename = "Payer")]
    pub payer: String,
    #[tabled(rename = "Billed")]
    pub total: String,
    #[tabled(rename = "")]
    pub bar: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct BranchGoalRow {
    #[tabled(rename = "SEDE")]
    pub branch: String,
    #[tabled(rename = "Billed")]
    pub billed: String,
    #[tabled(rename = "Goal")]
    pub goal: String,
    #[tabled(rename = "Completion")]
    pub completion: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct AuditRow {
    #[tabled(rename = "num_factura")]
    pub invoice_number: String,
    #[tabled(rename = "paciente")]
    pub patient: String,
    #[tabled(rename = "responsable")]
    pub payer: String,
    #[tabled(rename = "valor_total")]
    pub amount: String,
    #[tabled(rename = "SEDE")]
    pub branch: String,
}

#[derive(Debug, Serialize)]
pub struct PayerRankRow {
    pub rank: usize,
    pub responsable: String,
    pub valor_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BranchTotalRow {
    #[serde(rename = "SEDE")]
    pub branch: String,
    pub valor_total: Decimal,
    pub meta: Option<Decimal>,
    pub cumplimiento: Option<f64>,
}
