use crate::error::Result;
use crate::filter::RecordFilter;
use crate::types::{
    AggregateResult, AuditRow, BranchGoalRow, BranchTotalRow, GroupRow, PayerRankRow, RankingRow,
};
use crate::util::{
    bar, format_currency, format_int, format_percent, format_signed_percent, ratio,
};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

const BAR_WIDTH: usize = 30;
const GAUGE_WIDTH: usize = 40;

const RECORDS_FILE: &str = "records.csv";
const BRANCHES_FILE: &str = "by_branch.csv";
const PAYERS_FILE: &str = "top_payers.csv";
const SUMMARY_FILE: &str = "summary.json";
const EXPORT_FILES: [&str; 4] = [RECORDS_FILE, BRANCHES_FILE, PAYERS_FILE, SUMMARY_FILE];

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

fn markdown_table<T: Tabled>(rows: Vec<T>) -> String {
    if rows.is_empty() {
        return "(no rows)\n".to_string();
    }
    format!("{}\n", Table::new(rows).with(Style::markdown()))
}

fn selection_note(filter: &RecordFilter) -> String {
    let mut note = format!("SEDE: {} | Service: {}", filter.branch, filter.service);
    if let Some(from) = filter.from {
        let _ = write!(note, " | From: {}", from);
    }
    if let Some(to) = filter.to {
        let _ = write!(note, " | To: {}", to);
    }
    note
}

pub fn render_cards(result: &AggregateResult) -> String {
    let delta = format_signed_percent(result.delta_vs_ideal);
    let delta = if result.delta_vs_ideal >= 0.0 {
        delta.as_str().green().to_string()
    } else {
        delta.as_str().red().to_string()
    };
    format!(
        "Billed:        {}\nMonthly goal:  {}\n% Completion:  {}  ({} vs ideal {})\n",
        format_currency(result.total_billed),
        format_currency(result.total_goal),
        format_percent(result.completion),
        delta,
        format_percent(result.ideal_fraction),
    )
}

/// Completion bar with a `|` marker at the ideal fraction.
pub fn render_gauge(completion: f64, ideal: f64) -> String {
    let cell = |fraction: f64| ((fraction.clamp(0.0, 1.0)) * GAUGE_WIDTH as f64).round() as usize;
    let filled = cell(completion);
    let marker = cell(ideal).min(GAUGE_WIDTH - 1);
    let gauge: String = (0..GAUGE_WIDTH)
        .map(|i| match (i == marker, i < filled) {
            (true, _) => '|',
            (false, true) => '#',
            (false, false) => '.',
        })
        .collect();
    format!("[{}] {}\n", gauge, format_percent(completion))
}

/// Branch shares of the filtered total (the pie chart).
pub fn render_branch_shares(result: &AggregateResult) -> String {
    let total = result.total_billed;
    let rows: Vec<GroupRow> = result
        .by_branch
        .iter()
        .map(|(branch, value)| {
            let share = ratio(value, total);
            GroupRow {
                group: branch.to_string(),
                total: format_currency(value),
                share: format_percent(share),
                bar: bar(share, 1.0, BAR_WIDTH),
            }
        })
        .collect();
    markdown_table(rows)
}

/// Top payers as horizontal bars (the bar chart).
pub fn render_top_payers(result: &AggregateResult) -> String {
    let max = result
        .top_payers
        .first()
        .map(|(_, v)| *v)
        .unwrap_or(Decimal::ZERO);
    let rows: Vec<RankingRow> = result
        .top_payers
        .iter()
        .enumerate()
        .map(|(idx, (payer, value))| RankingRow {
            rank: idx + 1,
            payer: payer.clone(),
            total: format_currency(*value),
            bar: bar(ratio(*value, max), 1.0, BAR_WIDTH),
        })
        .collect();
    markdown_table(rows)
}

pub fn render_branch_goals(result: &AggregateResult) -> String {
    let rows: Vec<BranchGoalRow> = result
        .branch_progress
        .iter()
        .filter(|p| p.goal.is_some())
        .map(|p| BranchGoalRow {
            branch: p.branch.clone(),
            billed: format_currency(p.billed),
            goal: p.goal.map(format_currency).unwrap_or_default(),
            completion: p.completion.map(format_percent).unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    markdown_table(rows)
}

pub fn render_recent(result: &AggregateResult) -> String {
    let rows: Vec<AuditRow> = result
        .recent
        .iter()
        .map(|r| AuditRow {
            invoice_number: r.invoice_number.clone(),
            patient: r.patient.clone(),
            payer: r.payer.clone(),
            amount: format_currency(r.amount),
            branch: r.branch.clone(),
        })
        .collect();
    markdown_table(rows)
}

/// The whole dashboard as one string, so nothing prints unless all of it renders.
pub fn render_dashboard(result: &AggregateResult, filter: &RecordFilter) -> String {
    let mut out = String::new();
    out.push_str("Billing Control Dashboard\n");
    let _ = writeln!(out, "({})", selection_note(filter));
    let _ = writeln!(
        out,
        "({} invoices, {} shipments)\n",
        format_int(result.record_count as u64),
        format_int(result.shipment_count as u64)
    );

    out.push_str(&render_cards(result));
    out.push('\n');
    out.push_str(&render_gauge(result.completion, result.ideal_fraction));

    out.push_str("\nBilling by SEDE\n\n");
    out.push_str(&render_branch_shares(result));

    if result.branch_progress.iter().any(|p| p.goal.is_some()) {
        out.push_str("\nSEDE goals\n\n");
        out.push_str(&render_branch_goals(result));
    }

    let _ = writeln!(out, "\nTop {} payers\n", result.top_payers.len());
    out.push_str(&render_top_payers(result));

    out.push_str("\nRecent invoices\n\n");
    out.push_str(&render_recent(result));
    out
}

fn staged(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.tmp", name))
}

fn write_exports(dir: &Path, result: &AggregateResult) -> Result<()> {
    write_csv(&staged(dir, RECORDS_FILE), &result.records)?;

    let branch_rows: Vec<BranchTotalRow> = result
        .branch_progress
        .iter()
        .map(|p| BranchTotalRow {
            branch: p.branch.clone(),
            valor_total: p.billed,
            meta: p.goal,
            cumplimiento: p.completion,
        })
        .collect();
    write_csv(&staged(dir, BRANCHES_FILE), &branch_rows)?;

    let payer_rows: Vec<PayerRankRow> = result
        .top_payers
        .iter()
        .enumerate()
        .map(|(idx, (payer, value))| PayerRankRow {
            rank: idx + 1,
            responsable: payer.clone(),
            valor_total: *value,
        })
        .collect();
    write_csv(&staged(dir, PAYERS_FILE), &payer_rows)?;

    write_json(&staged(dir, SUMMARY_FILE), result)
}

/// Write the filtered records, branch totals, payer ranking and summary.
///
/// Each file is written as `<name>.tmp` and renamed into place only after
/// all four were written, so a failed export leaves the directory as it was.
pub fn export_all(dir: &Path, result: &AggregateResult) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    if let Err(e) = write_exports(dir, result) {
        for name in EXPORT_FILES {
            let _ = fs::remove_file(staged(dir, name));
        }
        return Err(e);
    }

    let mut written = Vec::with_capacity(EXPORT_FILES.len());
    for name in EXPORT_FILES {
        let target = dir.join(name);
        fs::rename(staged(dir, name), &target)?;
        written.push(target);
    }
    info!(dir = %dir.display(), "report exported");
    Ok(written)
}
