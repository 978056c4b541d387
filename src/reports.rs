// Aggregation over billing records.
//
// Everything here is a pure function of its inputs and returns numbers only;
// formatting belongs to `output`.
use crate::error::ConfigError;
use crate::filter::{RecordFilter, Selection};
use crate::types::{AggregateResult, BillingRecord, BranchProgress, Dataset, Goal, GroupedSums};
use crate::util::ratio;
use rust_decimal::Decimal;
use tracing::debug;

/// Sum of billed amounts; `0` for an empty slice.
pub fn compute_total(records: &[BillingRecord]) -> Decimal {
    records.iter().map(|r| r.amount).sum()
}

/// `total / goal.total_goal`, refusing a non-positive goal.
pub fn compute_completion(total: Decimal, goal: &Goal) -> Result<f64, ConfigError> {
    if goal.total_goal <= Decimal::ZERO {
        return Err(ConfigError::NonPositiveGoal(goal.total_goal));
    }
    Ok(ratio(total, goal.total_goal))
}

/// Completion minus the ideal fraction; negative means behind schedule.
pub fn delta_vs_ideal(completion: f64, goal: &Goal) -> f64 {
    completion - goal.ideal_fraction
}

/// Sum amounts per key. Only keys present in `records` appear, in first-seen order.
pub fn group_sum<F>(records: &[BillingRecord], key_fn: F) -> GroupedSums
where
    F: Fn(&BillingRecord) -> &str,
{
    let mut groups = GroupedSums::default();
    for r in records {
        groups.add(key_fn(r), r.amount);
    }
    groups
}

/// The `n` largest groups, descending. Ties keep first-seen order.
pub fn top_n(groups: &GroupedSums, n: usize) -> Vec<(String, Decimal)> {
    let mut ranked: Vec<(String, Decimal)> = groups.entries().to_vec();
    // `sort_by` is stable, so equal sums stay in insertion order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// Records for which `predicate` holds, cloned in original order.
pub fn filter<P>(records: &[BillingRecord], predicate: P) -> Vec<BillingRecord>
where
    P: Fn(&BillingRecord) -> bool,
{
    records.iter().filter(|r| predicate(r)).cloned().collect()
}

/// The last `k` records in original order (all of them if fewer).
pub fn tail(records: &[BillingRecord], k: usize) -> &[BillingRecord] {
    &records[records.len().saturating_sub(k)..]
}

/// Billed vs sub-goal for every billed branch, then for every branch goal
/// the selection allows that has no billing yet.
pub fn branch_progress(
    by_branch: &GroupedSums,
    goal: &Goal,
    selection: &Selection,
) -> Vec<BranchProgress> {
    let progress = |branch: &str, billed: Decimal| {
        let target = goal.branch_goal(branch);
        BranchProgress {
            branch: branch.to_string(),
            billed,
            goal: target,
            completion: target.filter(|g| *g > Decimal::ZERO).map(|g| ratio(billed, g)),
        }
    };

    let mut rows: Vec<BranchProgress> = by_branch.iter().map(|(b, v)| progress(b, v)).collect();
    for g in &goal.branch_goals {
        if by_branch.get(&g.branch).is_none() && selection.matches(&g.branch) {
            rows.push(progress(&g.branch, Decimal::ZERO));
        }
    }
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub top_n: usize,
    pub tail: usize,
}

/// Compute the full metric set for one filter selection.
pub fn aggregate(
    dataset: &Dataset,
    goal: &Goal,
    selection: &RecordFilter,
    options: &ReportOptions,
) -> Result<AggregateResult, ConfigError> {
    let records = filter(&dataset.records, |r| selection.matches(r));
    let total_billed = compute_total(&records);
    let completion = compute_completion(total_billed, goal)?;

    let by_branch = group_sum(&records, |r| r.branch.as_str());
    let by_payer = group_sum(&records, |r| r.payer.as_str());
    let by_service = group_sum(&records, |r| r.service.as_str());
    let top_payers = top_n(&by_payer, options.top_n);
    let branch_progress = branch_progress(&by_branch, goal, &selection.branch);
    let recent = tail(&records, options.tail).to_vec();
    debug!(
        matched = records.len(),
        of = dataset.records.len(),
        %total_billed,
        completion,
        "aggregated"
    );

    Ok(AggregateResult {
        total_billed,
        total_goal: goal.total_goal,
        completion,
        ideal_fraction: goal.ideal_fraction,
        delta_vs_ideal: delta_vs_ideal(completion, goal),
        by_branch,
        by_payer,
        by_service,
        top_payers,
        branch_progress,
        record_count: records.len(),
        shipment_count: dataset.shipment_count(),
        records,
        recent,
    })
}
