use crate::schema::{CountrySummary, Record};
use std::collections::BTreeMap;

/// Most a single rounded share can drift from its exact value.
///
/// Shares are rounded independently, so a table of `n` rows sums to within
/// `n * ROUNDING_SLACK_PER_ROW` of 100 (seven equal countries give 100.03).
pub const ROUNDING_SLACK_PER_ROW: f64 = 0.005;

/// Rounds to two decimals, ties away from zero (`f64::round`).
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of `part` in `total` as a percentage with two decimals.
/// A zero total yields 0.0 rather than NaN.
pub fn share_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to_cents(part as f64 / total as f64 * 100.0)
}

/// Groups the filtered dataset by country. Rows come back sorted by country.
pub fn summarize(records: &[Record]) -> Vec<CountrySummary> {
    let mut groups: BTreeMap<&str, (u64, u64)> = BTreeMap::new();

    for record in records {
        let Some(country) = record.country.as_deref() else {
            continue;
        };
        let entry = groups.entry(country).or_insert((0, 0));
        entry.0 += 1;
        // counts come from the server unchecked; clamp instead of wrapping
        entry.1 = entry.1.saturating_add(record.submissions());
    }

    let grand_total = groups
        .values()
        .fold(0u64, |acc, (_, submissions)| acc.saturating_add(*submissions));

    groups
        .into_iter()
        .map(|(country, (projects, submissions))| CountrySummary {
            country: country.to_string(),
            project_count: projects,
            submission_total: submissions,
            submission_share_percent: share_percent(submissions, grand_total),
        })
        .collect()
}

pub fn total_submissions(summaries: &[CountrySummary]) -> u64 {
    summaries
        .iter()
        .fold(0u64, |acc, s| acc.saturating_add(s.submission_total))
}

pub fn total_projects(summaries: &[CountrySummary]) -> u64 {
    summaries.iter().map(|s| s.project_count).sum()
}
