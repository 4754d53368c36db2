//! Exclusion masks applied to the forms of a billing period.
//!
//! The stages always run in the same order (owner, submission count, country)
//! so that the per-stage removal counts are reproducible between runs. Every
//! predicate treats a missing field as a reason to drop the record rather
//! than as an error.

use crate::error::{BillingError, Result};
use crate::observer::{NoopObserver, PipelineObserver};
use crate::schema::{FilterMasks, Record, StageCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskStage {
    Owner,
    SubmissionCount,
    Country,
}

impl MaskStage {
    pub const ORDER: [MaskStage; 3] = [
        MaskStage::Owner,
        MaskStage::SubmissionCount,
        MaskStage::Country,
    ];
}

impl fmt::Display for MaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MaskStage::Owner => "account mask",
            MaskStage::SubmissionCount => "submission count mask",
            MaskStage::Country => "country mask",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub records: Vec<Record>,
    pub removed: StageCounts,
}

pub fn validate_masks(masks: &FilterMasks) -> Result<()> {
    check_entries("account_mask", &masks.excluded_owners)?;
    check_entries("country_mask", &masks.excluded_countries)?;
    Ok(())
}

fn check_entries(mask: &str, entries: &BTreeSet<String>) -> Result<()> {
    if let Some(blank) = entries.iter().find(|entry| entry.trim().is_empty()) {
        return Err(BillingError::InvalidMask {
            mask: mask.to_string(),
            details: format!("entry {:?} is blank", blank),
        });
    }
    Ok(())
}

pub fn passes_owner_mask(record: &Record, masks: &FilterMasks) -> bool {
    match record.owner.as_deref() {
        Some(owner) => !masks.excluded_owners.contains(owner),
        None => true,
    }
}

pub fn passes_submission_mask(record: &Record, masks: &FilterMasks) -> bool {
    record.submissions() > masks.min_submission_count
}

pub fn passes_country_mask(record: &Record, masks: &FilterMasks) -> bool {
    match record.country.as_deref() {
        Some(country) => !country.is_empty() && !masks.excluded_countries.contains(country),
        None => false,
    }
}

pub fn passes_stage(stage: MaskStage, record: &Record, masks: &FilterMasks) -> bool {
    match stage {
        MaskStage::Owner => passes_owner_mask(record, masks),
        MaskStage::SubmissionCount => passes_submission_mask(record, masks),
        MaskStage::Country => passes_country_mask(record, masks),
    }
}

/// Runs a single stage, returning the survivors and how many were removed.
pub fn apply_stage(
    stage: MaskStage,
    records: Vec<Record>,
    masks: &FilterMasks,
) -> (Vec<Record>, usize) {
    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .filter(|record| passes_stage(stage, record, masks))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Number of records with a null country and with an empty country.
pub fn count_unknown_countries(records: &[Record]) -> (usize, usize) {
    records.iter().fold((0, 0), |(missing, empty), record| {
        match record.country.as_deref() {
            None => (missing + 1, empty),
            Some("") => (missing, empty + 1),
            Some(_) => (missing, empty),
        }
    })
}

pub fn apply(records: &[Record], masks: &FilterMasks) -> FilterOutcome {
    apply_observed(records, masks, &NoopObserver)
}

/// Runs every stage in [`MaskStage::ORDER`], announcing each to `observer`.
pub fn apply_observed(
    records: &[Record],
    masks: &FilterMasks,
    observer: &dyn PipelineObserver,
) -> FilterOutcome {
    let mut remaining = records.to_vec();
    let mut removed = StageCounts::default();

    for stage in MaskStage::ORDER {
        if stage == MaskStage::Country {
            (removed.missing_country, removed.empty_country) =
                count_unknown_countries(&remaining);
        }

        let before = remaining.len();
        let (kept, count) = apply_stage(stage, remaining, masks);
        observer.stage_applied(stage, before, kept.len());

        match stage {
            MaskStage::Owner => removed.owner_mask = count,
            MaskStage::SubmissionCount => removed.submission_mask = count,
            MaskStage::Country => removed.country_mask = count,
        }
        remaining = kept;
    }

    FilterOutcome {
        records: remaining,
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(id: &str, owner: &str, country: Option<&str>, count: Option<u64>) -> Record {
        Record {
            id: id.to_string(),
            owner: Some(owner.to_string()),
            country: country.map(str::to_string),
            submission_count: count,
            ..Default::default()
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            form("1", "alice", Some("KE"), Some(12)),
            form("2", "staff", Some("KE"), Some(50)),
            form("3", "bob", Some("UG"), Some(3)),
            form("4", "bob", Some("UG"), None),
            form("5", "carol", None, Some(40)),
            form("6", "carol", Some(""), Some(40)),
            form("7", "dave", Some("Testland"), Some(40)),
            form("8", "erin", Some("TZ"), Some(5)),
        ]
    }

    fn masks() -> FilterMasks {
        FilterMasks::new(["staff"], ["Testland"], 5)
    }

    #[test]
    fn test_stage_counts_follow_fixed_order() {
        let outcome = apply(&sample(), &masks());
        assert_eq!(outcome.removed.owner_mask, 1);
        // 3 (below), 4 (absent) and 8 (exactly at threshold)
        assert_eq!(outcome.removed.submission_mask, 3);
        assert_eq!(outcome.removed.country_mask, 3);
        assert_eq!(outcome.removed.missing_country, 1);
        assert_eq!(outcome.removed.empty_country, 1);
        assert_eq!(outcome.removed.masked_country(), 1);

        let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let masks = FilterMasks::new(Vec::<String>::new(), Vec::<String>::new(), 4);
        assert!(!passes_submission_mask(&Record::new("a").with_submissions(4), &masks));
        assert!(passes_submission_mask(&Record::new("a").with_submissions(5), &masks));
        assert!(!passes_submission_mask(&Record::new("a"), &masks));
    }

    #[test]
    fn test_absent_count_fails_even_with_zero_threshold() {
        let masks = FilterMasks::default();
        assert!(!passes_submission_mask(&Record::new("a"), &masks));
        assert!(!passes_submission_mask(&Record::new("a").with_submissions(0), &masks));
        assert!(passes_submission_mask(&Record::new("a").with_submissions(1), &masks));
    }

    #[test]
    fn test_empty_country_always_excluded() {
        let masks = FilterMasks::default();
        let record = Record::new("a").with_country("").with_submissions(100);
        assert!(!passes_country_mask(&record, &masks));
        assert!(apply(&[record], &masks).records.is_empty());
    }

    #[test]
    fn test_ownerless_records_are_not_owner_masked() {
        let record = Record::new("a").with_country("KE").with_submissions(9);
        assert!(passes_owner_mask(&record, &masks()));
    }

    #[test]
    fn test_survivors_satisfy_every_mask() {
        let masks = masks();
        let outcome = apply(&sample(), &masks);
        for record in &outcome.records {
            assert!(record.submissions() > masks.min_submission_count);
            let country = record.country.as_deref().unwrap();
            assert!(!country.is_empty());
            assert!(!masks.excluded_countries.contains(country));
        }
    }

    #[test]
    fn test_chain_is_idempotent() {
        let masks = FilterMasks::new(["staff"], ["Testland"], 0);
        let first = apply(&sample(), &masks);
        let second = apply(&first.records, &masks);
        assert_eq!(first.records, second.records);
        assert_eq!(second.removed.total(), 0);
    }

    #[test]
    fn test_counts_match_actual_removals() {
        let input = sample();
        let outcome = apply(&input, &masks());
        assert_eq!(input.len() - outcome.records.len(), outcome.removed.total());
    }

    #[test]
    fn test_observed_chain_reports_each_stage() {
        let observer = crate::observer::RecordingObserver::new();
        let outcome = apply_observed(&sample(), &masks(), &observer);
        assert_eq!(outcome, apply(&sample(), &masks()));

        let lines = observer.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("account mask"));
        assert!(lines[1].contains("submission count mask"));
        assert!(lines[2].contains("country mask"));
    }

    #[test]
    fn test_blank_mask_entries_rejected() {
        let bad = FilterMasks::new([" "], Vec::<String>::new(), 0);
        assert!(matches!(
            validate_masks(&bad),
            Err(BillingError::InvalidMask { .. })
        ));
        assert!(validate_masks(&masks()).is_ok());
    }
}
