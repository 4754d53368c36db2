use crate::masks::MaskStage;
use crate::period::BillingPeriod;
use crate::schema::{CountrySummary, FilterMasks};
use log::info;
use std::cell::RefCell;

/// Hooks invoked by [`crate::BillingProcessor`] as the pipeline progresses.
///
/// All methods default to no-ops so implementors only override what they need.
pub trait PipelineObserver {
    fn run_started(&self, _period: &BillingPeriod, _masks: &FilterMasks, _records: usize) {}

    fn period_selected(&self, _period: &BillingPeriod, _selected: usize) {}

    fn stage_applied(&self, _stage: MaskStage, _before: usize, _after: usize) {}

    fn summary_produced(&self, _summaries: &[CountrySummary], _dataset_len: usize) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

fn describe_run_started(period: &BillingPeriod, masks: &FilterMasks, records: usize) -> Vec<String> {
    vec![
        format!("Processing {} records for billing month {}", records, period),
        format!("Account mask applied: {:?}", masks.excluded_owners),
        format!("Country mask applied: {:?}", masks.excluded_countries),
        format!(
            "Minimum submission count mask applied: {}",
            masks.min_submission_count
        ),
    ]
}

fn describe_period(period: &BillingPeriod, selected: usize) -> String {
    format!(
        "Number of forms for the billing month {}: {}",
        period, selected
    )
}

fn describe_stage(stage: MaskStage, before: usize, after: usize) -> String {
    format!(
        "Removed {} forms due to {} ({} -> {})",
        before - after,
        stage,
        before,
        after
    )
}

fn describe_summary(summaries: &[CountrySummary], dataset_len: usize) -> Vec<String> {
    let submissions: u64 = summaries.iter().map(|s| s.submission_total).sum();
    vec![
        format!(
            "Data filtered successfully with {} records remaining",
            dataset_len
        ),
        format!("Number of countries: {}", summaries.len()),
        format!("Total number of submissions: {}", submissions),
    ]
}

/// Forwards pipeline progress to the `log` facade.
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn run_started(&self, period: &BillingPeriod, masks: &FilterMasks, records: usize) {
        for line in describe_run_started(period, masks, records) {
            info!("{}", line);
        }
    }

    fn period_selected(&self, period: &BillingPeriod, selected: usize) {
        info!("{}", describe_period(period, selected));
    }

    fn stage_applied(&self, stage: MaskStage, before: usize, after: usize) {
        info!("{}", describe_stage(stage, before, after));
    }

    fn summary_produced(&self, summaries: &[CountrySummary], dataset_len: usize) {
        for line in describe_summary(summaries, dataset_len) {
            info!("{}", line);
        }
    }
}

/// Keeps every progress line so it can be embedded in the finance report,
/// while still forwarding to the `log` facade.
#[derive(Default)]
pub struct RecordingObserver {
    lines: RefCell<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn transcript(&self) -> String {
        self.lines.borrow().join("\n")
    }

    /// Adds a line produced outside the pipeline (fetching, writing files).
    pub fn note(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines.borrow_mut().push(line);
    }

    fn push_all(&self, lines: Vec<String>) {
        for line in lines {
            self.note(line);
        }
    }
}

impl PipelineObserver for RecordingObserver {
    fn run_started(&self, period: &BillingPeriod, masks: &FilterMasks, records: usize) {
        self.push_all(describe_run_started(period, masks, records));
    }

    fn period_selected(&self, period: &BillingPeriod, selected: usize) {
        self.note(describe_period(period, selected));
    }

    fn stage_applied(&self, stage: MaskStage, before: usize, after: usize) {
        self.note(describe_stage(stage, before, after));
    }

    fn summary_produced(&self, summaries: &[CountrySummary], dataset_len: usize) {
        self.push_all(describe_summary(summaries, dataset_len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_lines_in_order() {
        let observer = RecordingObserver::new();
        let period = BillingPeriod::new(4, 2025).unwrap();
        observer.period_selected(&period, 3);
        observer.stage_applied(MaskStage::Owner, 3, 2);
        observer.note("ZIP archive created");

        let lines = observer.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Number of forms for the billing month 04_2025: 3");
        assert_eq!(lines[1], "Removed 1 forms due to account mask (3 -> 2)");
        assert!(observer.transcript().ends_with("ZIP archive created"));
    }
}
