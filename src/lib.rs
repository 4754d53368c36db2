//! # Kobo Billing
//!
//! A library for turning KoboToolbox form metadata into the monthly
//! per-country billing table used by finance.
//!
//! ## Core Concepts
//!
//! - **Billing period**: the month/year a form is billed against, taken from its deployment date
//! - **Masks**: configured exclusions (internal accounts, low-usage forms, test countries)
//! - **Country summary**: number of forms, submissions and share of submissions per country
//! - **Observer**: progress hooks injected into the pipeline instead of global log state
//!
//! ## Example
//!
//! ```rust
//! use kobo_billing::*;
//!
//! let records = vec![
//!     Record::new("a1").with_owner("a").with_country("KE").with_submissions(5).deployed_at("2025-04-03T09:00:00Z"),
//!     Record::new("a2").with_owner("b").with_country("KE").with_submissions(3).deployed_at("2025-04-20T09:00:00Z"),
//!     Record::new("a3").with_owner("a").with_country("UG").with_submissions(10).deployed_at("2025-03-11T09:00:00Z"),
//! ];
//! let period = BillingPeriod::new(4, 2025).unwrap();
//! let run = process_billing_period(&records, period, &FilterMasks::default()).unwrap();
//!
//! assert_eq!(run.dataset.len(), 2);
//! assert_eq!(run.summaries[0].country, "KE");
//! assert_eq!(run.summaries[0].submission_share_percent, 100.0);
//! ```

pub mod aggregate;
pub mod charts;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod masks;
pub mod observer;
pub mod period;
pub mod report;
pub mod schema;
pub mod source;

#[cfg(feature = "kobo")]
pub mod kobo;

pub use aggregate::{share_percent, summarize, ROUNDING_SLACK_PER_ROW};
pub use config::{create_billing_month_folder, load_api_token, load_config};
pub use error::{BillingError, Result};
pub use ingestion::{record_from_asset, records_from_assets, records_from_page};
pub use masks::{FilterOutcome, MaskStage};
pub use observer::{LogObserver, NoopObserver, PipelineObserver, RecordingObserver};
pub use period::{classify, select_period, BillingPeriod};
pub use report::ReportAssembler;
pub use schema::*;
pub use source::{RecordSource, SnapshotSource, VecSource};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Everything one pipeline run produced, ready for the report assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRun {
    pub period: BillingPeriod,
    /// Records handed over by the source.
    pub input_records: usize,
    /// Records deployed in the billing period, before any mask.
    pub period_records: usize,
    pub removed: StageCounts,
    pub dataset: Vec<Record>,
    pub summaries: Vec<CountrySummary>,
}

impl BillingRun {
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn country_count(&self) -> usize {
        self.summaries.len()
    }

    pub fn total_submissions(&self) -> u64 {
        aggregate::total_submissions(&self.summaries)
    }

    pub fn total_projects(&self) -> u64 {
        aggregate::total_projects(&self.summaries)
    }
}

pub struct BillingProcessor;

impl BillingProcessor {
    pub fn process(
        records: &[Record],
        period: BillingPeriod,
        masks: &FilterMasks,
        observer: &dyn PipelineObserver,
    ) -> Result<BillingRun> {
        masks::validate_masks(masks)?;

        observer.run_started(&period, masks, records.len());

        let in_period = select_period(records, &period);
        debug!(
            "{} of {} records fall outside {} or have no usable deployment date",
            records.len() - in_period.len(),
            records.len(),
            period
        );
        observer.period_selected(&period, in_period.len());

        let period_records = in_period.len();
        let FilterOutcome {
            records: remaining,
            removed,
        } = masks::apply_observed(&in_period, masks, observer);

        let summaries = summarize(&remaining);
        if summaries.is_empty() {
            warn!("No forms left to bill for {}", period);
        }
        observer.summary_produced(&summaries, remaining.len());

        Ok(BillingRun {
            period,
            input_records: records.len(),
            period_records,
            removed,
            dataset: remaining,
            summaries,
        })
    }
}

/// Runs the pipeline with progress reported through the `log` facade.
pub fn process_billing_period(
    records: &[Record],
    period: BillingPeriod,
    masks: &FilterMasks,
) -> Result<BillingRun> {
    BillingProcessor::process(records, period, masks, &LogObserver)
}
