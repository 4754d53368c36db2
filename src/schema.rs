use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One surveyed form as seen by the billing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Record {
    /// Kobo asset uid.
    pub id: String,
    pub name: Option<String>,
    /// Username of the account that owns the form.
    pub owner: Option<String>,
    /// Raw `date_deployed` value. `None` for forms that were never deployed.
    pub deployment_timestamp: Option<String>,
    pub submission_count: Option<u64>,
    pub country: Option<String>,
    pub sector: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_submissions(mut self, count: u64) -> Self {
        self.submission_count = Some(count);
        self
    }

    pub fn deployed_at(mut self, timestamp: impl Into<String>) -> Self {
        self.deployment_timestamp = Some(timestamp.into());
        self
    }

    /// Submission count with an absent value normalized to zero.
    pub fn submissions(&self) -> u64 {
        self.submission_count.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
pub struct FilterMasks {
    #[serde(rename = "account_mask", default)]
    #[schemars(description = "Owner usernames whose forms are never billed (internal, test or partner accounts).")]
    pub excluded_owners: BTreeSet<String>,

    #[serde(rename = "country_mask", default)]
    #[schemars(description = "Country labels that are never billed. Forms without a country are always excluded.")]
    pub excluded_countries: BTreeSet<String>,

    #[serde(rename = "ncount_mask", default)]
    #[schemars(
        description = "Exclusive submission threshold: a form is billed only if it received MORE than this many submissions."
    )]
    pub min_submission_count: u64,
}

impl FilterMasks {
    pub fn new<O, C>(excluded_owners: O, excluded_countries: C, min_submission_count: u64) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            excluded_owners: excluded_owners.into_iter().map(Into::into).collect(),
            excluded_countries: excluded_countries.into_iter().map(Into::into).collect(),
            min_submission_count,
        }
    }
}

/// One row of the per-country billing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub country: String,
    pub project_count: u64,
    pub submission_total: u64,
    pub submission_share_percent: f64,
}

/// How many records each mask stage removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageCounts {
    pub owner_mask: usize,
    pub submission_mask: usize,
    pub country_mask: usize,
    /// Part of `country_mask` removed because the country was null.
    pub missing_country: usize,
    /// Part of `country_mask` removed because the country was an empty string.
    pub empty_country: usize,
}

impl StageCounts {
    pub fn total(&self) -> usize {
        self.owner_mask + self.submission_mask + self.country_mask
    }

    /// Part of `country_mask` removed because the country is listed in the mask.
    pub fn masked_country(&self) -> usize {
        self.country_mask
            .saturating_sub(self.missing_country + self.empty_country)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KoboSettings {
    #[schemars(description = "Base URL of the Kobo server, e.g. https://kf.kobotoolbox.org")]
    pub server: String,

    #[schemars(description = "Identifier of the project view whose assets are billed")]
    pub project_view_id: String,

    #[serde(default)]
    #[schemars(description = "Per-request timeout in seconds. Defaults to 60.")]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BillingConfig {
    pub kobo: KoboSettings,

    #[schemars(description = "Directory under which one folder per billing month is created")]
    pub output_path: PathBuf,

    #[serde(flatten)]
    pub masks: FilterMasks,
}

impl BillingConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BillingConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = BillingConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("output_path"));
        assert!(schema_json.contains("account_mask"));
        assert!(schema_json.contains("ncount_mask"));
    }

    #[test]
    fn test_absent_submission_count_reads_as_zero() {
        let record = Record::new("a1");
        assert_eq!(record.submissions(), 0);
        assert_eq!(record.with_submissions(7).submissions(), 7);
    }

    #[test]
    fn test_stage_count_breakdown() {
        let counts = StageCounts {
            owner_mask: 1,
            submission_mask: 2,
            country_mask: 5,
            missing_country: 1,
            empty_country: 2,
        };
        assert_eq!(counts.total(), 8);
        assert_eq!(counts.masked_country(), 2);
    }
}
