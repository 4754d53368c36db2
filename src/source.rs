use crate::error::{BillingError, Result};
use crate::ingestion::{records_from_assets, records_from_page};
use crate::schema::Record;
use log::info;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Supplies the complete, already materialized set of form records for a run.
pub trait RecordSource {
    fn load_records(&self) -> Result<Vec<Record>>;
}

pub struct VecSource {
    records: Vec<Record>,
}

impl VecSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl RecordSource for VecSource {
    fn load_records(&self) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

/// Reads a saved dump of the project-view listing: either a JSON array of
/// assets or a single page object with a `results` array.
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for SnapshotSource {
    fn load_records(&self) -> Result<Vec<Record>> {
        let content = fs::read_to_string(&self.path)?;
        let json: Value = serde_json::from_str(&content)?;

        let records = match &json {
            Value::Array(assets) => records_from_assets(assets),
            Value::Object(page) if page.contains_key("results") => records_from_page(&json),
            _ => {
                return Err(BillingError::SourceError(format!(
                    "{} holds neither an asset list nor a page with 'results'",
                    self.path.display()
                )))
            }
        };

        info!(
            "Loaded {} survey records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}
