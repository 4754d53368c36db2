use crate::error::{BillingError, Result};
use crate::masks::validate_masks;
use crate::period::BillingPeriod;
use crate::schema::BillingConfig;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct Credentials {
    token: Option<String>,
}

pub fn parse_config(content: &str) -> Result<BillingConfig> {
    let config: BillingConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &BillingConfig) -> Result<()> {
    if config.kobo.server.trim().is_empty() {
        return Err(BillingError::ConfigError("kobo.server is empty".to_string()));
    }
    if config.kobo.project_view_id.trim().is_empty() {
        return Err(BillingError::ConfigError(
            "kobo.project_view_id is empty".to_string(),
        ));
    }
    if config.kobo.request_timeout_secs == Some(0) {
        return Err(BillingError::ConfigError(
            "kobo.request_timeout_secs must be positive".to_string(),
        ));
    }
    validate_masks(&config.masks)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<BillingConfig> {
    let path = path.as_ref();
    info!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    debug!(
        "Configuration has {} account mask entries and {} country mask entries",
        config.masks.excluded_owners.len(),
        config.masks.excluded_countries.len()
    );
    Ok(config)
}

/// Reads the API token from a JSON file of the form `{"token": "..."}`.
pub fn load_api_token(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let credentials: Credentials = serde_json::from_str(&content)?;

    credentials
        .token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| BillingError::MissingToken(path.display().to_string()))
}

pub fn create_billing_month_folder(
    base: impl AsRef<Path>,
    period: &BillingPeriod,
) -> Result<PathBuf> {
    let folder = base.as_ref().join(period.key());
    fs::create_dir_all(&folder)?;
    Ok(folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
kobo:
  server: https://kf.kobotoolbox.org
  project_view_id: pv_abc
output_path: output
account_mask:
  - staff_account
  - demo
country_mask:
  - Testland
ncount_mask: 10
"#;

    #[test]
    fn test_parse_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.kobo.project_view_id, "pv_abc");
        assert_eq!(config.kobo.request_timeout_secs, None);
        assert_eq!(config.output_path, PathBuf::from("output"));
        assert!(config.masks.excluded_owners.contains("demo"));
        assert!(config.masks.excluded_countries.contains("Testland"));
        assert_eq!(config.masks.min_submission_count, 10);
    }

    #[test]
    fn test_masks_default_when_omitted() {
        let config = parse_config(
            "kobo:\n  server: https://kf.example.org\n  project_view_id: pv\noutput_path: out\n",
        )
        .unwrap();
        assert!(config.masks.excluded_owners.is_empty());
        assert_eq!(config.masks.min_submission_count, 0);
    }

    #[test]
    fn test_negative_threshold_is_a_config_error() {
        let content = SAMPLE.replace("ncount_mask: 10", "ncount_mask: -1");
        assert!(matches!(
            parse_config(&content),
            Err(BillingError::YamlError(_))
        ));
    }

    #[test]
    fn test_empty_server_rejected() {
        let content = SAMPLE.replace("https://kf.kobotoolbox.org", "\"\"");
        assert!(matches!(
            parse_config(&content),
            Err(BillingError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_api_token() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("token.json");
        fs::write(&good, r#"{"token": " abc123 "}"#).unwrap();
        assert_eq!(load_api_token(&good).unwrap(), "abc123");

        let blank = dir.path().join("blank.json");
        fs::write(&blank, r#"{"token": ""}"#).unwrap();
        assert!(matches!(
            load_api_token(&blank),
            Err(BillingError::MissingToken(_))
        ));
    }

    #[test]
    fn test_create_billing_month_folder() {
        let dir = tempfile::tempdir().unwrap();
        let period = BillingPeriod::new(4, 2025).unwrap();
        let folder = create_billing_month_folder(dir.path(), &period).unwrap();
        assert!(folder.ends_with("04_2025"));
        assert!(folder.is_dir());
        // second call is fine
        create_billing_month_folder(dir.path(), &period).unwrap();
    }
}
