use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Invalid billing month '{0}': must be a number between 01 and 12")]
    InvalidMonth(String),

    #[error("Invalid billing year '{0}': must be a four digit year (e.g. 2025)")]
    InvalidYear(String),

    #[error("Invalid {mask}: {details}")]
    InvalidMask { mask: String, details: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No API token found in {0}")]
    MissingToken(String),

    #[error("Record source error: {0}")]
    SourceError(String),

    #[cfg(feature = "kobo")]
    #[error("Kobo API returned status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[cfg(feature = "kobo")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
