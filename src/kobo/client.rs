use crate::error::{BillingError, Result};
use crate::ingestion::{records_from_page, unvisited_next_page};
use crate::schema::{KoboSettings, Record};
use log::{debug, info};
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Fetches asset metadata from the Kobo v2 API.
#[derive(Clone)]
pub struct KoboClient {
    client: Client,
    server: String,
    token: String,
    timeout: Duration,
}

impl KoboClient {
    pub fn new(server: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            server: server.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_settings(settings: &KoboSettings, token: impl Into<String>) -> Self {
        let client = Self::new(settings.server.clone(), token);
        match settings.request_timeout_secs {
            Some(secs) => client.with_timeout(Duration::from_secs(secs)),
            None => client,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn assets_url(&self, project_view_id: &str) -> String {
        format!(
            "{}/api/v2/project-views/{}/assets/",
            self.server, project_view_id
        )
    }

    async fn get_page(&self, url: &str) -> Result<serde_json::Value> {
        let res = self
            .client
            .get(url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await?;
            return Err(BillingError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res.json().await?)
    }

    /// Walks every page of the project view and returns its survey records.
    pub async fn fetch_records(&self, project_view_id: &str) -> Result<Vec<Record>> {
        let mut url = Some(self.assets_url(project_view_id));
        let mut records = Vec::new();
        let mut visited = HashSet::new();

        while let Some(current) = url {
            debug!("Fetching {}", current);
            let page = self.get_page(&current).await?;
            records.extend(records_from_page(&page));
            visited.insert(current);
            url = unvisited_next_page(&page, &visited);
        }
        let pages = visited.len();

        info!(
            "Data fetched successfully with {} records over {} pages",
            records.len(),
            pages
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_url_ignores_trailing_slash() {
        let client = KoboClient::new("https://kf.kobotoolbox.org/", "token");
        assert_eq!(
            client.assets_url("pv123"),
            "https://kf.kobotoolbox.org/api/v2/project-views/pv123/assets/"
        );
    }

    #[test]
    fn test_timeout_from_settings() {
        let settings = KoboSettings {
            server: "https://kf.example.org".to_string(),
            project_view_id: "pv".to_string(),
            request_timeout_secs: Some(5),
        };
        let client = KoboClient::from_settings(&settings, "t");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }
}
