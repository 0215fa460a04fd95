// Rectifier backend client - reqwest implementation of TelemetryApi
use crate::application::telemetry_api::{FetchError, TelemetryApi};
use crate::domain::dashboard::DashboardSnapshot;
use crate::domain::telemetry::{ChartSeries, RectifierRecord, RectifierStats};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;

#[derive(Debug, Clone)]
pub struct RectifierClient {
    base_url: String,
    client: reqwest::Client,
}

impl RectifierClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str, limit: Option<NonZeroU32>) -> String {
        match limit {
            Some(limit) => format!("{}/{}?limit={}", self.base_url, path, limit),
            None => format!("{}/{}", self.base_url, path),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        tracing::debug!("GET {}", url);
        let result = self.execute(&url).await;
        if let Err(e) = &result {
            tracing::warn!("Telemetry fetch failed: {}", e);
        }
        result
    }

    async fn execute<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.json::<T>().await.map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl TelemetryApi for RectifierClient {
    async fn dashboard_snapshot(&self) -> Result<DashboardSnapshot, FetchError> {
        self.get_json(self.build_url("rectifier/dashboard/", None)).await
    }

    async fn latest_record(&self) -> Result<RectifierRecord, FetchError> {
        self.get_json(self.build_url("rectifier/latest/", None)).await
    }

    async fn stats(&self) -> Result<RectifierStats, FetchError> {
        self.get_json(self.build_url("rectifier/stats/", None)).await
    }

    async fn chart_series(&self, limit: NonZeroU32) -> Result<ChartSeries, FetchError> {
        self.get_json(self.build_url("rectifier/chart_data/", Some(limit))).await
    }

    async fn records(&self, limit: NonZeroU32) -> Result<Vec<RectifierRecord>, FetchError> {
        self.get_json(self.build_url("rectifier/", Some(limit))).await
    }
}
