// Telemetry API trait - one method per backend resource
use crate::domain::dashboard::DashboardSnapshot;
use crate::domain::telemetry::{ChartSeries, RectifierRecord, RectifierStats};
use async_trait::async_trait;
use std::num::NonZeroU32;

/// Default number of chart samples requested.
pub const DEFAULT_CHART_LIMIT: NonZeroU32 = NonZeroU32::new(50).unwrap();

/// Default number of raw records requested.
pub const DEFAULT_RECORDS_LIMIT: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// Why a single request produced no value. Callers that only care about
/// success need one `Err(_)` branch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// Snapshot in the exact shape the dashboard renders
    async fn dashboard_snapshot(&self) -> Result<DashboardSnapshot, FetchError>;

    /// Most recent raw record
    async fn latest_record(&self) -> Result<RectifierRecord, FetchError>;

    /// Aggregates over the stored history
    async fn stats(&self) -> Result<RectifierStats, FetchError>;

    /// Last `limit` samples as parallel columns, oldest first
    async fn chart_series(&self, limit: NonZeroU32) -> Result<ChartSeries, FetchError>;

    /// Last `limit` raw records, newest first
    async fn records(&self, limit: NonZeroU32) -> Result<Vec<RectifierRecord>, FetchError>;
}
