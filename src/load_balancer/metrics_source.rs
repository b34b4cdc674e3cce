//! Time-series metrics source used for metric-driven selection.
//!
//! # Responsibilities
//! - Render the configured PromQL template for the healthy relays
//! - Issue time-bounded range queries against Prometheus
//! - Decode matrix results into per-series sample lists
//!
//! # Design Decisions
//! - One request per selection cycle, never retried inline
//! - Every failure (transport, HTTP status, body) is a `MetricsError`;
//!   the selection engine decides how to degrade

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::LoadBalancerConfig;
use crate::load_balancer::endpoint::Endpoint;

/// Sampling step of range queries, in seconds.
pub const STEP_SECS: u64 = 60;

const QUERY_RANGE_PATH: &str = "/api/v1/query_range";

/// Errors raised while querying the metrics source.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid Prometheus endpoint: {0}")]
    Endpoint(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("query failed ({error_type}): {error}")]
    Rejected { error_type: String, error: String },

    #[error("unexpected result type {0:?}, expected matrix")]
    ResultType(String),

    #[error("sample value {0:?} is not a number")]
    Value(String),
}

/// Parameters of one range query. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub query: String,
    pub start: u64,
    pub end: u64,
    pub step: u64,
}

impl RangeQuery {
    /// Window of `lookback` ending now.
    pub fn lookback(query: String, lookback: Duration) -> Self {
        let end = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            query,
            start: end.saturating_sub(lookback.as_secs()),
            end,
            step: STEP_SECS,
        }
    }
}

/// One returned series: its labels and sample values in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub values: Vec<f64>,
}

/// A source of range-query results.
pub trait MetricsSource: Send + Sync {
    fn query_range(
        &self,
        query: &RangeQuery,
    ) -> impl Future<Output = Result<Vec<Series>, MetricsError>> + Send;
}

/// Substitute every `%s` in `template` with the `|`-joined relay addresses.
pub fn render_query(template: &str, endpoints: &[Endpoint]) -> String {
    let joined = endpoints
        .iter()
        .map(Endpoint::as_str)
        .collect::<Vec<_>>()
        .join("|");
    template.replace("%s", &joined)
}

/// Prometheus HTTP API client.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    url: Url,
    client: reqwest::Client,
}

impl PrometheusClient {
    pub fn new(config: &LoadBalancerConfig) -> Result<Self, MetricsError> {
        let prometheus = &config.prometheus;
        let mut url = Url::parse(&prometheus.endpoint)
            .map_err(|e| MetricsError::Endpoint(format!("{}: {}", prometheus.endpoint, e)))?;
        url.set_port(Some(prometheus.port))
            .map_err(|_| MetricsError::Endpoint(format!("{} cannot carry a port", prometheus.endpoint)))?;
        url.set_path(QUERY_RANGE_PATH);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl MetricsSource for PrometheusClient {
    async fn query_range(&self, query: &RangeQuery) -> Result<Vec<Series>, MetricsError> {
        tracing::debug!(query = %query.query, start = query.start, end = query.end, "Prometheus query");

        let response = self
            .client
            .get(self.url.clone())
            .query(&[
                ("query", query.query.clone()),
                ("start", query.start.to_string()),
                ("end", query.end.to_string()),
                ("step", query.step.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetricsError::Status(status));
        }

        let body = response.bytes().await?;
        let series = parse_response(&body)?;
        tracing::debug!(series = series.len(), "Prometheus query result");
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiData {
    result_type: String,
    result: Vec<ApiSeries>,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

/// Decode a `query_range` response body.
pub fn parse_response(body: &[u8]) -> Result<Vec<Series>, MetricsError> {
    let response: ApiResponse = serde_json::from_slice(body)?;

    if response.status != "success" {
        return Err(MetricsError::Rejected {
            error_type: response.error_type.unwrap_or_else(|| "unknown".to_string()),
            error: response.error.unwrap_or_default(),
        });
    }

    let Some(data) = response.data else {
        return Ok(Vec::new());
    };
    if data.result_type != "matrix" {
        return Err(MetricsError::ResultType(data.result_type));
    }

    data.result
        .into_iter()
        .map(|series| {
            let values = series
                .values
                .into_iter()
                .map(|(_, raw)| raw.parse::<f64>().map_err(|_| MetricsError::Value(raw)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Series {
                labels: series.metric,
                values,
            })
        })
        .collect()
}
