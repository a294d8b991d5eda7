use log::{info, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::api::response::ApiResponse;
use crate::ingest::records::LogBatch;
use crate::session::session::Session;

/// Per-stream outcome reported by the `_json` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub name: String,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub code: u16,
    #[serde(default)]
    pub status: Vec<StreamStatus>,
}

impl IngestReport {
    pub fn successful(&self) -> u64 {
        self.status.iter().map(|status| status.successful).sum()
    }

    pub fn failed(&self) -> u64 {
        self.status.iter().map(|status| status.failed).sum()
    }

    /// Reads the report leniently: a body that does not parse yields an empty report
    /// carrying only the HTTP status.
    pub fn from_response(response: &ApiResponse) -> IngestReport {
        response.json().unwrap_or_else(|_| IngestReport {
            code: response.status.as_u16(),
            status: Vec::new(),
        })
    }

    pub fn log_failures(&self) {
        for status in self.status.iter().filter(|status| status.failed > 0) {
            warn!(
                "Stream {} rejected {} of {} records: {}",
                status.name,
                status.failed,
                status.failed + status.successful,
                status.error.as_deref().unwrap_or("no reason given")
            );
        }
    }
}

/// `POST api/{org}/{stream}/_json` with the batch as one JSON array. The status is not
/// checked here.
pub async fn ingest_json(
    session: &Session,
    stream: &str,
    batch: &LogBatch,
) -> anyhow::Result<ApiResponse> {
    info!("Ingesting {} records into stream {}", batch.len(), stream);

    let url = session.org_url(&[stream, "_json"])?;
    let request = session
        .request(Method::POST, url)
        .header(CONTENT_TYPE, "application/json")
        .json(batch);

    session.execute(request).await
}
