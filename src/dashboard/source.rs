use std::time::Duration;

use async_trait::async_trait;
use lineboard_common::{DefectRecord, ProductionRecord, ingest};
use serde_json::Value;

use crate::errors::FetchError;

/// Where panels pull their records from.
///
/// Real implementation: [`HttpSource`]. Tests supply in-memory doubles.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn production(&self) -> Result<Vec<ProductionRecord>, FetchError>;

    async fn defects(&self) -> Result<Vec<DefectRecord>, FetchError>;

    /// Units produced as counted by RFID scans.
    async fn scan_count(&self) -> Result<u64, FetchError>;
}

/// Reads the floor server's JSON API.
///
/// Responses are normalised through `ingest`, so any producer spelling of
/// the record fields is accepted. Fields that cannot be read are logged at
/// `warn` and counted as 0 or unassigned.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| FetchError::Request {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Request {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        resp.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Decode {
                    url,
                    message: e.to_string(),
                }
            }
        })
    }
}

fn report_issues<T>(what: &str, ingested: ingest::Ingested<T>) -> Vec<T> {
    for issue in &ingested.issues {
        tracing::warn!(collection = what, error = %issue, "malformed record");
    }
    ingested.records
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn production(&self) -> Result<Vec<ProductionRecord>, FetchError> {
        let body = self.get_json("/api/employees").await?;
        Ok(report_issues("employees", ingest::production_records(&body)))
    }

    async fn defects(&self) -> Result<Vec<DefectRecord>, FetchError> {
        let body = self.get_json("/api/defects").await?;
        Ok(report_issues("defects", ingest::defect_records(&body)))
    }

    async fn scan_count(&self) -> Result<u64, FetchError> {
        let body = self.get_json("/api/scan-count").await?;
        Ok(ingest::scan_count(&body))
    }
}
