//! Upload of a session spreadsheet to the prediction service.

use crate::config::Config;
use crate::error::PredictError;
use crate::models::ApiResponse;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Multipart field holding the uploaded file.
const FILE_FIELD: &str = "file";

/// Error body returned by the service on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Client for the single prediction endpoint.
///
/// Each call is a single attempt. Failures are returned to the caller as a
/// [`PredictError`] and never retried.
pub struct PredictionClient {
    http_client: reqwest::Client,
    base_url: String,
    upload_url: String,
    timeout_seconds: u64,
}

impl PredictionClient {
    /// Create a client for the configured service.
    pub fn new(config: &Config) -> Result<Self, PredictError> {
        let timeout_seconds = config.service.timeout_seconds;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| PredictError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.service.url.clone(),
            upload_url: config.upload_url(),
            timeout_seconds,
        })
    }

    /// Upload a CSV/XLSX file from disk and return the service's predictions.
    pub async fn upload_and_predict(&self, path: &Path) -> Result<ApiResponse, PredictError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());

        self.upload_bytes(&file_name, bytes).await
    }

    /// Upload in-memory file content under the given file name.
    pub async fn upload_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ApiResponse, PredictError> {
        info!(
            "Uploading {} ({} bytes) to {}",
            file_name,
            bytes.len(),
            self.upload_url
        );

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type_for(file_name))
            .map_err(|e| PredictError::Transport(e.to_string()))?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .http_client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PredictError::Timeout {
                        seconds: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    PredictError::Connect {
                        url: self.base_url.clone(),
                    }
                } else {
                    PredictError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(status, &body);
            warn!("Prediction service returned {}: {}", status, detail);
            return Err(PredictError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PredictError::Timeout {
                    seconds: self.timeout_seconds,
                }
            } else {
                PredictError::Transport(e.to_string())
            }
        })?;

        let parsed: ApiResponse =
            serde_json::from_str(&body).map_err(|e| PredictError::Decode(e.to_string()))?;

        debug!(
            "Service processed {}/{} rows",
            parsed.processed_rows, parsed.total_rows
        );

        if parsed.predictions.is_empty() {
            return Err(PredictError::EmptyResult);
        }

        Ok(parsed)
    }
}

/// MIME type sent for the uploaded file, from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

/// Human-readable message of a failed response.
///
/// Uses the JSON `detail` field when the body carries one.
fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) if !s.trim().is_empty() => s,
        Ok(ErrorBody { detail }) if !detail.is_null() => detail.to_string(),
        _ => format!("HTTP {}", status),
    }
}
