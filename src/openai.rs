use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Failures of the video generation API. Every variant is recoverable by the
/// caller (the generation provider falls back to a placeholder clip).
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("invalid API base url '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("request failed: {endpoint}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("OpenAI API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("video job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
    #[error("video job {job_id} not completed after {attempts} status checks")]
    Timeout { job_id: String, attempts: u32 },
    #[error("download video {job_id}: {message}")]
    Download { job_id: String, message: String },
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidBaseUrl { .. } => "config",
            Self::Network { .. } => "network",
            Self::Api { status: 401 | 403, .. } => "auth",
            Self::Api { .. } => "api",
            Self::JobFailed { .. } => "job_failed",
            Self::Timeout { .. } => "timeout",
            Self::Download { .. } => "download",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("CUTFORGE_OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self { base_url, api_key }
    }
}

pub fn videos_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/videos")
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub seconds: String,
    pub size: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<VideoJobError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoJobError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl VideoClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(GenerationError::MissingApiKey)?;
        let invalid_url = |message: String| GenerationError::InvalidBaseUrl {
            url: config.base_url.clone(),
            message,
        };
        let base = url::Url::parse(&config.base_url).map_err(|err| invalid_url(err.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid_url(format!("unsupported scheme '{}'", base.scheme())));
        }
        let endpoint = videos_endpoint(&config.base_url);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|source| GenerationError::Network {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    pub async fn create_video(&self, request: &VideoRequest) -> Result<VideoJob, GenerationError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|source| GenerationError::Network {
                endpoint: format!("POST {}", self.endpoint),
                source,
            })?;
        read_job(response).await
    }

    pub async fn retrieve_video(&self, job_id: &str) -> Result<VideoJob, GenerationError> {
        let endpoint = format!("{}/{job_id}", self.endpoint);
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| GenerationError::Network {
                endpoint: format!("GET {endpoint}"),
                source,
            })?;
        read_job(response).await
    }

    /// Poll until the job completes, fails, or `max_attempts` checks pass.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<VideoJob, GenerationError> {
        for attempt in 1..=max_attempts {
            let job = self.retrieve_video(job_id).await?;
            match job.status {
                JobStatus::Completed => return Ok(job),
                JobStatus::Failed => {
                    let message = job
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "no error message".to_owned());
                    return Err(GenerationError::JobFailed {
                        job_id: job_id.to_owned(),
                        message,
                    });
                }
                status => {
                    tracing::debug!(job_id, attempt, ?status, progress = ?job.progress, "video job pending");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(GenerationError::Timeout {
            job_id: job_id.to_owned(),
            attempts: max_attempts,
        })
    }

    pub async fn download_content(&self, job_id: &str, dest: &Path) -> Result<u64, GenerationError> {
        let endpoint = format!("{}/{job_id}/content", self.endpoint);
        let download_err = |message: String| GenerationError::Download {
            job_id: job_id.to_owned(),
            message,
        };

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| GenerationError::Network {
                endpoint: format!("GET {endpoint}"),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| download_err(format!("read body: {err}")))?;
        if bytes.is_empty() {
            return Err(download_err("empty content".to_owned()));
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|err| download_err(format!("write {}: {err}", dest.display())))?;
        Ok(bytes.len() as u64)
    }
}

async fn read_job(response: reqwest::Response) -> Result<VideoJob, GenerationError> {
    let status = response.status();
    let raw = response
        .text()
        .await
        .map_err(|err| GenerationError::InvalidResponse(format!("read body: {err}")))?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
        return Err(GenerationError::Api {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_str(&raw).map_err(|err| GenerationError::InvalidResponse(err.to_string()))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            videos_endpoint("http://127.0.0.1:9/v1/"),
            "http://127.0.0.1:9/v1/videos"
        );
    }

    #[test]
    fn error_message_is_extracted_when_present() {
        assert_eq!(
            parse_error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(parse_error_message("upstream timeout"), None);
    }

    #[test]
    fn job_status_tolerates_unknown_values() -> anyhow::Result<()> {
        let job: VideoJob = serde_json::from_str(r#"{"id":"v1","status":"in_progress","progress":40}"#)?;
        assert_eq!(job.status, JobStatus::InProgress);
        let job: VideoJob = serde_json::from_str(r#"{"id":"v1","status":"cancelled"}"#)?;
        assert_eq!(job.status, JobStatus::Unknown);
        Ok(())
    }

    #[test]
    fn missing_key_is_reported_before_any_request() {
        let config = OpenAiConfig {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
        };
        let err = VideoClient::new(&config).unwrap_err();
        assert_eq!(err.kind(), "missing_api_key");
    }

    #[test]
    fn base_url_must_be_http() {
        for base_url in ["not a url", "ftp://example.com/v1"] {
            let config = OpenAiConfig {
                base_url: base_url.to_owned(),
                api_key: Some("sk-test".to_owned()),
            };
            let err = VideoClient::new(&config).unwrap_err();
            assert_eq!(err.kind(), "config", "{base_url}");
        }
    }

    #[test]
    fn auth_statuses_have_their_own_kind() {
        let err = GenerationError::Api {
            status: 401,
            message: "nope".to_owned(),
        };
        assert_eq!(err.kind(), "auth");
        assert_eq!(err.to_string(), "OpenAI API error (401): nope");
    }
}
