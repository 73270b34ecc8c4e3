//! HTTP client for the YOLO inference service.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use tracing::{debug, warn};

use carscan_models::RawFrame;

use crate::error::{MlError, MlResult};
use crate::types::{HealthResponse, InferenceRequest, InferenceResponse, ModelInfo, RawDetection};
use crate::DamageDetector;

/// Configuration for the ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max transport retries per request
    pub max_retries: u32,
    /// Version tag reported on results
    pub model_version: String,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            model_version: "yolo-v11".to_string(),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            model_version: std::env::var("ML_MODEL_VERSION")
                .unwrap_or_else(|_| "yolo-v11".to_string()),
        }
    }
}

/// HTTP implementation of [`DamageDetector`].
pub struct HttpDamageDetector {
    http: Client,
    config: MlClientConfig,
}

impl HttpDamageDetector {
    /// Create a new detector client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    /// Fetch the loaded-model description.
    pub async fn model_info(&self) -> MlResult<ModelInfo> {
        let url = format!("{}/model/info", self.config.base_url);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MlError::RequestFailed(format!(
                "model info returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Execute with bounded exponential-backoff retry.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| MlError::RequestFailed("retries exhausted".to_string())))
    }
}

#[async_trait]
impl DamageDetector for HttpDamageDetector {
    async fn ready(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => health.status == "ok" && health.model_loaded,
                    Err(e) => {
                        warn!("ML health response malformed: {}", e);
                        false
                    }
                }
            }
            Ok(response) => {
                warn!("ML health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("ML health check error: {}", e);
                false
            }
        }
    }

    async fn prepare(&self) -> MlResult<()> {
        let url = format!("{}/model/load", self.config.base_url);

        let response = self
            .with_retry(|| async {
                self.http.post(&url).send().await.map_err(MlError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::ModelNotReady(format!(
                "model load returned {status}: {body}"
            )));
        }

        debug!("detection model loaded");
        Ok(())
    }

    async fn infer(&self, frame: &RawFrame, min_confidence: f64) -> MlResult<Vec<RawDetection>> {
        let url = format!("{}/detect", self.config.base_url);

        let request = InferenceRequest {
            width: frame.width,
            height: frame.height,
            pixel_format: "rgb24".to_string(),
            data_b64: BASE64.encode(&frame.data),
            min_confidence,
        };

        let response = self
            .with_retry(|| async {
                self.http
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(MlError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "inference returned {status}: {body}"
            )));
        }

        let parsed: InferenceResponse = response.json().await?;
        Ok(parsed.detections)
    }

    fn model_version(&self) -> &str {
        &self.config.model_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.model_version, "yolo-v11");
    }
}
