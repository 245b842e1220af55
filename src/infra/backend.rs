//! HTTP client for the backend index API.

use crate::domain::index::{BackendIndex, IndexError};
use crate::domain::model::{IndexEntry, ProductHash};
use crate::infra::config;
use reqwest::StatusCode;

pub struct HttpBackendIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendIndex {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(config::backend_api_url())
    }
}

#[async_trait::async_trait]
impl BackendIndex for HttpBackendIndex {
    async fn put(&self, entry: &IndexEntry) -> Result<(), IndexError> {
        let response = self
            .client
            .post(format!("{}/api/products", self.base_url))
            .json(entry)
            .send()
            .await
            .map_err(|e| IndexError::StoreError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::StoreError(format!(
                "POST /api/products returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn get_by_hash(&self, hash: &ProductHash) -> Result<Option<IndexEntry>, IndexError> {
        let response = self
            .client
            .get(format!("{}/api/products/hash/{}", self.base_url, hash))
            .send()
            .await
            .map_err(|e| IndexError::StoreError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(IndexError::StoreError(format!(
                "GET /api/products/hash returned {}",
                response.status()
            )));
        }

        // Unwrap the {success, data, error} envelope.
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IndexError::StoreError(e.to_string()))?;
        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| IndexError::StoreError("response missing data field".to_string()))?;
        let entry: IndexEntry = serde_json::from_value(data)
            .map_err(|e| IndexError::StoreError(format!("invalid index entry: {}", e)))?;
        Ok(Some(entry))
    }

    async fn ping(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| IndexError::StoreError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IndexError::StoreError(format!(
                "health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
