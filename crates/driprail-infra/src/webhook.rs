//! Reqwest-backed outbound webhook poster.
//!
//! Production implementation of the `WebhookPoster` port from
//! `driprail-core`. The receiver's status code passes through unchanged so
//! the step's retry classification sees exactly what the receiver said.

use std::time::Duration;

use serde_json::Value;

use driprail_core::steps::WebhookPoster;
use driprail_types::error::ConnectorError;

use crate::connector::transport_error;

/// HTTP poster for the `post_webhook` step.
pub struct ReqwestWebhookPoster {
    client: reqwest::Client,
}

impl ReqwestWebhookPoster {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self { client }
    }
}

impl Default for ReqwestWebhookPoster {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookPoster for ReqwestWebhookPoster {
    async fn post(&self, url: &str, body: &Value) -> Result<u16, ConnectorError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), error_body));
        }

        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unreachable_receiver_is_retryable() {
        // Nothing listens on this port; the transport failure must come
        // back as a 503-shaped retryable error.
        let poster = ReqwestWebhookPoster::new();
        let err = poster
            .post("http://127.0.0.1:9", &json!({ "ping": true }))
            .await
            .unwrap_err();
        assert_eq!(err.status, 503);
        assert!(err.is_retryable());
    }
}
