//! TwilioConnector -- SMS adapter over the Twilio Messages API.
//!
//! Advertises messaging only. Requests are form-encoded against
//! `/2010-04-01/Accounts/{sid}/Messages.json` with HTTP basic auth; the
//! auth token is a [`secrecy::SecretString`] exposed only while the
//! request is built. The sending number comes from the stored credential,
//! not the caller.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use driprail_core::connector::Connector;
use driprail_types::connection::Platform;
use driprail_types::connector::{ConnectorCapabilities, MessageReceipt, OutboundMessage, Tag};
use driprail_types::error::ConnectorError;

use super::transport_error;

/// SMS connector bound to one account's gateway credentials.
pub struct TwilioConnector {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    base_url: String,
}

impl TwilioConnector {
    pub fn new(account_sid: String, auth_token: SecretString, from_number: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            account_sid,
            auth_token,
            from_number,
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

// No Debug derive; the auth token stays out of formatting paths.

impl Connector for TwilioConnector {
    fn platform(&self) -> Platform {
        Platform::Twilio
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities {
            tags: false,
            records: false,
            messaging: true,
        }
    }

    async fn get_tags(&self, _contact_id: &str) -> Result<Vec<Tag>, ConnectorError> {
        // An SMS gateway has no tags; the universal capability reports none.
        Ok(Vec::new())
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<MessageReceipt, ConnectorError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[
                ("To", message.to.as_str()),
                ("From", self.from_number.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), body));
        }

        let created: MessageResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::upstream(502, format!("invalid message response: {e}")))?;

        Ok(MessageReceipt {
            provider_id: created.sid,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connector() -> TwilioConnector {
        TwilioConnector::new(
            "AC0123456789abcdef".to_string(),
            SecretString::from("token-not-real"),
            "+15550100".to_string(),
        )
    }

    #[test]
    fn test_platform_and_capabilities() {
        let connector = make_connector();
        assert_eq!(connector.platform(), Platform::Twilio);
        let caps = connector.capabilities();
        assert!(!caps.tags);
        assert!(!caps.records);
        assert!(caps.messaging);
    }

    #[tokio::test]
    async fn test_get_tags_is_empty_not_an_error() {
        let connector = make_connector();
        assert!(connector.get_tags("anyone").await.unwrap().is_empty());
    }

    #[test]
    fn test_messages_url_embeds_account_sid() {
        let connector = make_connector().with_base_url("http://localhost:8080".to_string());
        assert_eq!(
            connector.messages_url(),
            "http://localhost:8080/2010-04-01/Accounts/AC0123456789abcdef/Messages.json"
        );
    }

    #[test]
    fn test_message_response_shape() {
        let json = r#"{"sid":"SM900","status":"queued","to":"+15550101"}"#;
        let parsed: MessageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.sid, "SM900");
    }
}
