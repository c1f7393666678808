//! HubspotConnector -- CRM adapter over the HubSpot v3 objects API.
//!
//! Advertises tags and records. Authenticates with a private-app bearer
//! token wrapped in [`secrecy::SecretString`]; the token is only exposed
//! while building request headers and never appears in logs or errors.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use driprail_core::connector::Connector;
use driprail_types::connection::Platform;
use driprail_types::connector::{ConnectorCapabilities, Tag, UpsertReceipt, UpsertRequest};
use driprail_types::error::ConnectorError;

use super::transport_error;

/// CRM connector bound to one account's private-app token.
pub struct HubspotConnector {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
}

impl HubspotConnector {
    pub fn new(token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            token,
            base_url: "https://api.hubapi.com".to_string(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

// HubspotConnector intentionally does NOT derive Debug so the bearer token
// can never reach logs through a formatting path.

impl Connector for HubspotConnector {
    fn platform(&self) -> Platform {
        Platform::Hubspot
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities {
            tags: true,
            records: true,
            messaging: false,
        }
    }

    async fn get_tags(&self, contact_id: &str) -> Result<Vec<Tag>, ConnectorError> {
        let url = self.url(&format!("/crm/v3/objects/contacts/{contact_id}/tags"));

        let response = self
            .client
            .get(&url)
            .header("authorization", self.bearer())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), body));
        }

        let list: TagListResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::upstream(502, format!("invalid tag list: {e}")))?;

        Ok(list
            .results
            .into_iter()
            .map(|t| Tag {
                id: t.id,
                name: t.name,
            })
            .collect())
    }

    async fn apply_tag(&self, contact_id: &str, tag_name: &str) -> Result<Tag, ConnectorError> {
        let url = self.url(&format!("/crm/v3/objects/contacts/{contact_id}/tags"));

        let response = self
            .client
            .post(&url)
            .header("authorization", self.bearer())
            .json(&TagBody { name: tag_name })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), body));
        }

        let tag: WireTag = response
            .json()
            .await
            .map_err(|e| ConnectorError::upstream(502, format!("invalid tag: {e}")))?;

        Ok(Tag {
            id: tag.id,
            name: tag.name,
        })
    }

    async fn remove_tag(&self, contact_id: &str, tag_name: &str) -> Result<(), ConnectorError> {
        let url = self.url(&format!(
            "/crm/v3/objects/contacts/{contact_id}/tags/{tag_name}"
        ));

        let response = self
            .client
            .delete(&url)
            .header("authorization", self.bearer())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        // Removing a tag that is not there is a success for our callers.
        if status.as_u16() == 404 {
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), body));
        }

        Ok(())
    }

    async fn upsert_record(&self, request: &UpsertRequest) -> Result<UpsertReceipt, ConnectorError> {
        let object = &request.object;

        let response = match &request.external_id {
            Some(external_id) => {
                // Keyed upsert: PATCH the existing record.
                let url = self.url(&format!("/crm/v3/objects/{object}/{external_id}"));
                self.client
                    .patch(&url)
                    .header("authorization", self.bearer())
                    .json(&PropertiesBody {
                        properties: &request.fields,
                    })
                    .send()
                    .await
                    .map_err(transport_error)?
            }
            None => {
                let url = self.url(&format!("/crm/v3/objects/{object}"));
                self.client
                    .post(&url)
                    .header("authorization", self.bearer())
                    .json(&PropertiesBody {
                        properties: &request.fields,
                    })
                    .send()
                    .await
                    .map_err(transport_error)?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), body));
        }

        let created = status.as_u16() == 201;
        let record: ObjectResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::upstream(502, format!("invalid object: {e}")))?;

        Ok(UpsertReceipt {
            record_id: record.id,
            created,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
//
// HubSpot-specific request/response shapes, NOT the platform-agnostic types
// from driprail-types.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TagBody<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct PropertiesBody<'a> {
    properties: &'a serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireTag {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagListResponse {
    results: Vec<WireTag>,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connector() -> HubspotConnector {
        HubspotConnector::new(SecretString::from("pat-na1-test-not-real"))
    }

    #[test]
    fn test_platform_and_capabilities() {
        let connector = make_connector();
        assert_eq!(connector.platform(), Platform::Hubspot);
        let caps = connector.capabilities();
        assert!(caps.tags);
        assert!(caps.records);
        assert!(!caps.messaging);
    }

    #[test]
    fn test_base_url_override() {
        let connector = make_connector().with_base_url("http://localhost:8080".to_string());
        assert_eq!(
            connector.url("/crm/v3/objects/contacts/42/tags"),
            "http://localhost:8080/crm/v3/objects/contacts/42/tags"
        );
    }

    #[test]
    fn test_bearer_header_carries_token() {
        let connector = make_connector();
        assert_eq!(connector.bearer(), "Bearer pat-na1-test-not-real");
    }

    #[test]
    fn test_tag_list_response_shape() {
        let json = r#"{"results":[{"id":"101","name":"vip"},{"id":"102","name":"beta"}]}"#;
        let list: TagListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.results.len(), 2);
        assert_eq!(list.results[0].name, "vip");
    }

    #[test]
    fn test_properties_body_serializes_fields() {
        let mut fields = serde_json::Map::new();
        fields.insert("email".to_string(), serde_json::json!("a@b.co"));
        fields.insert("points".to_string(), serde_json::json!(12));

        let body = serde_json::to_value(PropertiesBody {
            properties: &fields,
        })
        .unwrap();
        assert_eq!(body["properties"]["email"], "a@b.co");
        assert_eq!(body["properties"]["points"], 12);
    }
}
