//! SheetsConnector -- spreadsheet adapter over the Google Sheets v4 API.
//!
//! Advertises records only: an upsert without an external id appends one
//! row. The platform has no tag concept, so the required `get_tags`
//! capability answers with an empty list.
//!
//! `UpsertRequest.object` addresses the target as
//! `{spreadsheet_id}/{sheet_name}`; field values become cells in key
//! order (serde_json maps iterate sorted), so the sheet's header row
//! should list columns alphabetically by field name.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use driprail_core::connector::Connector;
use driprail_types::connection::Platform;
use driprail_types::connector::{ConnectorCapabilities, Tag, UpsertReceipt, UpsertRequest};
use driprail_types::error::ConnectorError;

use super::transport_error;

/// Spreadsheet connector bound to one account's OAuth access token.
pub struct SheetsConnector {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
}

impl SheetsConnector {
    pub fn new(token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            token,
            base_url: "https://sheets.googleapis.com".to_string(),
        }
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

// No Debug derive; the access token stays out of formatting paths.

/// Split an upsert target into (spreadsheet_id, sheet_name).
fn parse_target(object: &str) -> Result<(&str, &str), ConnectorError> {
    object.split_once('/').ok_or_else(|| {
        ConnectorError::new(
            400,
            format!("sheets target must be 'spreadsheet_id/sheet_name', got '{object}'"),
        )
    })
}

/// Flatten upsert fields into one row of cells, key order.
fn row_values(fields: &serde_json::Map<String, serde_json::Value>) -> Vec<String> {
    fields
        .values()
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

impl Connector for SheetsConnector {
    fn platform(&self) -> Platform {
        Platform::Sheets
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        ConnectorCapabilities {
            tags: false,
            records: true,
            messaging: false,
        }
    }

    async fn get_tags(&self, _contact_id: &str) -> Result<Vec<Tag>, ConnectorError> {
        // Spreadsheets have no tags; the universal capability reports none.
        Ok(Vec::new())
    }

    async fn upsert_record(&self, request: &UpsertRequest) -> Result<UpsertReceipt, ConnectorError> {
        if request.external_id.is_some() {
            return Err(ConnectorError::new(
                400,
                "sheets connector appends rows; keyed upsert is not supported",
            ));
        }

        let (spreadsheet_id, sheet_name) = parse_target(&request.object)?;
        let url = self.url(&format!(
            "/v4/spreadsheets/{spreadsheet_id}/values/{sheet_name}:append?valueInputOption=RAW"
        ));

        let body = AppendBody {
            values: vec![row_values(&request.fields)],
        };

        let response = self
            .client
            .post(&url)
            .header("authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::upstream(status.as_u16(), body));
        }

        let appended: AppendResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::upstream(502, format!("invalid append response: {e}")))?;

        // The updated range is the closest thing a sheet has to a row id.
        Ok(UpsertReceipt {
            record_id: appended.updates.updated_range,
            created: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AppendBody {
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
struct AppendUpdates {
    #[serde(rename = "updatedRange")]
    updated_range: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_connector() -> SheetsConnector {
        SheetsConnector::new(SecretString::from("ya29.test-not-real"))
    }

    #[test]
    fn test_platform_and_capabilities() {
        let connector = make_connector();
        assert_eq!(connector.platform(), Platform::Sheets);
        let caps = connector.capabilities();
        assert!(!caps.tags);
        assert!(caps.records);
        assert!(!caps.messaging);
    }

    #[tokio::test]
    async fn test_get_tags_is_empty_not_an_error() {
        let connector = make_connector();
        assert!(connector.get_tags("anyone").await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_target() {
        let (id, sheet) = parse_target("1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms/Leads").unwrap();
        assert_eq!(id, "1BxiMVs0XRA5nFMdKvBdBZjgmUUqptlbs74OgvE2upms");
        assert_eq!(sheet, "Leads");
    }

    #[test]
    fn test_parse_target_without_slash_is_permanent_error() {
        let err = parse_target("just-a-sheet").unwrap_err();
        assert_eq!(err.status, 400);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_row_values_key_order_and_json_form() {
        let mut fields = serde_json::Map::new();
        fields.insert("email".to_string(), json!("a@b.co"));
        fields.insert("score".to_string(), json!(7));
        fields.insert("active".to_string(), json!(true));

        // serde_json maps iterate in sorted key order.
        assert_eq!(row_values(&fields), vec!["true", "a@b.co", "7"]);
    }

    #[tokio::test]
    async fn test_keyed_upsert_rejected() {
        let connector = make_connector();
        let err = connector
            .upsert_record(&UpsertRequest {
                object: "sid/Leads".to_string(),
                external_id: Some("row-9".to_string()),
                fields: serde_json::Map::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_append_response_shape() {
        let json = r#"{"updates":{"updatedRange":"Leads!A5:C5","updatedRows":1}}"#;
        let parsed: AppendResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.updates.updated_range, "Leads!A5:C5");
    }
}
