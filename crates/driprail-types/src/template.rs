use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::account::AccountId;

/// A reusable message template, unique per (account, name).
///
/// Bodies use `{{key}}` placeholders filled from a trigger payload at send
/// time. Unknown placeholders are left intact so a bad merge is visible in
/// the delivered text rather than silently blanked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub account_id: AccountId,
    /// URL-safe name used as the lookup key ("welcome-sms").
    pub name: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageTemplate {
    /// Substitute `{{key}}` placeholders from `vars`.
    ///
    /// String values are inserted as-is; other JSON values use their compact
    /// JSON form. Keys absent from `vars` keep their placeholder.
    pub fn render(&self, vars: &Map<String, Value>) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let key = after[..end].trim();
                    match vars.get(key) {
                        Some(Value::String(s)) => out.push_str(s),
                        Some(other) => out.push_str(&other.to_string()),
                        None => {
                            out.push_str("{{");
                            out.push_str(&after[..end]);
                            out.push_str("}}");
                        }
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    // Unterminated placeholder; emit literally.
                    out.push_str("{{");
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Upsert body for the template endpoint; name comes from the URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertTemplateRequest {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(body: &str) -> MessageTemplate {
        MessageTemplate {
            id: Uuid::now_v7(),
            account_id: AccountId::new(),
            name: "welcome-sms".to_string(),
            body: body.to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_render_substitutes_strings() {
        let t = template("Hi {{first_name}}, welcome to {{product}}!");
        let rendered = t.render(&vars(json!({"first_name": "Ada", "product": "Driprail"})));
        assert_eq!(rendered, "Hi Ada, welcome to Driprail!");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let t = template("Hi {{first_name}}, your code is {{code}}");
        let rendered = t.render(&vars(json!({"first_name": "Ada"})));
        assert_eq!(rendered, "Hi Ada, your code is {{code}}");
    }

    #[test]
    fn test_render_non_string_values_use_json_form() {
        let t = template("You have {{count}} points");
        let rendered = t.render(&vars(json!({"count": 12})));
        assert_eq!(rendered, "You have 12 points");
    }

    #[test]
    fn test_render_unterminated_placeholder_is_literal() {
        let t = template("Hello {{name");
        let rendered = t.render(&vars(json!({"name": "Ada"})));
        assert_eq!(rendered, "Hello {{name");
    }

    #[test]
    fn test_render_trims_placeholder_whitespace() {
        let t = template("Hi {{ first_name }}");
        let rendered = t.render(&vars(json!({"first_name": "Ada"})));
        assert_eq!(rendered, "Hi Ada");
    }
}
