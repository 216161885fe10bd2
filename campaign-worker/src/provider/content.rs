//! Message templates as exposed by the provider's content API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Content types whose `body` is shown as the template text, in priority order.
const BODY_TYPES: &[&str] = &[
    "twilio/text",
    "twilio/call-to-action",
    "twilio/media",
    "twilio/whatsapp-template",
    "twilio/flows",
    "whatsapp/card",
];

/// Approval category requested for templates created through the API.
const APPROVAL_CATEGORY: &str = "MARKETING";

/// A template as listed to users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub sid: String,
    pub friendly_name: String,
    pub body: String,
}

/// Raw content resource from the provider.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentResource {
    pub sid: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub types: Option<HashMap<String, Value>>,
}

impl ContentResource {
    /// Text body of the first known content type present, or empty.
    pub fn body(&self) -> String {
        let Some(types) = &self.types else {
            return String::new();
        };

        BODY_TYPES
            .iter()
            .find_map(|kind| types.get(*kind))
            .and_then(|entry| entry.get("body"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn into_template(self) -> Template {
        let body = self.body();
        Template {
            sid: self.sid,
            friendly_name: self.friendly_name.unwrap_or_default(),
            body,
        }
    }
}

/// One page of the content list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentPage {
    #[serde(default)]
    pub contents: Vec<ContentResource>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageMeta {
    #[serde(default)]
    pub next_page_url: Option<String>,
}

/// Kind of template that can be created.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateKind {
    Text,
    Media { media_url: String },
}

/// A template to be created and submitted for WhatsApp approval.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub kind: TemplateKind,
    pub body: String,
}

impl NewTemplate {
    /// Request body for the content create call.
    ///
    /// Every template declares variable `1`, which the dispatcher fills with
    /// the recipient's name.
    pub(crate) fn content_payload(&self, language: &str) -> Value {
        let types = match &self.kind {
            TemplateKind::Text => json!({ "twilio/text": { "body": self.body } }),
            TemplateKind::Media { media_url } => json!({
                "twilio/media": { "body": self.body, "media": [media_url] }
            }),
        };

        json!({
            "friendly_name": self.name,
            "language": language,
            "variables": { "1": "Nombre del Cliente" },
            "types": types,
        })
    }

    /// Request body for the WhatsApp approval submission.
    pub(crate) fn approval_payload(&self) -> Value {
        json!({ "name": self.name, "category": APPROVAL_CATEGORY })
    }
}

/// Result of creating a template.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTemplate {
    pub sid: String,
    pub approval_status: String,
}

/// Whether a template should be listed under the configured name prefix.
pub fn matches_prefix(friendly_name: &str, prefix: &str) -> bool {
    friendly_name
        .to_lowercase()
        .starts_with(&prefix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(types: Value) -> ContentResource {
        serde_json::from_value(json!({
            "sid": "HX1",
            "friendly_name": "egresados_bienvenida",
            "types": types,
        }))
        .unwrap()
    }

    #[test]
    fn test_body_prefers_text() {
        let res = resource(json!({
            "twilio/media": { "body": "media body" },
            "twilio/text": { "body": "text body" },
        }));
        assert_eq!(res.body(), "text body");
    }

    #[test]
    fn test_body_falls_back_through_known_types() {
        let res = resource(json!({ "whatsapp/card": { "body": "card body" } }));
        assert_eq!(res.body(), "card body");
    }

    #[test]
    fn test_body_empty_for_unknown_or_missing_types() {
        assert_eq!(resource(json!({ "twilio/location": {} })).body(), "");

        let bare: ContentResource = serde_json::from_value(json!({ "sid": "HX2" })).unwrap();
        assert_eq!(bare.body(), "");
        assert_eq!(bare.into_template().friendly_name, "");
    }

    #[test]
    fn test_media_payload() {
        let template = NewTemplate {
            name: "egresados_evento".to_string(),
            kind: TemplateKind::Media {
                media_url: "https://example.com/flyer.png".to_string(),
            },
            body: "Hola {{1}}".to_string(),
        };

        let payload = template.content_payload("es");
        assert_eq!(payload["language"], "es");
        assert_eq!(payload["variables"]["1"], "Nombre del Cliente");
        assert_eq!(payload["types"]["twilio/media"]["media"][0], "https://example.com/flyer.png");
        assert_eq!(template.approval_payload()["category"], "MARKETING");
    }

    #[test]
    fn test_matches_prefix_case_insensitive() {
        assert!(matches_prefix("Egresados_Bienvenida", "egresados"));
        assert!(!matches_prefix("promo_egresados", "egresados"));
    }
}
