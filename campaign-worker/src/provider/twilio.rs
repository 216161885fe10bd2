//! Twilio REST client for WhatsApp sends, content templates and message history.
//!
//! One shared `reqwest::Client` with the configured timeout; every call uses
//! HTTP basic auth with the account SID and auth token.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::content::{
    matches_prefix, ContentPage, ContentResource, CreatedTemplate, NewTemplate, Template,
};
use super::{MessagingProvider, OutboundMessage, ProviderError};
use crate::config::Config;

const API_VERSION: &str = "2010-04-01";

/// Upper bound on content pages followed when listing templates.
const MAX_CONTENT_PAGES: usize = 20;

/// Twilio API client.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: Client,
    account_sid: String,
    auth_token: String,
    messaging_service_sid: Option<String>,
    from: Option<String>,
    api_base: String,
    content_base: String,
    template_prefix: String,
    template_language: String,
}

/// A sent or scheduled message from the provider's history.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRecord {
    pub to: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// RFC 2822 timestamp, absent for messages not yet sent
    #[serde(default)]
    pub date_sent: Option<String>,
}

impl MessageRecord {
    /// Parsed `date_sent`, if present and well formed.
    pub fn sent_at(&self) -> Option<DateTime<FixedOffset>> {
        self.date_sent
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
    }
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<MessageRecord>,
    #[serde(default)]
    next_page_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApprovalResponse {
    #[serde(default)]
    status: Option<String>,
}

/// Error body returned by the provider on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    more_info: Option<String>,
}

impl TwilioClient {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when the account SID or auth token is not set.
    pub fn from_config(config: &Config) -> Result<Option<Self>, reqwest::Error> {
        let (Some(account_sid), Some(auth_token)) =
            (&config.twilio_account_sid, &config.twilio_auth_token)
        else {
            warn!("twilio_credentials_missing");
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(16)
            .build()?;

        info!(
            has_messaging_service = config.twilio_messaging_service_sid.is_some(),
            has_from = config.whatsapp_from.is_some(),
            timeout_ms = config.request_timeout_ms,
            "twilio_client_created"
        );

        Ok(Some(Self {
            http,
            account_sid: account_sid.clone(),
            auth_token: auth_token.clone(),
            messaging_service_sid: config.twilio_messaging_service_sid.clone(),
            from: config.whatsapp_from.clone(),
            api_base: config.twilio_api_base.trim_end_matches('/').to_string(),
            content_base: config.twilio_content_base.trim_end_matches('/').to_string(),
            template_prefix: config.template_name_prefix.clone(),
            template_language: config.template_language.clone(),
        }))
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{API_VERSION}/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    /// Form fields for one send.
    fn send_form(&self, message: &OutboundMessage) -> Vec<(&'static str, String)> {
        let variables = serde_json::json!({ "1": message.name }).to_string();

        let mut form = vec![
            ("To", whatsapp_address(&message.to)),
            ("ContentSid", message.content_sid.clone()),
            ("ContentVariables", variables),
        ];

        if let Some(service) = &self.messaging_service_sid {
            form.push(("MessagingServiceSid", service.clone()));
        }
        if let Some(from) = &self.from {
            form.push(("From", whatsapp_address(from)));
        }
        if let Some(send_at) = message.send_at {
            form.push(("ScheduleType", "fixed".to_string()));
            form.push(("SendAt", send_at.to_rfc3339()));
        }

        form
    }

    /// List templates whose friendly name starts with the configured prefix.
    pub async fn list_templates(&self) -> Result<Vec<Template>, ProviderError> {
        let mut url = format!("{}/v1/Content?PageSize=500", self.content_base);
        let mut templates = Vec::new();

        for _ in 0..MAX_CONTENT_PAGES {
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .send()
                .await?;
            let page: ContentPage = decode(check(response).await?).await?;

            templates.extend(
                page.contents
                    .into_iter()
                    .filter(|c| {
                        c.friendly_name
                            .as_deref()
                            .is_some_and(|name| matches_prefix(name, &self.template_prefix))
                    })
                    .map(ContentResource::into_template),
            );

            match page.meta.and_then(|m| m.next_page_url) {
                Some(next) => url = next,
                None => break,
            }
        }

        info!(count = templates.len(), prefix = %self.template_prefix, "twilio_templates_listed");
        Ok(templates)
    }

    /// Fetch one template by SID.
    pub async fn fetch_template(&self, sid: &str) -> Result<Template, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v1/Content/{sid}", self.content_base))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        let resource: ContentResource = decode(check(response).await?).await?;
        Ok(resource.into_template())
    }

    /// Create a template and submit it for WhatsApp approval.
    pub async fn create_template(
        &self,
        template: &NewTemplate,
    ) -> Result<CreatedTemplate, ProviderError> {
        let response = self
            .http
            .post(format!("{}/v1/Content", self.content_base))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .json(&template.content_payload(&self.template_language))
            .send()
            .await?;
        let created: ContentResource = decode(check(response).await?).await?;

        info!(sid = %created.sid, name = %template.name, "twilio_template_created");

        let response = self
            .http
            .post(format!(
                "{}/v1/Content/{}/ApprovalRequests/whatsapp",
                self.content_base, created.sid
            ))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .json(&template.approval_payload())
            .send()
            .await?;
        let approval: ApprovalResponse = decode(check(response).await?).await?;

        let approval_status = approval.status.unwrap_or_else(|| "submitted".to_string());
        info!(sid = %created.sid, approval_status = %approval_status, "twilio_template_submitted");

        Ok(CreatedTemplate {
            sid: created.sid,
            approval_status,
        })
    }

    /// Messages sent on or after `since`, following pagination up to `max_pages`.
    pub async fn list_messages(
        &self,
        since: DateTime<Utc>,
        max_pages: usize,
    ) -> Result<Vec<MessageRecord>, ProviderError> {
        let first = self
            .http
            .get(self.messages_url())
            .query(&[
                ("DateSent>", since.format("%Y-%m-%d").to_string()),
                ("PageSize", "1000".to_string()),
            ])
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        let mut page: MessagePage = decode(check(first).await?).await?;
        let mut messages = std::mem::take(&mut page.messages);

        let mut fetched = 1;
        while let Some(next) = page.next_page_uri.take() {
            if fetched >= max_pages {
                warn!(max_pages = max_pages, "twilio_message_history_truncated");
                break;
            }
            let response = self
                .http
                .get(format!("{}{next}", self.api_base))
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .send()
                .await?;
            page = decode(check(response).await?).await?;
            messages.append(&mut page.messages);
            fetched += 1;
        }

        info!(count = messages.len(), pages = fetched, "twilio_message_history_listed");
        Ok(messages)
    }
}

#[async_trait]
impl MessagingProvider for TwilioClient {
    async fn send(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.send_form(message))
            .send()
            .await?;

        let created: CreatedMessage = decode(check(response).await?).await?;
        debug!(to = %message.to, sid = %created.sid, "twilio_message_created");
        Ok(created.sid)
    }
}

/// Prefix a phone number with the WhatsApp channel marker unless present.
pub fn whatsapp_address(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with("whatsapp:") {
        phone.to_string()
    } else {
        format!("whatsapp:{phone}")
    }
}

/// Turn non-2xx responses into [`ProviderError::Api`].
async fn check(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();

    Err(ProviderError::Api {
        status: status.as_u16(),
        code: body.code,
        message: body
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string()),
        more_info: body.more_info,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client(messaging_service: Option<&str>, from: Option<&str>) -> TwilioClient {
        let config = Config {
            twilio_account_sid: Some("AC123".to_string()),
            twilio_auth_token: Some("secret".to_string()),
            twilio_messaging_service_sid: messaging_service.map(str::to_string),
            whatsapp_from: from.map(str::to_string),
            twilio_api_base: "https://api.example.test/".to_string(),
            ..Config::default()
        };
        TwilioClient::from_config(&config).unwrap().unwrap()
    }

    fn field<'a>(form: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_from_config_requires_credentials() {
        assert!(TwilioClient::from_config(&Config::default()).unwrap().is_none());
    }

    #[test]
    fn test_messages_url_trims_base() {
        let twilio = client(None, None);
        assert_eq!(
            twilio.messages_url(),
            "https://api.example.test/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_send_form_immediate() {
        let twilio = client(Some("MG1"), Some("+5215550000"));
        let form = twilio.send_form(&OutboundMessage {
            to: "+5215551111".to_string(),
            content_sid: "HX9".to_string(),
            name: "Ana".to_string(),
            send_at: None,
        });

        assert_eq!(field(&form, "To"), Some("whatsapp:+5215551111"));
        assert_eq!(field(&form, "From"), Some("whatsapp:+5215550000"));
        assert_eq!(field(&form, "ContentSid"), Some("HX9"));
        assert_eq!(field(&form, "ContentVariables"), Some(r#"{"1":"Ana"}"#));
        assert_eq!(field(&form, "MessagingServiceSid"), Some("MG1"));
        assert_eq!(field(&form, "ScheduleType"), None);
        assert_eq!(field(&form, "SendAt"), None);
    }

    #[test]
    fn test_send_form_scheduled() {
        let twilio = client(Some("MG1"), None);
        let send_at = Utc.with_ymd_and_hms(2026, 11, 2, 15, 30, 0).unwrap();
        let form = twilio.send_form(&OutboundMessage {
            to: "whatsapp:+5215551111".to_string(),
            content_sid: "HX9".to_string(),
            name: "Ana".to_string(),
            send_at: Some(send_at),
        });

        assert_eq!(field(&form, "To"), Some("whatsapp:+5215551111"));
        assert_eq!(field(&form, "From"), None);
        assert_eq!(field(&form, "ScheduleType"), Some("fixed"));
        assert_eq!(field(&form, "SendAt"), Some("2026-11-02T15:30:00+00:00"));
    }

    #[test]
    fn test_message_record_sent_at() {
        let record: MessageRecord = serde_json::from_value(serde_json::json!({
            "to": "whatsapp:+5215551111",
            "body": "Hola Ana",
            "status": "delivered",
            "date_sent": "Mon, 02 Nov 2026 15:30:00 +0000",
        }))
        .unwrap();

        let sent = record.sent_at().unwrap();
        assert_eq!(sent.with_timezone(&Utc), Utc.with_ymd_and_hms(2026, 11, 2, 15, 30, 0).unwrap());

        let pending = MessageRecord {
            date_sent: None,
            ..record
        };
        assert!(pending.sent_at().is_none());
    }
}
