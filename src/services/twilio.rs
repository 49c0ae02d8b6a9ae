//! Twilio REST client: programmable messaging, Studio flow executions and
//! Content templates, plus the TwiML replies our voice webhooks return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::phone::Channel;
use super::MessagingError;
use crate::config::TwilioConfig;

/// A message to hand to Twilio; `to` is already E.164 without channel scheme
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub to: String,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub content_sid: Option<String>,
    /// Positional template variables keyed "1", "2", ...
    pub content_variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub sid: String,
    pub status: String,
}

/// Parameters of the deadline call flow for one transfer
#[derive(Debug, Clone, Serialize)]
pub struct FlowExecution {
    pub to: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentTemplate {
    pub sid: String,
    pub friendly_name: String,
    pub language: String,
    pub variables: Vec<String>,
    pub types: Value,
    pub status: &'static str,
}

#[async_trait]
pub trait Telephony: Send + Sync {
    async fn send_message(&self, channel: Channel, message: OutboundMessage) -> Result<SentMessage, MessagingError>;

    /// Start the deadline call flow; returns the execution SID
    async fn start_deadline_flow(&self, execution: FlowExecution) -> Result<String, MessagingError>;

    async fn list_templates(&self) -> Result<Vec<ContentTemplate>, MessagingError>;

    /// Create a plain-text content template; returns its SID
    async fn create_text_template(&self, name: &str, body: &str, language: &str) -> Result<String, MessagingError>;
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SidBody {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ContentList {
    #[serde(default)]
    contents: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    sid: String,
    friendly_name: Option<String>,
    language: Option<String>,
    #[serde(default)]
    variables: Value,
    #[serde(default)]
    types: Value,
    #[serde(default)]
    approval_requests: Value,
}

pub struct TwilioClient {
    http: reqwest::Client,
    config: TwilioConfig,
    status_callback: Option<String>,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig, public_app_url: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            config,
            status_callback: public_app_url.map(|base| format!("{}/api/twilio/webhook", base)),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), MessagingError> {
        match (self.config.account_sid.as_deref(), self.config.auth_token.as_deref()) {
            (Some(sid), Some(token)) if !sid.is_empty() && !token.is_empty() => Ok((sid, token)),
            _ => Err(MessagingError::NotConfigured("Twilio credentials")),
        }
    }

    fn sender_for(&self, channel: Channel) -> Result<String, MessagingError> {
        match channel {
            Channel::Sms => self
                .config
                .phone_number
                .clone()
                .ok_or(MessagingError::NotConfigured("TWILIO_PHONE_NUMBER")),
            Channel::WhatsApp => self
                .config
                .whatsapp_number
                .as_deref()
                .map(|n| format!("whatsapp:{}", n.trim_start_matches("whatsapp:")))
                .ok_or(MessagingError::NotConfigured("TWILIO_WHATSAPP_NUMBER")),
        }
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, MessagingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let body: Option<TwilioErrorBody> = serde_json::from_str(&text).ok();
        Err(MessagingError::Provider {
            code: body.as_ref().and_then(|b| b.code),
            message: body
                .and_then(|b| b.message)
                .unwrap_or_else(|| format!("Twilio returned HTTP {}", status)),
        })
    }
}

#[async_trait]
impl Telephony for TwilioClient {
    async fn send_message(&self, channel: Channel, message: OutboundMessage) -> Result<SentMessage, MessagingError> {
        let (sid, token) = self.credentials()?;
        if message.to.trim().is_empty() {
            return Err(MessagingError::InvalidRecipient("empty phone number".to_string()));
        }

        let to = match channel {
            Channel::Sms => message.to.clone(),
            Channel::WhatsApp => format!("whatsapp:{}", message.to.trim_start_matches("whatsapp:")),
        };

        let mut form: Vec<(&str, String)> = vec![("To", to), ("From", self.sender_for(channel)?)];
        if let Some(body) = message.body.filter(|b| !b.is_empty()) {
            form.push(("Body", body));
        }
        if let Some(media_url) = message.media_url {
            form.push(("MediaUrl", media_url));
        }
        if let Some(content_sid) = message.content_sid {
            form.push(("ContentSid", content_sid));
        }
        if let Some(variables) = message.content_variables {
            form.push(("ContentVariables", json!(variables).to_string()));
        }
        if let Some(callback) = &self.status_callback {
            form.push(("StatusCallback", callback.clone()));
        }

        let url = format!("{}/Accounts/{}/Messages.json", self.config.api_base, sid);
        let response = self
            .http
            .post(url)
            .basic_auth(sid, Some(token))
            .form(&form)
            .send()
            .await?;

        let sent: SentMessage = Self::parse(response).await?;
        tracing::info!(sid = %sent.sid, channel = channel.as_str(), "Twilio message accepted");
        Ok(sent)
    }

    async fn start_deadline_flow(&self, execution: FlowExecution) -> Result<String, MessagingError> {
        let (sid, token) = self.credentials()?;
        let flow_sid = self
            .config
            .deadline_flow_sid
            .as_deref()
            .ok_or(MessagingError::NotConfigured("TWILIO_DEADLINE_FLOW_SID"))?;
        let from = self.sender_for(Channel::Sms)?;

        let url = format!("{}/Flows/{}/Executions", self.config.studio_base, flow_sid);
        let form = [
            ("To", execution.to.clone()),
            ("From", from),
            ("Parameters", execution.parameters.to_string()),
        ];
        let response = self
            .http
            .post(url)
            .basic_auth(sid, Some(token))
            .form(&form)
            .send()
            .await?;

        let created: SidBody = Self::parse(response).await?;
        Ok(created.sid)
    }

    async fn list_templates(&self) -> Result<Vec<ContentTemplate>, MessagingError> {
        let (sid, token) = self.credentials()?;
        let url = format!("{}/Content", self.config.content_base);
        let response = self
            .http
            .get(url)
            .basic_auth(sid, Some(token))
            .query(&[("PageSize", "100")])
            .send()
            .await?;

        let list: ContentList = Self::parse(response).await?;
        Ok(list.contents.into_iter().map(ContentTemplate::from).collect())
    }

    async fn create_text_template(&self, name: &str, body: &str, language: &str) -> Result<String, MessagingError> {
        let (sid, token) = self.credentials()?;
        let url = format!("{}/Content", self.config.content_base);
        let payload = json!({
            "friendly_name": name,
            "language": language,
            "types": { "twilio/text": { "body": body } },
        });
        let response = self
            .http
            .post(url)
            .basic_auth(sid, Some(token))
            .json(&payload)
            .send()
            .await?;

        let created: SidBody = Self::parse(response).await?;
        Ok(created.sid)
    }
}

impl From<ContentItem> for ContentTemplate {
    fn from(item: ContentItem) -> Self {
        let variables = item
            .variables
            .as_object()
            .map(|vars| vars.keys().cloned().collect())
            .unwrap_or_default();
        let approved = !(item.approval_requests.is_null()
            || item.approval_requests.as_object().is_some_and(|o| o.is_empty()));
        Self {
            sid: item.sid,
            friendly_name: item.friendly_name.unwrap_or_default(),
            language: item.language.unwrap_or_default(),
            variables,
            types: item.types,
            status: if approved { "approved" } else { "pending" },
        }
    }
}

/// Map Twilio's delivery states onto the ones stored on `messages`
pub fn map_twilio_status(status: &str) -> String {
    match status {
        "undelivered" => "failed".to_string(),
        other => other.to_string(),
    }
}

/// Template variables arrive keyed by name; Twilio wants them positional
pub fn positional_variables(variables: &serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    variables
        .values()
        .enumerate()
        .map(|(i, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            ((i + 1).to_string(), text)
        })
        .collect()
}

/// Minimal TwiML document with a single spoken sentence
pub fn twiml_say(sentence: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say voice="alice" language="tr-TR">{}</Say></Response>"#,
        xml_escape(sentence)
    )
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undelivered_maps_to_failed() {
        assert_eq!(map_twilio_status("undelivered"), "failed");
        assert_eq!(map_twilio_status("delivered"), "delivered");
        assert_eq!(map_twilio_status("read"), "read");
        assert_eq!(map_twilio_status("something_new"), "something_new");
    }

    #[test]
    fn twiml_escapes_patient_names() {
        let xml = twiml_say("Tom & <Jerry>");
        assert!(xml.contains("<Response><Say"));
        assert!(xml.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(xml.ends_with("</Say></Response>"));
    }

    #[test]
    fn variables_become_positional() {
        let mut vars = serde_json::Map::new();
        vars.insert("name".to_string(), json!("Ayşe"));
        vars.insert("time".to_string(), json!(14));
        let positional = positional_variables(&vars);
        assert_eq!(positional.len(), 2);
        assert!(positional.contains_key("1"));
        assert!(positional.contains_key("2"));
        assert!(positional.values().any(|v| v == "14"));
    }

    #[test]
    fn content_items_report_approval() {
        let item: ContentItem = serde_json::from_value(json!({
            "sid": "HX1",
            "friendly_name": "welcome",
            "language": "tr",
            "variables": { "1": "name" },
            "types": { "twilio/text": { "body": "Hi {{1}}" } },
            "approval_requests": null
        }))
        .unwrap();
        let template = ContentTemplate::from(item);
        assert_eq!(template.status, "pending");
        assert_eq!(template.variables, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn missing_credentials_are_reported() {
        let client = TwilioClient::new(TwilioConfig::default(), None);
        let err = client
            .send_message(
                Channel::Sms,
                OutboundMessage {
                    to: "+905551234567".to_string(),
                    body: Some("hi".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::NotConfigured(_)));
    }
}
