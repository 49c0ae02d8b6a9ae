use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use super::MessagingError;
use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub content: String,
    /// Shown in the header block of the HTML body
    pub recipient_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SentReceipt {
    pub message_id: String,
    pub response: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<SentReceipt, MessagingError>;
}

pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    from_name: String,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Self {
        let from_name = config.from_name.clone();
        let from = config
            .from_email
            .as_deref()
            .or(config.user.as_deref())
            .and_then(|address| match address.parse() {
                Ok(address) => Some(Mailbox::new(Some(from_name.clone()), address)),
                Err(e) => {
                    tracing::warn!("Ignoring invalid SMTP sender address {}: {}", address, e);
                    None
                }
            });

        let transport = config.host.as_deref().and_then(|host| {
            let builder = if config.port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            };
            match builder {
                Ok(builder) => {
                    let builder = builder.port(config.port);
                    let builder = match (&config.user, &config.pass) {
                        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
                        _ => builder,
                    };
                    Some(builder.build())
                }
                Err(e) => {
                    tracing::error!("Invalid SMTP relay {}: {}", host, e);
                    None
                }
            }
        });

        Self {
            transport,
            from,
            from_name,
        }
    }

    fn message_id(&self) -> String {
        let domain = self
            .from
            .as_ref()
            .map(|mailbox| mailbox.email.domain().to_string())
            .unwrap_or_else(|| "happy-crm.local".to_string());
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<SentReceipt, MessagingError> {
        let transport = self.transport.as_ref().ok_or(MessagingError::NotConfigured("SMTP"))?;
        let from = self.from.clone().ok_or(MessagingError::NotConfigured("SMTP_FROM_EMAIL"))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| MessagingError::InvalidRecipient(email.to.clone()))?;

        let message_id = self.message_id();
        let html = render_html(
            &email.subject,
            &self.from_name,
            email.recipient_name.as_deref(),
            &email.content,
        );
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(email.content.clone(), html))
            .map_err(|e| MessagingError::Smtp(e.to_string()))?;

        let response = transport
            .send(message)
            .await
            .map_err(|e| MessagingError::Smtp(e.to_string()))?;
        let response = format!("{} {}", response.code(), response.message().collect::<Vec<_>>().join(" "));

        tracing::info!(message_id = %message_id, "Email accepted by SMTP relay");
        Ok(SentReceipt { message_id, response })
    }
}

/// Loose address shape check used before the lead lookup
pub fn looks_like_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !address.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_html(subject: &str, from_name: &str, recipient: Option<&str>, content: &str) -> String {
    let body = html_escape(content).replace('\n', "<br>");
    let recipient = recipient
        .map(|name| format!(" | Alıcı: {}", html_escape(name)))
        .unwrap_or_default();
    format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="background-color: #f8f9fa; padding: 20px; border-radius: 8px; margin-bottom: 20px;">
    <h2 style="color: #2563eb; margin: 0 0 10px 0;">{subject}</h2>
    <p style="margin: 0; color: #6b7280;">Gönderen: {from}{recipient}</p>
  </div>
  <div style="white-space: pre-wrap; margin-bottom: 30px;">{body}</div>
  <div style="border-top: 1px solid #e5e7eb; padding-top: 20px; font-size: 12px; color: #6b7280;">
    <p>Bu email Happy CRM sistemi üzerinden gönderilmiştir.</p>
    <p>Tarih: {date}</p>
  </div>
</div>"#,
        subject = html_escape(subject),
        from = html_escape(from_name),
        recipient = recipient,
        body = body,
        date = Utc::now().format("%d.%m.%Y %H:%M"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("ayse@example.com"));
        assert!(!looks_like_email("ayse@example"));
        assert!(!looks_like_email("ayse example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("a b@example.com"));
    }

    #[test]
    fn html_body_escapes_and_breaks_lines() {
        let html = render_html("Hi <there>", "Happy CRM", Some("Ayşe"), "line one\n<b>two</b>");
        assert!(html.contains("Hi &lt;there&gt;"));
        assert!(html.contains("line one<br>&lt;b&gt;two&lt;/b&gt;"));
        assert!(html.contains("Alıcı: Ayşe"));
    }

    #[tokio::test]
    async fn unconfigured_mailer_refuses_to_send() {
        let mailer = SmtpMailer::from_config(&SmtpConfig::default());
        let err = mailer
            .send(OutgoingEmail {
                to: "ayse@example.com".to_string(),
                subject: "Hello".to_string(),
                content: "Body".to_string(),
                recipient_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::NotConfigured("SMTP")));
    }
}
