use crate::core::{Mailer, Notification};
use crate::utils::error::{EtlError, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpTls {
    /// TLS from the first byte (SMTPS, port 465).
    #[default]
    Implicit,
    StartTls,
    /// Plaintext, only for local relays.
    None,
}

impl FromStr for SmtpTls {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" | "tls" | "smtps" => Ok(SmtpTls::Implicit),
            "starttls" => Ok(SmtpTls::StartTls),
            "none" | "plain" => Ok(SmtpTls::None),
            other => Err(EtlError::InvalidConfigValueError {
                field: "SMTP_TLS".to_string(),
                value: other.to_string(),
                reason: "Expected one of: implicit, starttls, none".to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: String,
    pub password: String,
    pub recipient: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Sends each notification over its own SMTP session; the connection is
/// closed when the transport is dropped at the end of `send`.
pub struct SmtpMailer {
    settings: SmtpSettings,
    from: Mailbox,
    to: Mailbox,
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .parse::<Mailbox>()
        .map_err(|e| EtlError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn email_error(e: impl fmt::Display) -> EtlError {
    EtlError::EmailError {
        message: e.to_string(),
    }
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self> {
        let from = parse_mailbox("GMAIL_USER", &settings.username)?;
        let to = parse_mailbox("RECIPIENT", &settings.recipient)?;
        Ok(Self { settings, from, to })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.settings.host.as_str();
        let builder = match self.settings.tls {
            SmtpTls::Implicit => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(email_error)?
            }
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(email_error)?
            }
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };

        let credentials = Credentials::new(
            self.settings.username.clone(),
            self.settings.password.clone(),
        );
        Ok(builder
            .port(self.settings.port)
            .credentials(credentials)
            .build())
    }

    pub fn message(&self, notification: &Notification) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(email_error)
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = self.message(notification)?;
        let transport = self.transport()?;

        tracing::debug!(
            "Connecting to {}:{} ({:?})",
            self.settings.host,
            self.settings.port,
            self.settings.tls
        );
        let response = transport.send(message).await.map_err(email_error)?;
        tracing::debug!("SMTP server replied {:?}", response.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(port: u16, tls: SmtpTls) -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".to_string(),
            port,
            tls,
            username: "reports@example.com".to_string(),
            password: "app-password".to_string(),
            recipient: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn test_parse_tls_mode() {
        assert_eq!("implicit".parse::<SmtpTls>().unwrap(), SmtpTls::Implicit);
        assert_eq!("STARTTLS".parse::<SmtpTls>().unwrap(), SmtpTls::StartTls);
        assert_eq!("none".parse::<SmtpTls>().unwrap(), SmtpTls::None);
        assert!("ssl3".parse::<SmtpTls>().is_err());
    }

    #[test]
    fn test_rejects_bad_recipient() {
        let mut bad = settings(2525, SmtpTls::None);
        bad.recipient = "not an address".to_string();
        match SmtpMailer::new(bad) {
            Err(EtlError::InvalidConfigValueError { field, .. }) => assert_eq!(field, "RECIPIENT"),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_message_is_plain_text() {
        let mailer = SmtpMailer::new(settings(2525, SmtpTls::None)).unwrap();
        let message = mailer
            .message(&Notification::new("Hemp NASS Data Script Failed", "Request failed"))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("From: reports@example.com"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Subject: Hemp NASS Data Script Failed"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Request failed"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", settings(465, SmtpTls::Implicit));
        assert!(!debug.contains("app-password"));
    }

    #[tokio::test]
    async fn test_send_to_unreachable_server_is_email_error() {
        // Port 1 on loopback refuses connections.
        let mailer = SmtpMailer::new(settings(1, SmtpTls::None)).unwrap();
        let err = mailer
            .send(&Notification::new("subject", "body"))
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::EmailError { .. }));
    }
}
