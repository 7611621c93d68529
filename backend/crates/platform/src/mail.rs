//! Outgoing Mail
//!
//! [`EmailSender`] is the seam consumers depend on; [`SmtpEmailSender`]
//! delivers through `lettre`'s async SMTP transport.
//!
//! Failures are split in two so callers can decide on retries:
//! [`MailError::Rejected`] (permanent: bad address, mailbox refused) and
//! [`MailError::Transient`] (connection trouble, 4xx replies, timeouts).

use std::fmt;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    /// Permanent failure; retrying cannot help
    #[error("Recipient rejected: {0}")]
    Rejected(String),

    /// Temporary failure; worth retrying
    #[error("Mail transport failure: {0}")]
    Transient(String),
}

impl MailError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MailError::Transient(_))
    }
}

/// A fully rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync + 'static {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

// ============================================================================
// Templates
// ============================================================================

/// Route the emailed link points at, relative to the public base URL
pub const CONFIRM_EMAIL_PATH: &str = "/api/auth/confirm-email";

/// Confirmation link: `{base_url}/api/auth/confirm-email?token=..&email=..`
pub fn confirmation_link(base_url: &str, token: &str, email: &str) -> String {
    format!(
        "{}{}?token={}&email={}",
        base_url.trim_end_matches('/'),
        CONFIRM_EMAIL_PATH,
        urlencoding::encode(token),
        urlencoding::encode(email)
    )
}

pub fn confirmation_email(to: &str, display_name: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        to_name: Some(display_name.to_string()),
        subject: "Confirm your email address".to_string(),
        html_body: format!(
            "<p>Hi {name},</p>\
             <p>Thanks for signing up. Please confirm your email address by clicking the link below:</p>\
             <p><a href=\"{link}\">Confirm email</a></p>\
             <p>If you did not create an account, you can ignore this message.</p>",
            name = html_escape(display_name),
            link = link
        ),
    }
}

pub fn welcome_email(to: &str, display_name: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        to_name: Some(display_name.to_string()),
        subject: "Welcome to LearnLanguage".to_string(),
        html_body: format!(
            "<p>Hi {name},</p><p>Your email is confirmed. Happy learning!</p>",
            name = html_escape(display_name)
        ),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// SMTP
// ============================================================================

/// SMTP configuration
#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// STARTTLS on submission ports; `false` only for local test relays
    pub use_tls: bool,
    pub from_email: String,
    pub from_password: String,
    pub from_name: String,
    /// Public base URL used in links
    pub base_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            use_tls: true,
            from_email: String::new(),
            from_password: String::new(),
            from_name: "LearnLanguage".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl MailConfig {
    /// Local relay (e.g. mailpit) without TLS or auth
    pub fn development() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            use_tls: false,
            from_email: "no-reply@localhost".to_string(),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.smtp_host.is_empty() && !self.from_email.is_empty()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("use_tls", &self.use_tls)
            .field("from_email", &self.from_email)
            .field("from_password", &"[REDACTED]")
            .field("from_name", &self.from_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// `lettre` SMTP sender
pub struct SmtpEmailSender {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl SmtpEmailSender {
    /// Build the transport
    ///
    /// With missing host or sender address the sender is created disabled:
    /// every send logs a warning and succeeds without delivering.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        if !config.is_configured() {
            tracing::warn!("SMTP is not configured; outgoing mail will be skipped");
            return Ok(Self {
                transport: None,
                from: None,
            });
        }

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| MailError::Rejected(format!("invalid sender address: {e}")))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| MailError::Transient(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder.port(config.smtp_port);
        if !config.from_password.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.from_email.clone(),
                config.from_password.clone(),
            ));
        }

        Ok(Self {
            transport: Some(builder.build()),
            from: Some(from),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::warn!(to = %email.to, subject = %email.subject, "SMTP disabled; email not sent");
            return Ok(());
        };

        let to = match &email.to_name {
            Some(name) => format!("{} <{}>", name, email.to),
            None => email.to.clone(),
        }
        .parse::<Mailbox>()
        .map_err(|e| MailError::Rejected(format!("invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|e| MailError::Rejected(e.to_string()))?;

        match transport.send(message).await {
            Ok(_) => {
                tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
                Ok(())
            }
            Err(e) if e.is_permanent() => Err(MailError::Rejected(e.to_string())),
            Err(e) => Err(MailError::Transient(e.to_string())),
        }
    }
}
