//! Report delivery by email
//!
//! `OutboxMailer` writes RFC 5322 `.eml` files to a directory instead of
//! sending anything. `SmtpMailer` relays through a configured server. Neither
//! retries.

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{MailConfig, MailTransportConfig};
use crate::error::{WebServerError, WebServerResult};
use crate::traits::ReportMailer;
use crate::types::{DeliveryReceipt, OutgoingReport};
use shared::{ProcessId, process_info, process_warn, validate_email};

fn parse_sender(from: &str) -> WebServerResult<Mailbox> {
    from.parse::<Mailbox>()
        .map_err(|e| WebServerError::config(format!("Invalid sender address {from}: {e}")))
}

fn parse_recipient(to: &str) -> WebServerResult<Mailbox> {
    let address = validate_email(to).map_err(|_| WebServerError::invalid(format!("Invalid recipient address: {to}")))?;
    address
        .parse::<Mailbox>()
        .map_err(|_| WebServerError::invalid(format!("Invalid recipient address: {to}")))
}

/// Plain-text body with the PDF attached
fn build_message(from: &Mailbox, report: &OutgoingReport) -> WebServerResult<Message> {
    let to = parse_recipient(&report.recipient)?;
    let pdf_type = ContentType::parse("application/pdf")
        .map_err(|e| WebServerError::internal(format!("PDF content type: {e}")))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(report.subject.clone())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(report.body.clone()))
                .singlepart(Attachment::new(report.attachment_name.clone()).body(report.pdf.clone(), pdf_type)),
        )
        .map_err(|e| WebServerError::MailDelivery(format!("Cannot build message: {e}")))
}

/// Simulated delivery into an outbox directory
pub struct OutboxMailer {
    from: Mailbox,
    dir: PathBuf,
    transport: AsyncFileTransport<Tokio1Executor>,
}

impl OutboxMailer {
    pub fn new(from: &str, dir: impl AsRef<Path>) -> WebServerResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        Ok(Self {
            from: parse_sender(from)?,
            transport: AsyncFileTransport::<Tokio1Executor>::new(&dir),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ReportMailer for OutboxMailer {
    async fn send_report(&self, report: OutgoingReport) -> WebServerResult<DeliveryReceipt> {
        let message = build_message(&self.from, &report)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| WebServerError::MailDelivery(format!("Outbox {} unavailable: {}", self.dir.display(), e)))?;

        let id = self.transport.send(message).await.map_err(|e| {
            process_warn!(ProcessId::current(), "📭 Outbox write failed: {}", e);
            WebServerError::MailDelivery(e.to_string())
        })?;

        let file_name = format!("{id}.eml");
        process_info!(
            ProcessId::current(),
            "📬 Report for {} written to outbox as {}",
            report.recipient,
            file_name
        );
        Ok(DeliveryReceipt {
            recipient: report.recipient,
            transport: self.transport_name().to_string(),
            reference: file_name,
            delivered_at: Utc::now(),
        })
    }

    fn transport_name(&self) -> &'static str {
        "outbox"
    }
}

/// Port on which SMTP servers expect TLS from the first byte
pub const SMTPS_PORT: u16 = 465;

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    Plain,
    /// Plaintext greeting upgraded with STARTTLS (submission, port 587)
    StartTls,
    /// Implicit TLS (SMTPS, port 465)
    Wrapper,
}

impl SmtpSecurity {
    pub fn for_connection(port: u16, tls: bool) -> Self {
        match (tls, port) {
            (false, _) => SmtpSecurity::Plain,
            (true, SMTPS_PORT) => SmtpSecurity::Wrapper,
            (true, _) => SmtpSecurity::StartTls,
        }
    }
}

/// Delivery through an SMTP relay
pub struct SmtpMailer {
    from: Mailbox,
    security: SmtpSecurity,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(
        from: &str,
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        tls: bool,
    ) -> WebServerResult<Self> {
        let security = SmtpSecurity::for_connection(port, tls);
        let relay_error =
            |e: lettre::transport::smtp::Error| WebServerError::config(format!("SMTP relay {host}: {e}"));
        let mut builder = match security {
            SmtpSecurity::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(relay_error)?
            }
            SmtpSecurity::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(relay_error)?,
        };
        builder = builder.port(port);
        if let Some(username) = username {
            builder = builder.credentials(Credentials::new(username, password.unwrap_or_default()));
        }

        Ok(Self {
            from: parse_sender(from)?,
            security,
            transport: builder.build(),
        })
    }

    pub fn security(&self) -> SmtpSecurity {
        self.security
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send_report(&self, report: OutgoingReport) -> WebServerResult<DeliveryReceipt> {
        let message = build_message(&self.from, &report)?;

        let response = self.transport.send(message).await.map_err(|e| {
            process_warn!(ProcessId::current(), "📭 SMTP delivery to {} failed: {}", report.recipient, e);
            WebServerError::MailDelivery(e.to_string())
        })?;

        process_info!(ProcessId::current(), "📧 Report sent to {} via SMTP", report.recipient);
        Ok(DeliveryReceipt {
            recipient: report.recipient,
            transport: self.transport_name().to_string(),
            reference: response.code().to_string(),
            delivered_at: Utc::now(),
        })
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}

/// Pick the transport named in configuration
pub fn mailer_from_config(config: &MailConfig) -> WebServerResult<Arc<dyn ReportMailer>> {
    match &config.transport {
        MailTransportConfig::Outbox { dir } => Ok(Arc::new(OutboxMailer::new(&config.from, dir)?)),
        MailTransportConfig::Smtp {
            host,
            port,
            username,
            password,
            tls,
        } => Ok(Arc::new(SmtpMailer::new(
            &config.from,
            host,
            *port,
            username.clone(),
            password.clone(),
            *tls,
        )?)),
    }
}
