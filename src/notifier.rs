use anyhow::Result;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{debug, info};

use crate::alerts::{Alert, DeviceInfo};
use crate::config::SmtpConfig;
use crate::error::{MonitorError, NotifyError};

/// Outbound notification channel.
///
/// Errors are returned to the caller untouched; the monitor does not retry.
pub trait Notifier {
    /// Deliver one message.
    fn send_email(&self, subject: &str, body: &str) -> Result<()>;

    /// Report an error that stopped the monitor.
    fn send_exception(&self, device: &DeviceInfo, error: &anyhow::Error) -> Result<()> {
        self.send_alert(&Alert::script_error(device, error))
    }

    /// Deliver a rendered [`Alert`].
    fn send_alert(&self, alert: &Alert) -> Result<()> {
        self.send_email(&alert.subject, &alert.body)
    }
}

/// Email notifier backed by an authenticated SMTP relay.
///
/// Every message is sent from the login account to a single recipient.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    sender: Mailbox,
    recipient: Mailbox,
}

impl SmtpNotifier {
    /// Create a notifier from SMTP settings.
    ///
    /// Port 465 uses implicit TLS; any other port upgrades with STARTTLS.
    /// No connection is opened until the first message is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The login or recipient is not a valid email address
    /// - The relay host cannot be used to build a TLS configuration
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let sender = parse_mailbox(&config.login)?;
        let recipient = parse_mailbox(&config.recipient)?;

        let builder = (if config.port == 465 {
            SmtpTransport::relay(&config.server)
        } else {
            SmtpTransport::starttls_relay(&config.server)
        })
        .map_err(|e| {
            MonitorError::from(NotifyError::TransportSetup {
                host: config.server.clone(),
                reason: e.to_string(),
            })
        })?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.login.clone(),
                config.password.clone(),
            ))
            .build();

        info!(
            "Email notifications go to {} via {}:{}",
            recipient, config.server, config.port
        );

        Ok(Self {
            transport,
            sender,
            recipient,
        })
    }
}

impl Notifier for SmtpNotifier {
    fn send_email(&self, subject: &str, body: &str) -> Result<()> {
        debug!("Sending email: {}", subject);

        let message = Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| {
                MonitorError::from(NotifyError::MessageBuild {
                    reason: e.to_string(),
                })
            })?;

        self.transport.send(&message).map_err(|e| {
            MonitorError::from(NotifyError::SendFailed {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
        })?;

        info!("Email sent: {}", subject);
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse::<Mailbox>().map_err(|e| {
        MonitorError::from(NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
        .into()
    })
}
