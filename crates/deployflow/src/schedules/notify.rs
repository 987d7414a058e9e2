//! Deployment notification emails.
//!
//! `Notifier` renders a schedule into an HTML mail and hands it to a
//! [`Mailer`]. Delivery is all-or-nothing: one transport call per
//! notification, no retries.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::MailConfig;
use crate::schedules::model::{Schedule, ScheduleStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mail transport is not configured (SMTP_HOST unset)")]
    NotConfigured,
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },
    #[error("build email: {0}")]
    Build(String),
    #[error("smtp: {0}")]
    Smtp(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("schedule has no developers to notify")]
    NoRecipients,
    #[error("failed to send deployment notification: {0}")]
    Transport(#[from] TransportError),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, mail: OutgoingMail) -> Result<(), TransportError>;
}

/// Stand-in used when no SMTP host is configured. Every send fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send_mail(&self, _mail: OutgoingMail) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured)
    }
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> Result<Self, TransportError> {
        let host = cfg
            .smtp_host
            .as_deref()
            .ok_or(TransportError::NotConfigured)?;

        // 465 is implicit TLS, everything else negotiates STARTTLS
        let relay = if cfg.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        };
        let builder = relay
            .map_err(|e| TransportError::Smtp(format!("SMTP relay: {e}")))?
            .port(cfg.smtp_port);

        let builder = match (&cfg.username, &cfg.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(&self, mail: OutgoingMail) -> Result<(), TransportError> {
        let from: Mailbox = parse_mailbox(&mail.from)?;

        let mut builder = Message::builder()
            .from(from)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_HTML);
        for to in &mail.to {
            builder = builder.to(parse_mailbox(to)?);
        }

        let email = builder
            .body(mail.html_body)
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        tracing::debug!(recipients = mail.to.len(), "smtp send ok");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address.parse().map_err(|e: lettre::address::AddressError| TransportError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Picks the transport for the given config: SMTP when a host is set.
pub fn build_mailer(cfg: &MailConfig) -> Result<Arc<dyn Mailer>, TransportError> {
    if cfg.smtp_host.is_none() {
        tracing::warn!("SMTP_HOST not set; deployment notifications will fail");
        return Ok(Arc::new(UnconfiguredMailer));
    }
    Ok(Arc::new(SmtpMailer::new(cfg)?))
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    override_recipients: Vec<String>,
    recipient_domain: Option<String>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            override_recipients: Vec::new(),
            recipient_domain: None,
        }
    }

    pub fn from_config(mailer: Arc<dyn Mailer>, cfg: &MailConfig) -> Self {
        Self {
            mailer,
            from: format!("{} <{}>", cfg.from_name, cfg.from_address),
            override_recipients: cfg.override_recipients.clone(),
            recipient_domain: cfg.recipient_domain.clone(),
        }
    }

    /// Send every mail to these addresses instead of the developers.
    pub fn with_override_recipients(mut self, to: Vec<String>) -> Self {
        self.override_recipients = to;
        self
    }

    pub fn with_recipient_domain(mut self, domain: impl Into<String>) -> Self {
        self.recipient_domain = Some(domain.into());
        self
    }

    /// Sends one mail describing `schedule` at `target` to its developers.
    /// Returns the developer list that was notified.
    pub async fn notify(
        &self,
        schedule: &Schedule,
        target: ScheduleStatus,
    ) -> Result<Vec<String>, NotificationError> {
        if schedule.developers.is_empty() {
            return Err(NotificationError::NoRecipients);
        }

        let mail = OutgoingMail {
            from: self.from.clone(),
            to: self.resolve_addresses(&schedule.developers),
            subject: render_subject(schedule, target),
            html_body: render_html(schedule, target),
        };

        self.mailer.send_mail(mail).await?;
        Ok(schedule.developers.clone())
    }

    pub fn resolve_addresses(&self, developers: &[String]) -> Vec<String> {
        if !self.override_recipients.is_empty() {
            return self.override_recipients.clone();
        }

        developers
            .iter()
            .map(|dev| resolve_address(dev, self.recipient_domain.as_deref()))
            .collect()
    }
}

fn resolve_address(developer: &str, domain: Option<&str>) -> String {
    if developer.contains('@') {
        return developer.to_string();
    }
    match (domain, developer.split_whitespace().next()) {
        (Some(domain), Some(first)) => format!("{}@{}", first.to_lowercase(), domain),
        _ => developer.to_string(),
    }
}

pub fn format_deployment_date(schedule: &Schedule) -> String {
    schedule
        .deployment_date
        .format("%A, %B %-d, %Y at %I:%M %p UTC")
        .to_string()
}

fn headline(status: ScheduleStatus) -> (&'static str, &'static str) {
    match status {
        ScheduleStatus::Scheduled => ("[Action Required]", "Deployment Scheduled"),
        ScheduleStatus::InProgress => ("[In Progress]", "Deployment Started"),
        ScheduleStatus::Completed => ("[Completed]", "Deployment Completed"),
        ScheduleStatus::Failed => ("[Failed]", "Deployment Failed"),
    }
}

fn status_color(status: ScheduleStatus) -> &'static str {
    match status {
        ScheduleStatus::Scheduled => "#1976d2",
        ScheduleStatus::InProgress => "#f57c00",
        ScheduleStatus::Completed => "#388e3c",
        ScheduleStatus::Failed => "#d32f2f",
    }
}

pub fn render_subject(schedule: &Schedule, target: ScheduleStatus) -> String {
    let (tag, title) = headline(target);
    format!(
        "{tag} {title}: {} on {}",
        schedule.app_name,
        format_deployment_date(schedule)
    )
}

pub fn render_html(schedule: &Schedule, target: ScheduleStatus) -> String {
    let (_, title) = headline(target);
    let color = status_color(target);

    let mut details = format!(
        concat!(
            "<p style=\"margin: 0;\"><strong>Application:</strong> {}</p>\n",
            "<p style=\"margin: 0;\"><strong>Scheduled Date:</strong> {}</p>\n",
            "<p style=\"margin: 0;\"><strong>Time Slot:</strong> {}</p>\n",
            "<p style=\"margin: 0;\"><strong>Status:</strong> ",
            "<span style=\"color: {};\">{}</span></p>\n"
        ),
        escape(&schedule.app_name),
        format_deployment_date(schedule),
        escape(&schedule.time_slot),
        color,
        target.label(),
    );

    if target == ScheduleStatus::Failed {
        if let Some(reason) = schedule.failure_reason.as_deref() {
            details.push_str(&format!(
                "<p style=\"margin: 0;\"><strong>Failure Reason:</strong> {}</p>\n",
                escape(reason)
            ));
        }
    }

    let developers: String = schedule
        .developers
        .iter()
        .map(|d| format!("<li>{}</li>", escape(d)))
        .collect();

    let notes = schedule
        .notes
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| {
            format!(
                concat!(
                    "<div style=\"margin-bottom: 15px;\">\n",
                    "<h3 style=\"margin: 0 0 5px 0; color: #333;\">Additional Notes</h3>\n",
                    "<p style=\"margin: 0; background-color: #f5f5f5; padding: 10px; border-radius: 4px;\">{}</p>\n",
                    "</div>\n"
                ),
                escape(n)
            )
        })
        .unwrap_or_default();

    format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; border: 1px solid #e0e0e0; border-radius: 8px; overflow: hidden;\">\n",
            "<div style=\"background-color: {color}; color: white; padding: 20px; text-align: center;\">\n",
            "<h1 style=\"margin: 0;\">{title}</h1>\n",
            "</div>\n",
            "<div style=\"padding: 20px;\">\n",
            "<div style=\"margin-bottom: 15px;\">\n",
            "<h3 style=\"margin: 0 0 5px 0; color: #333;\">Application Details</h3>\n",
            "{details}",
            "</div>\n",
            "<div style=\"margin-bottom: 15px;\">\n",
            "<h3 style=\"margin: 0 0 5px 0; color: #333;\">Assigned Developers</h3>\n",
            "<ul style=\"margin: 0; padding-left: 20px;\">{developers}</ul>\n",
            "</div>\n",
            "{notes}",
            "<p style=\"color: #666; font-size: 0.9em;\">This is an automated notification. Please do not reply to this email.</p>\n",
            "</div>\n",
            "<div style=\"background-color: #f5f5f5; padding: 10px; text-align: center; font-size: 0.8em; color: #666;\">Deployment Management System</div>\n",
            "</div>\n"
        ),
        color = color,
        title = title,
        details = details,
        developers = developers,
        notes = notes,
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
