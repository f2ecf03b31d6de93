//! Assignment emails for a task's responsible set.

use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use thiserror::Error;

use crate::{
    data_access::data_context::{DataContext, StoreError},
    settings::{MailSettings, Settings},
    task::Task,
};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("bad address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("building message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("mail worker: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Sends one message to all of its recipients at once. Blocking.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// SMTP relay via lettre.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(host: &str, mail: &MailSettings) -> Result<Self, NotifyError> {
        let mut builder = SmtpTransport::starttls_relay(host)?.port(mail.smtp_port);
        if let (Some(username), Some(password)) = (&mail.smtp_username, &mail.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(email.from.parse::<Mailbox>()?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &email.to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        let message = builder.body(email.body.clone())?;
        self.transport.send(&message)?;
        Ok(())
    }
}

/// Used when no relay is configured: the message only goes to the log.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        tracing::info!(
            from = %email.from,
            to = ?email.to,
            subject = %email.subject,
            body = %email.body,
            "outgoing mail (no smtp relay configured)"
        );
        Ok(())
    }
}

/// Pick the mailer the settings ask for.
pub fn mailer_from_settings(settings: &Settings) -> Result<Arc<dyn Mailer>, NotifyError> {
    match &settings.mail.smtp_host {
        Some(host) => Ok(Arc::new(SmtpMailer::new(host, &settings.mail)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

pub fn assignment_email(
    task: &Task,
    author_name: &str,
    recipients: Vec<String>,
    settings: &Settings,
) -> Email {
    Email {
        from: settings.mail.from.clone(),
        to: recipients,
        subject: settings.mail.subject.clone(),
        body: format!(
            "Hello! {author_name} just assigned a new task for you! Check it out!:{}/task/{}",
            settings.site_url.trim_end_matches('/'),
            task.id
        ),
    }
}

/// Email everyone currently responsible for `task`, as a single message.
/// Returns the number of recipients; an empty set sends nothing.
pub async fn notify_responsible(
    data_context: &DataContext,
    mailer: Arc<dyn Mailer>,
    settings: &Settings,
    task: &Task,
) -> Result<usize, NotifyError> {
    let mut recipients = Vec::with_capacity(task.responsible.len());
    for id in &task.responsible {
        if let Some(user) = data_context.get_user(*id)? {
            recipients.push(user.email);
        }
    }
    if recipients.is_empty() {
        return Ok(0);
    }

    let author_name = match task.author {
        Some(id) => data_context.get_user(id)?.map(|u| u.username),
        None => None,
    }
    .unwrap_or_else(|| "Someone".to_string());

    let count = recipients.len();
    let email = assignment_email(task, &author_name, recipients, settings);
    tokio::task::spawn_blocking(move || mailer.send(&email)).await??;
    Ok(count)
}
