//! Email notifications for new messages.
//!
//! Sending is fire-and-forget: `Mailer::submit` spawns a task and returns
//! immediately, so a slow or failing SMTP relay never touches the HTTP
//! response. Outcomes are only logged.

use anyhow::Result;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message as Email, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// `relay` is the SMTP host; `user` doubles as the sender address.
    pub fn new(relay: &str, user: &str, password: &str) -> Result<Self> {
        // Parse the sender first: building the transport starts its pool.
        let from: Mailbox = user.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
            .credentials(Credentials::new(user.to_owned(), password.to_owned()))
            .build();
        Ok(Self { transport, from })
    }

    async fn send(&self, n: Notification) -> Result<()> {
        let email = Email::builder()
            .from(self.from.clone())
            .to(n.to.parse()?)
            .subject(n.subject)
            .multipart(MultiPart::alternative_plain_html(n.text, n.html))?;
        self.transport.send(email).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub enum Mailer {
    Smtp(SmtpMailer),
    /// Development mode or mail not configured: notifications are dropped.
    Disabled,
    /// Notifications are handed to a channel instead of sent.
    Channel(mpsc::UnboundedSender<Notification>),
}

impl Mailer {
    pub fn submit(&self, notification: Notification) {
        match self {
            Mailer::Smtp(smtp) => {
                let smtp = smtp.clone();
                tokio::spawn(async move {
                    let to = notification.to.clone();
                    match smtp.send(notification).await {
                        Ok(()) => info!("Notification sent to {}", to),
                        Err(e) => error!("Failed to send notification to {}: {:#}", to, e),
                    }
                });
            }
            Mailer::Disabled => debug!("Mail disabled, dropping notification to {}", notification.to),
            Mailer::Channel(tx) => {
                if tx.send(notification).is_err() {
                    debug!("Notification channel closed");
                }
            }
        }
    }
}

/// Render the "you have a new message" email.
pub fn new_message(to: &str, username: Option<&str>, message: &str, time: &str) -> Notification {
    let inbox = match username {
        Some(name) => format!("@{}", name),
        None => "the inbox".to_string(),
    };
    Notification {
        to: to.to_owned(),
        subject: format!("New anonymous message for {}", inbox),
        text: format!("You received a new anonymous message at {}:\n\n{}\n", time, message),
        html: format!(
            "<p>You received a new anonymous message at {}:</p><blockquote>{}</blockquote>",
            escape_html(time),
            escape_html(message).replace('\n', "<br>"),
        ),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
