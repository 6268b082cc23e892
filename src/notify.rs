//! Delivery of verification emails.

use std::sync::{Arc, Mutex, MutexGuard};

use aws_sdk_sesv2::{
    error::{BuildError, DisplayErrorContext},
    types::{Body, Content, Destination, EmailContent, Message},
    Client as SesClient,
};
use log::debug;
use thiserror::Error;

use crate::model::common::email::Email;

pub const VERIFICATION_SUBJECT: &str = "Confirm Your Vote";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to build email: {0}")]
    Build(#[from] BuildError),
    #[error("Failed to send email: {0}")]
    Send(String),
}

/// Sends the emails that let voters confirm their ballots.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_email(&self, to: &Email, url: &str) -> Result<(), NotifyError>;
}

/// The notifier as held in Rocket's managed state.
pub type DynNotifier = Arc<dyn Notifier>;

/// Sends email through Amazon SES.
pub struct SesNotifier {
    client: SesClient,
    from: String,
}

impl SesNotifier {
    /// `from` is the sender mailbox, e.g. `FansAward <noreply@example.com>`.
    pub fn new(client: SesClient, from: String) -> Self {
        Self { client, from }
    }
}

#[rocket::async_trait]
impl Notifier for SesNotifier {
    async fn send_verification_email(&self, to: &Email, url: &str) -> Result<(), NotifyError> {
        let message = verification_message(url)?;

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to.as_str()).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|err| NotifyError::Send(DisplayErrorContext(&err).to_string()))?;

        debug!("Sent verification email to {to}");
        Ok(())
    }
}

const CHARSET: &str = "UTF-8";

/// The HTML part of the verification email.
pub fn verification_html(url: &str) -> String {
    format!(
        "<html>\r\n\
         <body>\r\n\
         <h2>Confirm Your Ballon D'or Vote</h2>\r\n\
         <p>Thanks for voting! Click the button below to verify:</p>\r\n\
         <a href=\"{url}\" style=\"background-color: #4CAF50; color: white; padding: 10px 20px; text-decoration: none;\">Verify Vote</a>\r\n\
         <p>If the button doesn't work, copy this link: {url}</p>\r\n\
         </body>\r\n\
         </html>\r\n"
    )
}

fn utf8(data: String) -> Result<Content, BuildError> {
    Content::builder().data(data).charset(CHARSET).build()
}

/// The verification email, with plain text and HTML alternatives.
fn verification_message(url: &str) -> Result<Message, BuildError> {
    let body = Body::builder()
        .text(utf8(format!(
            "Thanks for voting! Open this link to verify your vote: {url}"
        ))?)
        .html(utf8(verification_html(url))?)
        .build();
    Ok(Message::builder()
        .subject(utf8(VERIFICATION_SUBJECT.to_string())?)
        .body(body)
        .build())
}

/// An email captured by an [`Outbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: Email,
    pub url: String,
}

/// A notifier that keeps emails in memory instead of sending them.
/// It can be told to fail, to simulate an unreachable mail service.
#[derive(Debug, Default)]
pub struct Outbox {
    sent: Mutex<Vec<SentEmail>>,
    failing: Mutex<bool>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send succeed or fail.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        lock(&self.sent).clone()
    }

    /// The most recent email sent to the given address.
    pub fn last_to(&self, to: &Email) -> Option<SentEmail> {
        lock(&self.sent)
            .iter()
            .rev()
            .find(|sent| &sent.to == to)
            .cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[rocket::async_trait]
impl Notifier for Outbox {
    async fn send_verification_email(&self, to: &Email, url: &str) -> Result<(), NotifyError> {
        if *lock(&self.failing) {
            return Err(NotifyError::Send("outbox is failing".to_string()));
        }
        lock(&self.sent).push(SentEmail {
            to: to.clone(),
            url: url.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_contains_link() {
        let url = "https://fansaward.example/verify/abc";
        let message = verification_message(url).unwrap();

        let subject = message.subject().unwrap();
        assert_eq!(subject.data(), VERIFICATION_SUBJECT);
        assert_eq!(subject.charset(), Some(CHARSET));

        let body = message.body().unwrap();
        let html = body.html().unwrap();
        assert!(html.data().contains(&format!("<a href=\"{url}\"")));
        assert_eq!(html.charset(), Some(CHARSET));
        assert!(body.text().unwrap().data().ends_with(url));
    }

    #[rocket::async_test]
    async fn outbox_records_and_fails_on_demand() {
        let outbox = Outbox::new();
        let email = Email::example();
        outbox.send_verification_email(&email, "a").await.unwrap();

        outbox.set_failing(true);
        assert!(outbox.send_verification_email(&email, "b").await.is_err());
        outbox.set_failing(false);

        assert_eq!(outbox.sent().len(), 1);
        assert_eq!(outbox.last_to(&email).unwrap().url, "a");
        assert_eq!(outbox.last_to(&Email::example2()), None);
    }
}
