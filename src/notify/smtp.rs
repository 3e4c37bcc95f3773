use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notice, Notifier, NotifyError};

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Plain SMTP when false (local relays, mail catchers).
    pub starttls: bool,
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn invalid_address(address: &str, e: impl std::fmt::Display) -> NotifyError {
    NotifyError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    }
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| invalid_address(&cfg.from, e))?;

        let mut builder = if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
        };
        builder = builder.port(cfg.port);

        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    pub(crate) fn compose(&self, notice: &Notice) -> Result<Message, NotifyError> {
        let recipient = notice.recipient();
        let address: Address = recipient
            .email
            .parse()
            .map_err(|e| invalid_address(&recipient.email, e))?;

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(recipient.name.clone()), address))
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        let message = self.compose(notice)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::info!(
            kind = notice.kind(),
            to = %notice.recipient().email,
            "notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::models::Slot;
    use crate::notify::Recipient;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".into(),
            port: 1025,
            username: None,
            password: None,
            from: "Clinic <no-reply@clinic.test>".into(),
            starttls: false,
        }
    }

    fn booked(email: &str) -> Notice {
        Notice::Booked {
            recipient: Recipient {
                email: email.into(),
                name: "Ana".into(),
            },
            date: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
            time: Slot::At1500,
        }
    }

    #[tokio::test]
    async fn composes_plain_text_message() {
        let notifier = SmtpNotifier::new(&config()).unwrap();
        let message = notifier.compose(&booked("ana@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Your appointment is confirmed"));
        assert!(raw.contains("15:00"));
    }

    #[tokio::test]
    async fn rejects_malformed_recipient() {
        let notifier = SmtpNotifier::new(&config()).unwrap();
        assert_matches!(
            notifier.compose(&booked("not-an-address")).err(),
            Some(NotifyError::InvalidAddress { .. })
        );
    }

    #[test]
    fn rejects_malformed_sender() {
        let cfg = SmtpConfig {
            from: "nobody".into(),
            ..config()
        };
        assert_matches!(
            SmtpNotifier::new(&cfg).err(),
            Some(NotifyError::InvalidAddress { .. })
        );
    }
}
