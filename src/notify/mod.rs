use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::Slot;

pub mod log;
pub mod memory;
pub mod smtp;

pub use log::LogNotifier;
pub use memory::MemoryNotifier;
pub use smtp::{SmtpConfig, SmtpNotifier};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("message build error: {0}")]
    Message(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

/// Something a patient is told about their appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Booked {
        recipient: Recipient,
        date: NaiveDate,
        time: Slot,
    },
    Rescheduled {
        recipient: Recipient,
        date: NaiveDate,
        time: Slot,
    },
    Canceled {
        recipient: Recipient,
        practitioner_name: String,
    },
}

impl Notice {
    pub fn recipient(&self) -> &Recipient {
        match self {
            Notice::Booked { recipient, .. }
            | Notice::Rescheduled { recipient, .. }
            | Notice::Canceled { recipient, .. } => recipient,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notice::Booked { .. } => "booked",
            Notice::Rescheduled { .. } => "rescheduled",
            Notice::Canceled { .. } => "canceled",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Notice::Booked { .. } => "Your appointment is confirmed",
            Notice::Rescheduled { .. } => "Your appointment was rescheduled",
            Notice::Canceled { .. } => "Your appointment was canceled",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notice::Booked {
                recipient,
                date,
                time,
            } => format!(
                "Hello {},\n\nYour appointment is booked for {} at {}.\n",
                recipient.name,
                date.format("%d/%m/%Y"),
                time
            ),
            Notice::Rescheduled {
                recipient,
                date,
                time,
            } => format!(
                "Hello {},\n\nYour appointment has moved to {} at {}.\n",
                recipient.name,
                date.format("%d/%m/%Y"),
                time
            ),
            Notice::Canceled {
                recipient,
                practitioner_name,
            } => format!(
                "Hello {},\n\nYour appointment with {} has been canceled.\n",
                recipient.name, practitioner_name
            ),
        }
    }
}

/// Outbound delivery of patient notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> Recipient {
        Recipient {
            email: "ana@example.com".into(),
            name: "Ana".into(),
        }
    }

    #[test]
    fn booked_body_mentions_date_and_slot() {
        let notice = Notice::Booked {
            recipient: ana(),
            date: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
            time: Slot::At1500,
        };
        assert_eq!(notice.kind(), "booked");
        assert!(notice.body().contains("07/04/2025 at 15:00"));
    }

    #[test]
    fn canceled_body_names_practitioner() {
        let notice = Notice::Canceled {
            recipient: ana(),
            practitioner_name: "Dr. Souza".into(),
        };
        assert_eq!(notice.recipient().email, "ana@example.com");
        assert!(notice.body().contains("with Dr. Souza"));
    }
}
