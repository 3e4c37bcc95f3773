use async_trait::async_trait;

use super::{Notice, Notifier, NotifyError};

/// Writes notices to the tracing log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        let recipient = notice.recipient();
        tracing::info!(
            kind = notice.kind(),
            to = %recipient.email,
            subject = notice.subject(),
            "notification (log only): {}",
            notice.body().trim_end()
        );
        Ok(())
    }
}
