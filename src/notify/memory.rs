use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Notice, Notifier, NotifyError};

/// Keeps delivered notices in memory. `failing()` builds one that rejects
/// every delivery.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notice>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<Notice> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("delivery refused".into()));
        }
        self.sent.lock().await.push(notice.clone());
        Ok(())
    }
}
