//! Fatal error signal raised by workers
//!
//! Frontier failures cannot be absorbed per item, so the worker that hits
//! one raises this signal and the coordinator tears the crawl down. Only the
//! first message is kept.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct FatalSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for FatalSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl FatalSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Records a fatal error; later calls keep the first message
    pub fn raise(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(message);
            true
        });
    }

    pub fn message(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_raised(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reset(&self) {
        self.tx.send_replace(None);
    }

    /// Resolves with the message once a fatal error is raised
    pub async fn wait(&self) -> String {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(message) = rx.borrow_and_update().clone() {
                return message;
            }
            // The sender lives in self, so the channel never closes here
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
