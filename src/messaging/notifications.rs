//! Foreground notification delivery.
//!
//! Delivered messages flow through a bounded single-consumer channel. The
//! consumer holds a [`NotificationStream`] and unsubscribes by closing or
//! dropping it, after which senders get [`NotificationError::Closed`].

use crate::messaging::models::NotificationPayload;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Notification listener has unsubscribed")]
    Closed,
    #[error("Notification queue is full")]
    Full,
}

/// Creates a connected sender/stream pair buffering up to `capacity` payloads.
pub fn channel(capacity: usize) -> (NotificationSender, NotificationStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationSender { tx }, NotificationStream { rx })
}

#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<NotificationPayload>,
}

impl NotificationSender {
    /// Queues a payload without waiting for room.
    pub fn deliver(&self, payload: NotificationPayload) -> Result<(), NotificationError> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotificationError::Full,
            mpsc::error::TrySendError::Closed(_) => NotificationError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct NotificationStream {
    rx: mpsc::Receiver<NotificationPayload>,
}

impl NotificationStream {
    /// Stops accepting new payloads. Anything already queued can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for NotificationStream {
    type Item = NotificationPayload;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Keeps the most recent notification for display.
///
/// Spawns a task that drains a [`NotificationStream`]; the task ends when every
/// sender is gone or the inbox is dropped.
pub struct NotificationInbox {
    latest: Arc<RwLock<Option<NotificationPayload>>>,
    task: JoinHandle<()>,
}

impl NotificationInbox {
    pub fn spawn(mut stream: NotificationStream) -> Self {
        let latest = Arc::new(RwLock::new(None));
        let slot = latest.clone();
        let task = tokio::spawn(async move {
            while let Some(payload) = stream.next().await {
                tracing::debug!(title = %payload.title, "notification received");
                *slot.write().await = Some(payload);
            }
        });

        Self { latest, task }
    }

    pub async fn latest(&self) -> Option<NotificationPayload> {
        self.latest.read().await.clone()
    }

    pub async fn clear(&self) {
        *self.latest.write().await = None;
    }
}

impl Drop for NotificationInbox {
    fn drop(&mut self) {
        self.task.abort();
    }
}
