//! # ks-notify-queue
//!
//! An in-process [`EventSink`]. Events are pushed onto an unbounded channel
//! and a background task turns them into mail for every eligible watcher,
//! so publishing never blocks the request that caused it.

mod mailer;
mod notifier;

pub use mailer::LogMailer;
pub use notifier::{Notifier, NotifierSettings};

use ks_core::events::ForumEvent;
use ks_core::traits::EventSink;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
enum Job {
    Event(ForumEvent),
    Confirm(Uuid),
}

pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl NotificationQueue {
    /// Spawns the delivery task. It runs until every queue handle is dropped.
    pub fn start(notifier: Notifier) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let outcome = match job {
                    Job::Event(event) => notifier.deliver(event).await.map(drop),
                    Job::Confirm(watch_id) => notifier.confirm(watch_id).await.map(drop),
                };
                if let Err(e) = outcome {
                    warn!(error = %e, ?job, "notification delivery failed");
                }
            }
            debug!("notification queue closed");
        });
        (Self { tx }, handle)
    }

    fn enqueue(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!(?job, "notification worker is gone, job dropped");
        }
    }
}

impl EventSink for NotificationQueue {
    fn publish(&self, event: ForumEvent) {
        self.enqueue(Job::Event(event));
    }

    fn confirm_watch(&self, watch_id: Uuid) {
        self.enqueue(Job::Confirm(watch_id));
    }
}
