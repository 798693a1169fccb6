//! Subscriptions to status changes
//!
//! One listener task per watched context. When the context announces a
//! change, the task re-authorizes each band and pushes a fresh `get` result.

use crate::context::StatusChanged;
use crate::recipe::RecipeId;
use crate::transport::authorize::AuthorizeRequest;
use crate::transport::{Band, Envelope, RecipeTransport};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Live subscription handle
///
/// Updates arrive in the order the listener tasks produce them. Dropping the
/// handle (or calling `cancel`) detaches every listener.
#[derive(Debug)]
pub struct Subscription {
    receiver: UnboundedReceiver<Envelope>,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscription {
    pub(super) fn new(receiver: UnboundedReceiver<Envelope>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { receiver, tasks }
    }

    /// Wait for the next update; `None` once every listener has stopped
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Next update if one is already queued
    pub fn try_recv(&mut self) -> Option<Envelope> {
        match self.receiver.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of contexts being watched
    pub fn listeners(&self) -> usize {
        self.tasks.len()
    }

    /// Detach every listener
    pub fn cancel(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Create the channel shared by a subscription's listeners
pub(super) fn channel() -> (UnboundedSender<Envelope>, UnboundedReceiver<Envelope>) {
    mpsc::unbounded_channel()
}

/// Spawn the listener for one context
pub(super) fn spawn_listener(
    transport: RecipeTransport,
    id: RecipeId,
    mut changes: Receiver<StatusChanged>,
    bands: Vec<Band>,
    user: Option<String>,
    sender: UnboundedSender<Envelope>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(recipe_id = %id, skipped, "Subscriber lagged; pushing current state");
                }
                Err(RecvError::Closed) => break,
            }

            for band in &bands {
                let request = AuthorizeRequest::read(id.as_str(), Some(*band), user.clone());
                if !transport.authorizer().authorize(&request).await {
                    trace!(recipe_id = %id, band = band.as_str(), "Update not authorized");
                    continue;
                }

                let query = Envelope::new()
                    .with_id(id.as_str())
                    .with_band(band.as_str())
                    .with_user_opt(user.clone());
                match transport.get(query).await {
                    Ok(update) => {
                        if sender.send(update).is_err() {
                            return;
                        }
                    }
                    Err(rejection) => {
                        debug!(recipe_id = %id, error = %rejection, "Dropped update");
                    }
                }
            }
        }
    })
}
