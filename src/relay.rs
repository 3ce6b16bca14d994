//! Relay port: the transport seam between the bunker and the outside world.
//!
//! The session core only ever makes one `subscribe` call and any number of
//! `publish` calls. Connection management, framing, and retry policy belong
//! to the port implementation. `ClientRelay` adapts the nostr-sdk relay
//! pool; tests supply an in-memory port instead.

use async_trait::async_trait;
use nostr::prelude::*;
use nostr_sdk::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};

use crate::error::BunkerError;

/// A message pulled from a relay subscription.
#[derive(Debug, Clone)]
pub enum RelayInbound {
    /// An EVENT matching the subscription filters.
    Event(Box<Event>),
    /// Anything else the relay sends on the subscription (EOSE, notices).
    /// The session ignores these.
    Other,
}

/// Transport consumed by a bunker session.
#[async_trait]
pub trait RelayPort: Send + Sync {
    /// Open a subscription for `filters`. Delivery must stop promptly once
    /// `cancel` flips to true; the returned channel closing ends the
    /// session loop.
    async fn subscribe(
        &self,
        filters: Vec<Filter>,
        cancel: watch::Receiver<bool>,
    ) -> Result<mpsc::Receiver<RelayInbound>, BunkerError>;

    /// Publish a single signed event. Not retried by the core.
    async fn publish(&self, event: Event) -> Result<(), BunkerError>;
}

/// [`RelayPort`] backed by the nostr-sdk relay pool.
#[derive(Clone)]
pub struct ClientRelay {
    client: Client,
}

impl ClientRelay {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a pool over `relays` and connect to all of them.
    pub async fn connect(relays: &[String]) -> Result<Self, BunkerError> {
        let client = Client::default();
        for url in relays {
            client
                .add_relay(url.as_str())
                .await
                .map_err(|e| BunkerError::Relay(format!("{url}: {e}")))?;
        }
        client.connect().await;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl RelayPort for ClientRelay {
    async fn subscribe(
        &self,
        filters: Vec<Filter>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<mpsc::Receiver<RelayInbound>, BunkerError> {
        let mut ids = Vec::with_capacity(filters.len());
        for filter in filters {
            let output = self
                .client
                .subscribe(filter, None)
                .await
                .map_err(|e| BunkerError::Relay(e.to_string()))?;
            ids.push(output.val);
        }

        let (tx, rx) = mpsc::channel(64);
        let mut notifications = self.client.notifications();
        let client = self.client.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            break;
                        }
                    }
                    notification = notifications.recv() => match notification {
                        Ok(RelayPoolNotification::Event { subscription_id, event, .. }) => {
                            if !ids.contains(&subscription_id) {
                                continue;
                            }
                            if tx.send(RelayInbound::Event(event)).await.is_err() {
                                break;
                            }
                        }
                        Ok(RelayPoolNotification::Shutdown) => break,
                        Ok(_) => {
                            if tx.send(RelayInbound::Other).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("relay notification stream lagged, {skipped} dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            for id in &ids {
                client.unsubscribe(id).await;
            }
        });

        Ok(rx)
    }

    async fn publish(&self, event: Event) -> Result<(), BunkerError> {
        self.client
            .send_event(&event)
            .await
            .map_err(|e| BunkerError::Relay(e.to_string()))?;
        Ok(())
    }
}
