use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the storefront core. Consumed by the in-process
/// processing loop; downstream integrations subscribe there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        owner_id: String,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        owner_id: String,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        owner_id: String,
        item_id: Uuid,
    },
    CartCleared {
        owner_id: String,
    },

    // Checkout events
    CheckoutSessionCreated {
        provider_session_id: String,
        owner_id: String,
        amount: Decimal,
    },
    CheckoutSessionPaid {
        provider_session_id: String,
        order_id: Uuid,
    },
    CheckoutSessionExpired {
        provider_session_id: String,
    },
    CheckoutSessionFailed {
        provider_session_id: String,
        reason: String,
    },

    // Order and stock events
    OrderCreated(Uuid),
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing the surrounding request
    /// when the channel is closed or full.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

/// Processes incoming events. Today this logs them for observability; it is
/// the seam where outbound integrations (notifications, analytics) attach.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CheckoutSessionPaid {
                provider_session_id,
                order_id,
            } => {
                info!(
                    provider_session_id = %provider_session_id,
                    order_id = %order_id,
                    "checkout session paid"
                );
            }
            Event::CheckoutSessionFailed {
                provider_session_id,
                reason,
            } => {
                warn!(
                    provider_session_id = %provider_session_id,
                    reason = %reason,
                    "checkout session failed"
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::CartCleared {
                owner_id: "guest:sess_1".into(),
            })
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::CartCleared { owner_id }) => assert_eq!(owner_id, "guest:sess_1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out.
        sender.send_or_log(Event::OrderCreated(Uuid::new_v4())).await;
    }
}
