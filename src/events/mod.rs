use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::DocumentKind;

/// Events emitted by the ledger core after a state change commits. Emission
/// happens outside the transaction; a failed send never rolls anything back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    DocumentCreated {
        kind: DocumentKind,
        document_id: Uuid,
        document_number: String,
    },
    DocumentValidated {
        kind: DocumentKind,
        document_id: Uuid,
        document_number: String,
        movements_recorded: usize,
    },
    DocumentCancelled {
        kind: DocumentKind,
        document_id: Uuid,
        document_number: String,
    },
    StockLevelChanged {
        product_id: Uuid,
        warehouse_id: Uuid,
        rack_location: String,
        new_quantity: i64,
    },
    LowStockDetected {
        product_id: Uuid,
        warehouse_id: Uuid,
        rack_location: String,
        quantity: i64,
        reorder_level: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel and logs each event. Runs for the life of the
/// process; exits when every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::DocumentCreated {
                kind,
                document_number,
                ..
            } => info!(kind = kind.as_str(), number = %document_number, "document created"),
            Event::DocumentValidated {
                kind,
                document_number,
                movements_recorded,
                ..
            } => info!(
                kind = kind.as_str(),
                number = %document_number,
                movements = movements_recorded,
                "document validated"
            ),
            Event::DocumentCancelled {
                kind,
                document_number,
                ..
            } => info!(kind = kind.as_str(), number = %document_number, "document cancelled"),
            Event::StockLevelChanged {
                product_id,
                warehouse_id,
                rack_location,
                new_quantity,
            } => info!(
                product = %product_id,
                warehouse = %warehouse_id,
                rack = %rack_location,
                quantity = new_quantity,
                "stock level changed"
            ),
            Event::LowStockDetected {
                product_id,
                warehouse_id,
                rack_location,
                quantity,
                reorder_level,
            } => warn!(
                product = %product_id,
                warehouse = %warehouse_id,
                rack = %rack_location,
                quantity = quantity,
                reorder_level = reorder_level,
                "stock below reorder level"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_once_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        drop(rx);

        let result = sender
            .send(Event::StockLevelChanged {
                product_id: Uuid::new_v4(),
                warehouse_id: Uuid::new_v4(),
                rack_location: "A-01".into(),
                new_quantity: 5,
            })
            .await;
        assert!(result.is_err());
    }
}
