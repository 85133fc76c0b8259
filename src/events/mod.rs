use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

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

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Used after a commit, where the write must not be reported as failed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Domain events published after a successful commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
    },
    OrderCancelled {
        order_id: Uuid,
        previous_status: String,
    },
    CouponRedeemed {
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    },
    InventoryReserved {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    InventoryRestored {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    ProductCreated(Uuid),
    ProductDeleted(Uuid),
    CouponCreated(Uuid),
    CouponDeleted(Uuid),
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        log_event(&event);
    }

    info!("Event channel closed; event processing loop stopped");
}

fn log_event(event: &Event) {
    match event {
        Event::OrderCreated {
            order_id,
            order_number,
            total,
        } => {
            info!(%order_id, %order_number, %total, "order created");
        }
        Event::OrderCancelled {
            order_id,
            previous_status,
        } => {
            info!(%order_id, %previous_status, "order cancelled");
        }
        Event::CouponRedeemed {
            coupon_id,
            user_id,
            order_id,
        } => {
            info!(%coupon_id, %user_id, %order_id, "coupon redeemed");
        }
        Event::InventoryReserved {
            product_id,
            variant_id,
            quantity,
        } => {
            info!(%product_id, ?variant_id, quantity, "inventory reserved");
        }
        Event::InventoryRestored {
            product_id,
            variant_id,
            quantity,
        } => {
            info!(%product_id, ?variant_id, quantity, "inventory restored");
        }
        Event::ProductCreated(id) => info!(product_id = %id, "product created"),
        Event::ProductDeleted(id) => info!(product_id = %id, "product deleted"),
        Event::CouponCreated(id) => info!(coupon_id = %id, "coupon created"),
        Event::CouponDeleted(id) => info!(coupon_id = %id, "coupon deleted"),
    }
}
