use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::metric_override::{MetricName, Period};
use crate::realtime::SnapshotPublisher;

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

/// Domain events emitted by the metric store and the allocation ledger.
/// Every event names the seller rooms whose dashboards are now stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OverrideSet {
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    },
    OverrideCleared {
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    },
    /// Bulk clear; one entry per seller whose overrides were removed.
    OverridesCleared {
        seller_ids: Vec<Uuid>,
    },
    DistributionCreated {
        seller_id: Uuid,
        distribution_id: Uuid,
    },
    DistributionUpdated {
        seller_id: Uuid,
        distribution_id: Uuid,
    },
    DistributionDeleted {
        seller_id: Uuid,
        distribution_id: Uuid,
    },
    SaleRecorded {
        seller_id: Uuid,
        distribution_id: Uuid,
        quantity: i32,
    },
}

impl Event {
    /// Sellers whose rooms need a fresh snapshot after this event.
    pub fn affected_sellers(&self) -> Vec<Uuid> {
        match self {
            Event::OverrideSet { seller_id, .. }
            | Event::OverrideCleared { seller_id, .. }
            | Event::DistributionCreated { seller_id, .. }
            | Event::DistributionUpdated { seller_id, .. }
            | Event::DistributionDeleted { seller_id, .. }
            | Event::SaleRecorded { seller_id, .. } => vec![*seller_id],
            Event::OverridesCleared { seller_ids } => seller_ids.clone(),
        }
    }
}

/// Processes incoming domain events: each write re-resolves the affected
/// seller and pushes the new snapshot to that seller's room. A failed
/// refresh is logged and dropped; the next periodic tick repairs the room.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, publisher: Arc<SnapshotPublisher>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        for seller_id in event.affected_sellers() {
            if let Err(e) = publisher.refresh_seller(seller_id).await {
                warn!(
                    seller_id = %seller_id,
                    error = %e,
                    "Failed to refresh seller room after event"
                );
            }
        }
    }

    error!("Event channel closed; event processing loop stopped");
}
