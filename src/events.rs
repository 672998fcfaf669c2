use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by services and consumed by the in-process event
/// loop. Outbound delivery (email, webhooks) is a separate collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockUpdated {
        product_id: i64,
        old_stock: i32,
        new_stock: i32,
    },
    RetrainStarted {
        job_id: Uuid,
    },
    RetrainCompleted {
        job_id: Uuid,
        training_rows: usize,
        holdout_rmse: f64,
        segmented_customers: usize,
    },
    RetrainFailed {
        job_id: Uuid,
        reason: String,
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
}

/// Drains the event channel, logging each event. Runs until every sender is
/// dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::StockUpdated {
                product_id,
                old_stock,
                new_stock,
            } => {
                info!(product_id, old_stock, new_stock, "stock updated");
            }
            Event::RetrainStarted { job_id } => {
                info!(%job_id, "retrain started");
            }
            Event::RetrainCompleted {
                job_id,
                training_rows,
                holdout_rmse,
                segmented_customers,
            } => {
                info!(
                    %job_id,
                    training_rows,
                    holdout_rmse,
                    segmented_customers,
                    "retrain completed"
                );
            }
            Event::RetrainFailed { job_id, reason } => {
                warn!(%job_id, reason, "retrain failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::StockUpdated {
                product_id: 1,
                old_stock: 3,
                new_stock: 10,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::StockUpdated { new_stock, .. }) => assert_eq!(new_stock, 10),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
