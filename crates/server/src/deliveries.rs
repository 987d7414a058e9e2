use deployflow::schedules::{DeliveryEvent, DeliveryOutcome};
use tokio::sync::broadcast::{self, error::RecvError};

/// Drains the manager's delivery channel and keeps running totals in the log.
pub async fn log_deliveries(mut rx: broadcast::Receiver<DeliveryEvent>) {
    let mut sent: u64 = 0;
    let mut failed: u64 = 0;

    loop {
        match rx.recv().await {
            Ok(event) => {
                match &event.outcome {
                    DeliveryOutcome::Sent => sent += 1,
                    DeliveryOutcome::Failed(_) => failed += 1,
                }
                tracing::debug!(
                    schedule_id = %event.schedule_id,
                    trigger = event.trigger.as_str(),
                    status = %event.status,
                    sent,
                    failed,
                    "delivery recorded"
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "delivery log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
