use crate::blackboard::FactUpdate;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Log every blackboard write until the board is dropped.
///
/// Returns the number of updates seen.
pub async fn run_update_logger(mut rx: broadcast::Receiver<FactUpdate>) -> u64 {
    let mut seen = 0;

    loop {
        match rx.recv().await {
            Ok(update) => {
                seen += 1;
                match (&update.old_value, &update.new_value) {
                    (Some(old), Some(new)) => debug!(
                        key = %update.key,
                        index = update.index,
                        old = %old,
                        new = %new,
                        "Fact updated"
                    ),
                    (None, Some(new)) => {
                        debug!(key = %update.key, index = update.index, new = %new, "Fact added")
                    }
                    (Some(old), None) => {
                        debug!(key = %update.key, index = update.index, old = %old, "Fact removed")
                    }
                    (None, None) => debug!(key = %update.key, "Entry changed"),
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Update logger lagged, skipped updates");
                seen += skipped;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    info!(updates = seen, "Blackboard closed");
    seen
}
