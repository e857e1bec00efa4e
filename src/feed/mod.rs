//! Top-of-book bus.
//!
//! Ingestion (sockets, replays, simulators) runs wherever it likes and hands
//! normalised updates to a bounded mailbox; the engine consumes them on its
//! own single thread in arrival order.

use crate::domain::TopOfBookUpdate;
use crate::engine::ArbEngine;
use tokio::sync::mpsc;
use tracing::info;

/// Receiving side of the price mailbox
pub struct PriceBus {
    rx: mpsc::Receiver<TopOfBookUpdate>,
}

impl PriceBus {
    /// Create the mailbox. Producers clone the sender; the bus keeps the
    /// single consumer.
    pub fn new(capacity: usize) -> (mpsc::Sender<TopOfBookUpdate>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// Feed the engine until every producer is gone.
    pub async fn drive(mut self, engine: &mut ArbEngine) {
        while let Some(update) = self.rx.recv().await {
            engine.on_update(&update);
        }
        info!("price bus drained, all producers closed");
    }

    /// Feed the engine whatever is already queued, without waiting. Returns
    /// the number of updates processed.
    pub fn drain_ready(&mut self, engine: &mut ArbEngine) -> usize {
        let mut processed = 0;
        while let Ok(update) = self.rx.try_recv() {
            engine.on_update(&update);
            processed += 1;
        }
        processed
    }
}
