use crate::clock::Clock;
use crate::error::FapsResult;
use crate::fifo::OutboundChannel;
use crate::ledger::ActivityLedger;
use crate::protocol::Token;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Periodically publishes the current APM.
#[derive(Debug)]
pub struct Publisher {
    pub clock: Clock,
    pub ledger: Arc<ActivityLedger>,
    pub channel: Arc<OutboundChannel>,
    /// Time between two metric tokens.
    pub interval: Duration,
    /// Length of the APM window.
    pub window: Duration,
}

impl Publisher {
    /// Publish every `interval` until a write fails.
    ///
    /// The first token goes out one interval after the call. There are no
    /// retries: a failed write means the subscriber is gone.
    pub async fn run(self) -> FapsResult<()> {
        let window_ms = self.window.as_millis() as u64;
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let apm = self.ledger.snapshot_rate(self.clock.now(), window_ms);
            tracing::debug!("APM:{apm} ({} presses remembered)", self.ledger.recorded());

            if let Err(e) = self.channel.send(&Token::Metric(apm)).await {
                tracing::warn!("fifo write error: {e}. Exiting apm monitor...");
                return Err(e);
            }
        }
    }
}
