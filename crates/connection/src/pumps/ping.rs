//! Keepalive pings for an open transport.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

/// Sends a ping every `period` until cancelled or the writer goes away.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while !cancel.is_cancelled() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        match write_tx.try_send(tungstenite::Message::Ping(Vec::new().into())) {
            Ok(()) => {}
            // A backed-up writer already has traffic in flight.
            Err(mpsc::error::TrySendError::Full(_)) => tracing::trace!("writer full, ping skipped"),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("writer closed, ping pump exiting");
                return;
            }
        }
    }
}
