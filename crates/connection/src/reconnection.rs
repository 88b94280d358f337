//! Session loop: connect, serve a transport until it closes, back off, retry.
//!
//! A session starts with `connect` and ends on `disconnect`, on a newer
//! `connect` superseding it, or when the attempt budget runs out. Handlers and
//! the outbound queue live on the manager, so they survive transport swaps.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use parley_protocol::envelope::Frame;

use crate::config::{ReconnectConfig, redacted};
use crate::manager::Inner;
use crate::types::{ConnectionEvent, ConnectionState};
use crate::ws_client::{FrameCallback, WsClient};

/// Reconnect attempt counter with exponential backoff.
#[derive(Debug)]
pub(crate) struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
}

impl Backoff {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Schedules the next attempt: returns its delay and counts it, or
    /// `None` once the budget is spent.
    pub(crate) fn schedule(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        let delay = self.config.delay_for_attempt(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Spends the whole budget so nothing further gets scheduled.
    pub(crate) fn exhaust(&mut self) {
        self.attempts = self.config.max_attempts;
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Runs one session until it is cancelled, superseded, or gives up.
pub(crate) async fn run_session(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    loop {
        let Some(token) = inner.credential_for(generation) else {
            debug!(generation, "session superseded or no credential, stopping");
            return;
        };

        let url = match inner.config.ws_url(&token) {
            Ok(u) => u,
            Err(e) => {
                error!(error = %e, "cannot derive WebSocket URL, giving up");
                inner.give_up(generation);
                return;
            }
        };

        inner.publish_for(generation, ConnectionState::Connecting);
        info!(url = %redacted(&url), generation, "connecting");

        let dispatch: FrameCallback = {
            let inner = inner.clone();
            Box::new(move |frame: Frame| inner.dispatch(generation, frame))
        };
        let transport_cancel = cancel.child_token();
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return,
            r = WsClient::connect(&url, &inner.config, dispatch, transport_cancel) => r,
        };

        match attempt {
            Ok(mut client) => {
                let writer = client.sender();
                if !inner.on_open(generation, writer.clone()) {
                    client.close();
                    return;
                }
                let reason = loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            client.close();
                            return;
                        }
                        reason = client.closed() => break reason,
                        () = inner.drain_backlog(generation, &writer) => {}
                    }
                };
                inner.on_close(generation);
                info!(?reason, generation, "connection closed");
            }
            Err(e) => {
                warn!(error = %e, generation, "connection attempt failed");
            }
        }

        let Some((attempt, delay)) = inner.schedule_reconnect(generation) else {
            return;
        };
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

impl Inner {
    /// Counts a reconnect and publishes it, or gives up when the budget is
    /// spent. Returns `None` if the session should stop.
    pub(crate) fn schedule_reconnect(&self, generation: u64) -> Option<(u32, Duration)> {
        let mut shared = self.lock();
        if !shared.is_current(generation) {
            return None;
        }
        if shared.credential.is_none() {
            drop(shared);
            self.give_up(generation);
            return None;
        }
        match shared.backoff.schedule() {
            Some(delay) => {
                let attempt = shared.backoff.attempts();
                self.publish(ConnectionState::Reconnecting { attempt, delay });
                self.emit(ConnectionEvent::Reconnecting { attempt, delay });
                Some((attempt, delay))
            }
            None => {
                drop(shared);
                self.give_up(generation);
                None
            }
        }
    }

    /// Ends the session after the reconnect budget ran out.
    pub(crate) fn give_up(&self, generation: u64) {
        let mut shared = self.lock();
        if !shared.is_current(generation) {
            return;
        }
        shared.session = None;
        shared.writer = None;
        let attempts = shared.backoff.attempts();
        warn!(attempts, "max reconnect attempts reached");
        self.publish(ConnectionState::GaveUp);
        self.emit(ConnectionEvent::GaveUp { attempts });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            max_attempts,
            ..ReconnectConfig::default()
        }
    }

    #[test]
    fn backoff_grows_then_caps() {
        let mut backoff = Backoff::new(config(10));
        let delays: Vec<u64> = std::iter::from_fn(|| backoff.schedule())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            [1000, 2000, 4000, 8000, 16_000, 30_000, 30_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn backoff_stops_at_ceiling() {
        let mut backoff = Backoff::new(config(10));
        for _ in 0..10 {
            assert!(backoff.schedule().is_some());
        }
        assert_eq!(backoff.attempts(), 10);
        assert!(backoff.schedule().is_none());
        assert!(backoff.schedule().is_none());
    }

    #[test]
    fn reset_restarts_from_base_delay() {
        let mut backoff = Backoff::new(config(10));
        backoff.schedule();
        backoff.schedule();
        backoff.schedule();
        backoff.reset();
        assert_eq!(backoff.schedule(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn exhaust_blocks_scheduling_until_reset() {
        let mut backoff = Backoff::new(config(10));
        backoff.exhaust();
        assert!(backoff.schedule().is_none());
        backoff.reset();
        assert!(backoff.schedule().is_some());
    }

    #[test]
    fn zero_budget_never_schedules() {
        let mut backoff = Backoff::new(config(0));
        assert!(backoff.schedule().is_none());
    }
}
