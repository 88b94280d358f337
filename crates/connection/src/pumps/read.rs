//! Inbound side of a transport: parse frames, answer pings, enforce the read deadline.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use parley_protocol::envelope::Frame;

use crate::ws_client::{CloseReason, FrameCallback};

/// Reads messages from the WebSocket until it closes and dispatches text
/// frames to `on_frame`.
///
/// Uses a read deadline to detect dead connections: if nothing arrives
/// within `pong_wait` the connection is considered dead and the loop exits.
/// On exit the transport token is cancelled so the write and ping pumps stop.
pub(crate) async fn read_pump<S>(
    mut read: S,
    on_frame: FrameCallback,
    write_tx: mpsc::Sender<tungstenite::Message>,
    pong_wait: Duration,
    max_message_size: usize,
    cancel: CancellationToken,
) -> CloseReason
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(pong_wait);
    tokio::pin!(deadline);

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break CloseReason::Cancelled,

            () = &mut deadline => {
                warn!(wait_secs = pong_wait.as_secs(), "read deadline expired, closing");
                break CloseReason::Timeout;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        // Any incoming message resets the deadline.
                        deadline.as_mut().reset(tokio::time::Instant::now() + pong_wait);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_message(text.as_str(), max_message_size, &on_frame);
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                if write_tx.try_send(tungstenite::Message::Pong(data)).is_err() {
                                    debug!("writer full or closed, pong dropped");
                                }
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(frame) => {
                                let code = frame.as_ref().map(|f| u16::from(f.code));
                                debug!(?code, "received close frame");
                                break CloseReason::ClosedByServer(code);
                            }
                            _ => {} // binary frames are not part of the protocol
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break CloseReason::Error(e.to_string());
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break CloseReason::StreamEnded;
                    }
                }
            }
        }
    };

    cancel.cancel();
    reason
}

/// Parses a text message and hands it to the dispatcher. Malformed or
/// oversized messages are logged and dropped.
fn handle_text_message(text: &str, max_message_size: usize, on_frame: &FrameCallback) {
    if text.len() > max_message_size {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let frame = match Frame::parse(text) {
        Ok(f) => f,
        Err(e) => {
            warn!("failed to parse message: {e}");
            return;
        }
    };

    trace!(event_type = %frame.event_type, "received frame");
    on_frame(frame);
}
