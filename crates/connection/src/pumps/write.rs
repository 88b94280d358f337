//! Outbound side of a transport: a single task owns the sink.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Writes messages to the WebSocket in channel order.
///
/// A write error cancels the transport token, which stops the read pump and
/// lets the session run its close path.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => match msg {
                Some(m) => m,
                None => break,
            },
        };
        if let Err(e) = write.send(msg).await {
            warn!(error = %e, "write failed, closing transport");
            cancel.cancel();
            return;
        }
    }

    if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
        debug!("close frame not sent: {e}");
    }
}
