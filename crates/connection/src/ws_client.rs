//! WebSocket transport to the chat server.
//!
//! One [`WsClient`] is one transport: it owns the read, write and ping pumps
//! for a single socket and completes [`WsClient::closed`] when that socket is
//! gone. Reconnection lives a level up, in the session loop.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use parley_protocol::envelope::Frame;

use crate::config::ClientConfig;

/// Errors from establishing a transport.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("handshake timed out")]
    Timeout,
}

/// Why a transport stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// Closed locally (disconnect, supersession, or a failed write).
    Cancelled,
    /// Nothing arrived within the read deadline.
    Timeout,
    /// The server sent a close frame, with its code if any.
    ClosedByServer(Option<u16>),
    /// The socket reported an error.
    Error(String),
    /// The stream ended without a close frame.
    StreamEnded,
    /// The read task was aborted.
    Aborted,
}

/// Capacity of a transport's outbound channel. Frames that do not fit wait
/// in the manager's bounded queue.
pub(crate) const WRITE_CHANNEL_CAPACITY: usize = 256;

/// Callback type for parsed inbound frames. Runs on the read pump task.
pub type FrameCallback = Box<dyn Fn(Frame) + Send + Sync>;

/// A single open WebSocket connection.
pub struct WsClient {
    write_tx: mpsc::Sender<tungstenite::Message>,
    read_handle: JoinHandle<CloseReason>,
    _write_handle: JoinHandle<()>,
    ping_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl WsClient {
    /// Opens a WebSocket to `url` and starts the pumps.
    ///
    /// `cancel` scopes the transport; cancelling it (or a parent token)
    /// closes the socket.
    pub async fn connect(
        url: &Url,
        config: &ClientConfig,
        on_frame: FrameCallback,
        cancel: CancellationToken,
    ) -> Result<Self, ConnectionError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_message_size);

        let handshake =
            tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false);
        let (ws_stream, _) = tokio::time::timeout(config.connect_timeout(), handshake)
            .await
            .map_err(|_| ConnectionError::Timeout)??;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(WRITE_CHANNEL_CAPACITY);

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(write, write_rx, cancel))
        };

        let read_handle = {
            let cancel = cancel.clone();
            let write_tx = write_tx.clone();
            tokio::spawn(crate::pumps::read::read_pump(
                read,
                on_frame,
                write_tx,
                config.keepalive.pong_wait(),
                config.max_message_size,
                cancel,
            ))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::ping::ping_pump(
                write_tx,
                config.keepalive.ping_interval(),
                cancel,
            ))
        };

        Ok(Self {
            write_tx,
            read_handle,
            _write_handle: write_handle,
            ping_handle,
            cancel,
        })
    }

    /// Returns a handle for queueing outbound messages on this transport.
    pub fn sender(&self) -> mpsc::Sender<tungstenite::Message> {
        self.write_tx.clone()
    }

    /// Waits until the transport has stopped.
    pub async fn closed(&mut self) -> CloseReason {
        (&mut self.read_handle)
            .await
            .unwrap_or(CloseReason::Aborted)
    }

    /// Closes the connection. The write pump sends a close frame on its way out.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.read_handle.abort();
        self.ping_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_display() {
        let err = ConnectionError::Timeout;
        assert_eq!(err.to_string(), "handshake timed out");

        let err = ConnectionError::UnsupportedScheme("ftp".into());
        assert_eq!(err.to_string(), "unsupported URL scheme: ftp");
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        // Bind then drop a listener to get a port nobody is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::with_server(format!("http://{addr}"));
        let url = config.ws_url("t").unwrap();
        let result = WsClient::connect(
            &url,
            &config,
            Box::new(|_: Frame| {}),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(ConnectionError::Ws(_))));
    }
}
