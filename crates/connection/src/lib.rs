//! Real-time connection manager for a chat client.
//!
//! Keeps one WebSocket to the chat server open, reconnecting with
//! exponential backoff, routes inbound frames to registered handlers and
//! queues outbound events while offline.

pub mod config;
pub mod manager;
mod pumps;
mod queue;
pub(crate) mod reconnection;
mod registry;
pub mod types;
pub mod ws_client;

pub use config::{ClientConfig, KeepaliveConfig, QueueConfig, ReconnectConfig};
pub use manager::ConnectionManager;
pub use queue::OverflowPolicy;
pub use registry::{Handler, HandlerId};
pub use types::{ConnectionEvent, ConnectionState};
pub use ws_client::{CloseReason, ConnectionError, FrameCallback, WsClient};
