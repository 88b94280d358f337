//! Connection manager: the one real-time connection of a chat client.
//!
//! Owns the handler registry, the outbound queue and the reconnect counter,
//! and runs a session task that keeps a WebSocket open, reconnecting with
//! exponential backoff on unexpected disconnects.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use parley_protocol::constants::MessageType;
use parley_protocol::envelope::Frame;
use parley_protocol::events::{
    ConversationType, MessageRef, OutboundEvent, SendMessagePayload, TypingTarget,
};

use crate::config::ClientConfig;
use crate::queue::OutboundQueue;
use crate::reconnection::{Backoff, run_session};
use crate::registry::{Handler, HandlerId, HandlerRegistry};
use crate::types::{ConnectionEvent, ConnectionState};

/// Capacity of the [`ConnectionEvent`] channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Handle to a running session.
pub(crate) struct Session {
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
}

/// Everything that changes at runtime, behind one lock.
pub(crate) struct Shared {
    pub(crate) credential: Option<String>,
    /// Writer of the open transport; `None` while not connected.
    pub(crate) writer: Option<mpsc::Sender<tungstenite::Message>>,
    pub(crate) queue: OutboundQueue,
    pub(crate) registry: HandlerRegistry,
    pub(crate) backoff: Backoff,
    pub(crate) session: Option<Session>,
    next_generation: u64,
}

impl Shared {
    /// Whether `generation` is the session currently allowed to touch state.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
    /// Signalled when frames are queued behind a full writer.
    backlog: Notify,
}

impl Inner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a state change. Emits `StateChanged` only on actual change.
    pub(crate) fn publish(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state.clone();
            true
        });
        if changed {
            self.emit(ConnectionEvent::StateChanged(state));
        }
    }

    /// Publishes a state change on behalf of a session, if it is still current.
    pub(crate) fn publish_for(&self, generation: u64, state: ConnectionState) {
        let shared = self.lock();
        if shared.is_current(generation) {
            self.publish(state);
        }
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            trace!("connection event not delivered: {e}");
        }
    }

    /// Returns the credential to connect with, if `generation` is still current.
    pub(crate) fn credential_for(&self, generation: u64) -> Option<String> {
        let shared = self.lock();
        if !shared.is_current(generation) {
            return None;
        }
        shared.credential.clone()
    }

    /// Transport opened: reset backoff, flush the queue, go live.
    ///
    /// The flush and the switch to "connected" happen under one lock, so
    /// frames sent concurrently land after every queued frame. Whatever does
    /// not fit in the writer stays queued for [`drain_backlog`](Self::drain_backlog).
    pub(crate) fn on_open(
        &self,
        generation: u64,
        writer: mpsc::Sender<tungstenite::Message>,
    ) -> bool {
        let mut shared = self.lock();
        if !shared.is_current(generation) {
            return false;
        }
        shared.backoff.reset();

        let mut flushed = 0usize;
        while let Some(text) = shared.queue.pop_front() {
            if writer
                .try_send(tungstenite::Message::Text(text.clone().into()))
                .is_err()
            {
                shared.queue.push_front(text);
                self.backlog.notify_one();
                break;
            }
            flushed += 1;
        }

        shared.writer = Some(writer);
        self.publish(ConnectionState::Connected);
        info!(flushed, pending = shared.queue.len(), generation, "connected");
        true
    }

    /// Moves queued frames onto `writer` as it frees up, oldest first.
    ///
    /// Waits for a backlog signal, then drains until the queue is empty.
    /// Cancel-safe: a frame leaves the queue only together with a reserved
    /// writer slot.
    pub(crate) async fn drain_backlog(
        &self,
        generation: u64,
        writer: &mpsc::Sender<tungstenite::Message>,
    ) {
        self.backlog.notified().await;
        loop {
            let Ok(permit) = writer.reserve().await else {
                return;
            };
            let mut shared = self.lock();
            if !shared.is_current(generation) {
                return;
            }
            let Some(text) = shared.queue.pop_front() else {
                return;
            };
            permit.send(tungstenite::Message::Text(text.into()));
        }
    }

    /// Transport gone: stop routing outbound frames to it.
    pub(crate) fn on_close(&self, generation: u64) {
        let mut shared = self.lock();
        if shared.is_current(generation) {
            shared.writer = None;
        }
    }

    /// Routes an inbound frame to the handlers registered for its type.
    ///
    /// Handlers run without the lock held, on a snapshot of the list, so they
    /// may call back into the manager.
    pub(crate) fn dispatch(&self, generation: u64, frame: Frame) {
        let handlers = {
            let shared = self.lock();
            if !shared.is_current(generation) {
                return;
            }
            shared.registry.snapshot(&frame.event_type)
        };
        if handlers.is_empty() {
            trace!(event_type = %frame.event_type, "no handlers, ignoring frame");
            return;
        }
        for handler in handlers {
            handler(&frame.payload);
        }
    }

    /// Sends a serialized frame now, or queues it.
    ///
    /// Frames are queued while disconnected, while the writer is full, and
    /// while earlier frames are still queued, so order is kept and the queue
    /// bound applies in every state.
    fn send_text(&self, text: String) {
        let mut shared = self.lock();
        if let Some(writer) = &shared.writer {
            if shared.queue.is_empty() {
                match writer.try_send(tungstenite::Message::Text(text.clone().into())) {
                    Ok(()) => return,
                    Err(TrySendError::Full(_)) => {
                        debug!("transport writer full, queueing frame");
                        self.backlog.notify_one();
                    }
                    Err(TrySendError::Closed(_)) => debug!("transport writer gone, queueing frame"),
                }
            } else {
                self.backlog.notify_one();
            }
        }
        if shared.queue.push(text).is_some() {
            warn!(capacity = self.config.queue.capacity, "outbound queue full, dropped a frame");
            self.emit(ConnectionEvent::QueueOverflow { dropped: 1 });
        }
    }
}

/// Connection manager for the chat server's event stream.
///
/// Cheap to clone; clones share one connection. Construct it once at the
/// application's composition point and hand clones to whoever needs it.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a new, disconnected manager.
    pub fn new(config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Shared {
            credential: None,
            writer: None,
            queue: OutboundQueue::new(config.queue.capacity, config.queue.overflow),
            registry: HandlerRegistry::default(),
            backoff: Backoff::new(config.reconnect.clone()),
            session: None,
            next_generation: 0,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                shared: Mutex::new(shared),
                state_tx,
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                backlog: Notify::new(),
            }),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.inner
            .events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribes to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Number of frames waiting for a connection.
    pub fn queued_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Reconnects scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().backoff.attempts()
    }

    /// Connects with `credential`, reconnecting automatically until
    /// [`disconnect`](Self::disconnect) or the attempt budget runs out.
    ///
    /// Does nothing if a transport is already open, apart from remembering
    /// the credential for later reconnects. A pending connect or reconnect is
    /// replaced by a fresh session with a reset attempt counter.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, credential: &str) {
        let mut shared = self.inner.lock();
        shared.credential = Some(credential.to_string());
        if shared.writer.is_some() {
            debug!("already connected");
            return;
        }

        if let Some(old) = shared.session.take() {
            debug!(generation = old.generation, "superseding pending session");
            old.cancel.cancel();
        }
        shared.backoff.reset();

        let generation = shared.next_generation;
        shared.next_generation += 1;
        let cancel = CancellationToken::new();
        shared.session = Some(Session {
            generation,
            cancel: cancel.clone(),
        });
        drop(shared);

        tokio::spawn(run_session(self.inner.clone(), generation, cancel));
    }

    /// Closes the connection and stops reconnecting. Safe to call in any state.
    pub fn disconnect(&self) {
        let mut shared = self.inner.lock();
        shared.backoff.exhaust();
        shared.writer = None;
        if let Some(session) = shared.session.take() {
            session.cancel.cancel();
            debug!(generation = session.generation, "disconnected");
        }
        self.inner.publish(ConnectionState::Disconnected);
    }

    /// Registers `handler` for frames of `event_type`.
    pub fn on<F>(&self, event_type: impl AsRef<str>, handler: F) -> HandlerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.on_handler(event_type, Arc::new(handler))
    }

    /// Registers a shared handler. Registering the same one twice makes it
    /// fire twice per event.
    pub fn on_handler(&self, event_type: impl AsRef<str>, handler: Handler) -> HandlerId {
        self.inner.lock().registry.add(event_type.as_ref(), handler)
    }

    /// Registers a handler receiving the payload decoded as `T`. Payloads that
    /// fail to decode are logged and skipped.
    pub fn on_typed<T, F>(&self, msg_type: MessageType, handler: F) -> HandlerId
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on(msg_type, move |payload: &serde_json::Value| {
            match T::deserialize(payload) {
                Ok(value) => handler(value),
                Err(e) => warn!(event_type = %msg_type, "failed to decode payload: {e}"),
            }
        })
    }

    /// Removes one registration. Returns `false` if it was not registered.
    pub fn off(&self, event_type: impl AsRef<str>, id: HandlerId) -> bool {
        self.inner.lock().registry.remove(event_type.as_ref(), id)
    }

    /// Number of handlers registered for `event_type`, duplicates included.
    pub fn handler_count(&self, event_type: impl AsRef<str>) -> usize {
        self.inner.lock().registry.count(event_type.as_ref())
    }

    /// Removes every registration of `handler` for `event_type`.
    pub fn off_handler(&self, event_type: impl AsRef<str>, handler: &Handler) -> bool {
        self.inner
            .lock()
            .registry
            .remove_handler(event_type.as_ref(), handler)
    }

    /// Sends a chat message to a user (DM) or a group.
    pub fn send_message(&self, content: &str, target_id: &str, conversation_type: ConversationType) {
        self.send_event(&OutboundEvent::SendMessage(SendMessagePayload::new(
            content,
            target_id,
            conversation_type,
        )));
    }

    /// Signals that the user started or stopped typing.
    pub fn send_typing(&self, target_id: &str, conversation_type: ConversationType, is_typing: bool) {
        let target = TypingTarget {
            conversation_type,
            target_id: target_id.to_string(),
        };
        let event = if is_typing {
            OutboundEvent::TypingStart(target)
        } else {
            OutboundEvent::TypingStop(target)
        };
        self.send_event(&event);
    }

    /// Acknowledges delivery of a message.
    pub fn mark_delivered(&self, message_id: &str) {
        self.send_event(&OutboundEvent::MessageDelivered(MessageRef {
            message_id: message_id.to_string(),
        }));
    }

    /// Sends any outbound event. Fire-and-forget: the frame is transmitted
    /// now if connected, otherwise queued for the next open.
    pub fn send_event(&self, event: &OutboundEvent) {
        let text = match event.to_frame().and_then(|f| f.to_json()) {
            Ok(t) => t,
            Err(e) => {
                warn!(event_type = %event.msg_type(), "failed to serialize event: {e}");
                return;
            }
        };
        self.inner.send_text(text);
    }
}
