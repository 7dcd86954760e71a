//! Socket session: one live connection handle plus the envelope protocol.
//!
//! ```text
//! Disconnected --connect--> Connecting --Opened--> Open --Closed--> Closed
//!                               |                    |
//!                               +------Error---------+--> Error
//! ```
//!
//! Transitions are driven only by transport events, dispatched in the order
//! the transport emitted them. Callers observe them through the listeners
//! passed to [`SocketSession::connect`] (or [`SocketSession::state_changes`]).
//! Nothing is retried, buffered or reconnected automatically.

pub mod address;
pub mod transport;
pub mod tungstenite;

pub use address::{resolve_endpoint, socket_scheme};
pub use transport::{
    CloseInfo, ConnectionId, EventSender, Link, SessionEvents, Transport, TransportError, TransportEvent,
};
pub use tungstenite::TungsteniteTransport;

use crate::dataflow::Relay;
use crate::error::{ToolkitError, ToolkitResult};
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use serde_json::{Map, Value};
use shared::{SocketMessage, SocketSection};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tokio_tungstenite::tungstenite::http::Uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    Error,
}

impl SocketState {
    fn after(self, event: &TransportEvent) -> SocketState {
        use SocketState::*;
        match (self, event) {
            (Connecting, TransportEvent::Opened) => Open,
            (Connecting | Open, TransportEvent::Closed(_)) => Closed,
            (Connecting | Open, TransportEvent::Error(_)) => Error,
            (state, _) => state,
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, SocketState::Closed | SocketState::Error)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketState::Disconnected => "disconnected",
            SocketState::Connecting => "connecting",
            SocketState::Open => "open",
            SocketState::Closed => "closed",
            SocketState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Formats `{type, ...payload}` for the wire. Transmits nothing.
pub fn build_envelope(kind: &str, payload: Map<String, Value>) -> ToolkitResult<String> {
    Ok(SocketMessage::new(kind, payload).to_wire()?)
}

/// Caller callbacks bound to one connection handle.
#[derive(Default)]
pub struct SocketListeners {
    on_open: Option<Box<dyn FnMut()>>,
    on_close: Option<Box<dyn FnMut(&CloseInfo)>>,
    on_message: Option<Box<dyn FnMut(&str)>>,
    on_error: Option<Box<dyn FnMut(&str)>>,
}

impl SocketListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, listener: impl FnMut() + 'static) -> Self {
        self.on_open = Some(Box::new(listener));
        self
    }

    pub fn on_close(mut self, listener: impl FnMut(&CloseInfo) + 'static) -> Self {
        self.on_close = Some(Box::new(listener));
        self
    }

    /// Receives inbound frames verbatim.
    pub fn on_message(mut self, listener: impl FnMut(&str) + 'static) -> Self {
        self.on_message = Some(Box::new(listener));
        self
    }

    pub fn on_error(mut self, listener: impl FnMut(&str) + 'static) -> Self {
        self.on_error = Some(Box::new(listener));
        self
    }

    fn notify(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if let Some(listener) = self.on_open.as_mut() {
                    listener();
                }
            }
            TransportEvent::Message(text) => {
                if let Some(listener) = self.on_message.as_mut() {
                    listener(text);
                }
            }
            TransportEvent::Closed(info) => {
                if let Some(listener) = self.on_close.as_mut() {
                    listener(info);
                }
            }
            TransportEvent::Error(error) => {
                if let Some(listener) = self.on_error.as_mut() {
                    listener(error);
                }
            }
        }
    }
}

struct ConnectionHandle {
    id: ConnectionId,
    endpoint: Uri,
    link: Box<dyn Link>,
    // Taken out while a listener runs so callbacks can re-enter the session
    listeners: Option<SocketListeners>,
}

struct SessionInner {
    config: SocketSection,
    transport: Box<dyn Transport>,
    events_tx: UnboundedSender<(ConnectionId, TransportEvent)>,
    state: SocketState,
    handle: Option<ConnectionHandle>,
    last_connection: u64,
    state_changed_relay: Relay<SocketState>,
}

impl SessionInner {
    fn set_state(&mut self, next: SocketState) {
        if self.state != next {
            log::debug!("Socket state {} -> {}", self.state, next);
            self.state = next;
            self.state_changed_relay.send(next);
        }
    }

    fn release_handle(&mut self) {
        if let Some(mut old) = self.handle.take() {
            old.link.close();
            log::debug!("Released socket {} ({})", old.id, old.endpoint);
        }
    }

    fn current_id(&self) -> Option<ConnectionId> {
        self.handle.as_ref().map(|handle| handle.id)
    }
}

/// Owns at most one live connection handle. Cloning shares the session; use
/// [`SocketSession::downgrade`] inside listeners to avoid reference cycles.
#[derive(Clone)]
pub struct SocketSession {
    inner: Rc<RefCell<SessionInner>>,
}

#[derive(Clone)]
pub struct WeakSocketSession {
    inner: Weak<RefCell<SessionInner>>,
}

impl WeakSocketSession {
    pub fn upgrade(&self) -> Option<SocketSession> {
        self.inner.upgrade().map(|inner| SocketSession { inner })
    }
}

impl SocketSession {
    /// Creates a disconnected session. Feed the returned event stream back
    /// into [`dispatch`](Self::dispatch) (or [`drive_until`](Self::drive_until)).
    pub fn new(config: SocketSection, transport: impl Transport + 'static) -> (Self, SessionEvents) {
        let (events_tx, events_rx) = unbounded();
        let session = Self {
            inner: Rc::new(RefCell::new(SessionInner {
                config,
                transport: Box::new(transport),
                events_tx,
                state: SocketState::Disconnected,
                handle: None,
                last_connection: 0,
                state_changed_relay: Relay::default(),
            })),
        };
        (session, events_rx)
    }

    pub fn downgrade(&self) -> WeakSocketSession {
        WeakSocketSession {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn state(&self) -> SocketState {
        self.inner.borrow().state
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.borrow().current_id()
    }

    pub fn endpoint(&self) -> Option<Uri> {
        self.inner
            .borrow()
            .handle
            .as_ref()
            .map(|handle| handle.endpoint.clone())
    }

    /// Stream of every state the session moves into.
    pub fn state_changes(&self) -> UnboundedReceiver<SocketState> {
        self.inner.borrow_mut().state_changed_relay.subscribe()
    }

    /// Opens a new handle to `path`, first releasing the previous one: its
    /// listeners are dropped, its link asked to close, and its late events
    /// ignored.
    ///
    /// If the transport refuses synchronously the session moves to `Error`
    /// and the failure is returned instead of reported to listeners.
    pub fn connect(&self, path: &str, listeners: SocketListeners) -> ToolkitResult<ConnectionId> {
        let mut inner = self.inner.borrow_mut();
        let endpoint = resolve_endpoint(&inner.config.page_scheme, &inner.config.host, path)?;

        inner.release_handle();
        inner.last_connection += 1;
        let id = ConnectionId(inner.last_connection);
        let sender = EventSender::new(id, inner.events_tx.clone());

        let link = match inner.transport.open(&endpoint, sender) {
            Ok(link) => link,
            Err(error) => {
                log::warn!("Socket {} could not open {}: {}", id, endpoint, error);
                inner.set_state(SocketState::Error);
                return Err(error.into());
            }
        };

        log::info!("Connecting socket {} to {}", id, endpoint);
        inner.handle = Some(ConnectionHandle {
            id,
            endpoint,
            link,
            listeners: Some(listeners),
        });
        inner.set_state(SocketState::Connecting);
        Ok(id)
    }

    /// Applies one transport event. Events from released handles are dropped.
    pub fn dispatch(&self, (id, event): (ConnectionId, TransportEvent)) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.current_id() != Some(id) {
                log::debug!("Ignoring {:?} from released socket {}", event, id);
                return;
            }
            let next = inner.state.after(&event);
            inner.set_state(next);
            inner
                .handle
                .as_mut()
                .and_then(|handle| handle.listeners.take())
        };

        let Some(mut listeners) = listeners else {
            log::debug!("Socket {} event {:?} arrived inside its own listener", id, event);
            return;
        };
        listeners.notify(&event);

        let mut inner = self.inner.borrow_mut();
        if let Some(handle) = inner.handle.as_mut().filter(|handle| handle.id == id) {
            handle.listeners = Some(listeners);
        }
    }

    /// Dispatches everything already queued without waiting. Returns how many
    /// events were applied.
    pub fn dispatch_pending(&self, events: &mut SessionEvents) -> usize {
        let mut applied = 0;
        while let Ok(Some(event)) = events.try_next() {
            self.dispatch(event);
            applied += 1;
        }
        applied
    }

    /// Dispatches events until `done` holds for the session state.
    pub async fn drive_until(
        &self,
        events: &mut SessionEvents,
        done: impl Fn(SocketState) -> bool,
    ) -> SocketState {
        loop {
            let state = self.state();
            if done(state) {
                return state;
            }
            match events.next().await {
                Some(event) => self.dispatch(event),
                None => return self.state(),
            }
        }
    }

    pub async fn drive_until_closed(&self, events: &mut SessionEvents) -> SocketState {
        self.drive_until(events, SocketState::is_settled).await
    }

    /// Sends `{type, ...payload}` over the live handle and returns the text
    /// that went out. Fails with `NotConnected` unless the session is `Open`;
    /// nothing is queued for later.
    pub fn send(&self, kind: &str, payload: Map<String, Value>) -> ToolkitResult<String> {
        self.send_message(&SocketMessage::new(kind, payload))
    }

    pub fn send_message(&self, message: &SocketMessage) -> ToolkitResult<String> {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        if state != SocketState::Open {
            return Err(ToolkitError::NotConnected { state });
        }
        let handle = inner
            .handle
            .as_mut()
            .ok_or(ToolkitError::NotConnected { state })?;

        let wire = message.to_wire()?;
        handle.link.transmit(wire.clone())?;
        log::trace!("Socket {} sent {}", handle.id, wire);
        Ok(wire)
    }

    /// Asks the live link to close. The `Closed` transition still comes from
    /// the transport, so a caller-side timeout can call this and keep driving.
    pub fn close(&self) {
        if let Some(handle) = self.inner.borrow_mut().handle.as_mut() {
            log::info!("Closing socket {}", handle.id);
            handle.link.close();
        }
    }
}

impl fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SocketSession")
            .field("state", &inner.state)
            .field("connection", &inner.current_id())
            .finish()
    }
}
