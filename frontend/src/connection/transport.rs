//! Seam between the session state machine and whatever moves bytes.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use std::fmt;
use tokio_tungstenite::tungstenite::http::Uri;

/// Identity of one handle; replaced on every `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

/// What a transport reports about its socket, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed(CloseInfo),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,
    #[error("{0}")]
    Failed(String),
}

/// Ordered stream of events for every handle a session ever opened.
pub type SessionEvents = UnboundedReceiver<(ConnectionId, TransportEvent)>;

/// Given to a transport when it opens a socket; tags every event with the
/// handle it belongs to.
#[derive(Debug, Clone)]
pub struct EventSender {
    connection: ConnectionId,
    sender: UnboundedSender<(ConnectionId, TransportEvent)>,
}

impl EventSender {
    pub(crate) fn new(
        connection: ConnectionId,
        sender: UnboundedSender<(ConnectionId, TransportEvent)>,
    ) -> Self {
        Self { connection, sender }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Returns false once the session is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sender.unbounded_send((self.connection, event)).is_ok()
    }
}

/// Opens sockets. Opening must not block; progress is reported through the
/// [`EventSender`].
pub trait Transport {
    fn open(&mut self, endpoint: &Uri, events: EventSender) -> Result<Box<dyn Link>, TransportError>;
}

/// The live half of one opened socket.
pub trait Link {
    fn transmit(&mut self, text: String) -> Result<(), TransportError>;

    /// Requests a close; the transport reports `Closed` when it completes.
    fn close(&mut self);
}
