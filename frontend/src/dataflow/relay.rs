//! Event streaming Relay
//!
//! Relay pushes state changes out of toolkit components over an unbounded
//! channel, so views observe updates as a stream instead of polling getters.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::sync::{Arc, OnceLock};

/// Type-safe event stream with exactly one subscriber at a time.
///
/// # Event-Source Naming Convention
///
/// Relays follow the `{source}_{event}_relay` pattern:
/// - `selection_changed_relay` - a position was toggled
/// - `visibility_changed_relay` - a dropdown opened or closed
/// - `state_changed_relay` - a socket moved to a new state
///
/// # Examples
///
/// ```rust
/// use frontend::dataflow::relay;
/// use futures::StreamExt;
///
/// let (selection_changed_relay, mut stream) = relay::<Vec<usize>>();
/// selection_changed_relay.send(vec![2, 0]);
///
/// # futures::executor::block_on(async {
/// assert_eq!(stream.next().await, Some(vec![2, 0]));
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    sender: UnboundedSender<T>,
    #[cfg(debug_assertions)]
    emit_location: Arc<OnceLock<&'static std::panic::Location<'static>>>,
}

#[derive(Debug, Clone)]
pub enum RelayError {
    /// The subscriber dropped its stream
    ChannelClosed,
    /// Relay sent from more than one code location (debug builds only)
    #[cfg(debug_assertions)]
    MultipleEmitters {
        previous: &'static std::panic::Location<'static>,
        current: &'static std::panic::Location<'static>,
    },
}

impl<T> Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded();
        (
            Relay {
                sender,
                #[cfg(debug_assertions)]
                emit_location: Arc::new(OnceLock::new()),
            },
            receiver,
        )
    }

    /// Replaces the subscriber. The previous stream ends once its buffered
    /// events are drained.
    pub fn subscribe(&mut self) -> UnboundedReceiver<T> {
        let (relay, receiver) = Self::new();
        *self = relay;
        receiver
    }

    #[cfg(debug_assertions)]
    #[track_caller]
    fn check_single_source(&self) -> Result<(), RelayError> {
        let caller = std::panic::Location::caller();
        match self.emit_location.set(caller) {
            Ok(()) => Ok(()),
            Err(previous) if previous == caller => Ok(()),
            Err(previous) => Err(RelayError::MultipleEmitters {
                previous,
                current: caller,
            }),
        }
    }

    /// Sends an event; silently dropped when nobody is subscribed.
    ///
    /// Debug builds panic when the same relay is fed from two call sites.
    #[track_caller]
    pub fn send(&self, value: T) {
        #[cfg(debug_assertions)]
        if let Err(e) = self.check_single_source() {
            panic!("{:?}", e);
        }

        let _ = self.sender.unbounded_send(value);
    }

    #[track_caller]
    pub fn try_send(&self, value: T) -> Result<(), RelayError> {
        #[cfg(debug_assertions)]
        self.check_single_source()?;

        self.sender
            .unbounded_send(value)
            .map_err(|_| RelayError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> Default for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A relay with no subscriber; events are discarded until `subscribe`.
    fn default() -> Self {
        let (relay, _receiver) = Self::new();
        relay
    }
}

pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Clone + Send + Sync + 'static,
{
    Relay::new()
}
