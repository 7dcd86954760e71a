//! Native socket transport on tokio-tungstenite.
//!
//! Each opened socket runs in its own tokio task. Outbound frames reach the
//! task over a channel; everything the socket does comes back as
//! [`TransportEvent`]s through the session's [`EventSender`].

use super::transport::{CloseInfo, EventSender, Link, Transport, TransportError, TransportEvent};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::Uri;

enum Outbound {
    Text(String),
    Close,
}

pub struct TungsteniteTransport {
    runtime: Handle,
}

impl TungsteniteTransport {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Uses the runtime the caller is running on.
    pub fn from_current() -> Result<Self, TransportError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|error| TransportError::Failed(format!("no tokio runtime: {}", error)))
    }
}

impl Transport for TungsteniteTransport {
    fn open(&mut self, endpoint: &Uri, events: EventSender) -> Result<Box<dyn Link>, TransportError> {
        let (outbound_tx, outbound_rx) = unbounded();
        let connection = events.connection();
        self.runtime
            .spawn(run_socket(endpoint.clone(), events, outbound_rx));
        log::debug!("Spawned socket task {} for {}", connection, endpoint);
        Ok(Box::new(TungsteniteLink {
            outbound: outbound_tx,
        }))
    }
}

struct TungsteniteLink {
    outbound: UnboundedSender<Outbound>,
}

impl Link for TungsteniteLink {
    fn transmit(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .unbounded_send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        let _ = self.outbound.unbounded_send(Outbound::Close);
    }
}

async fn run_socket(endpoint: Uri, events: EventSender, mut outbound: UnboundedReceiver<Outbound>) {
    let connecting = connect_async(endpoint.clone());
    tokio::pin!(connecting);

    // A close request or a released link must abort the handshake
    let (stream, _response) = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok(connected) => break connected,
                Err(error) => {
                    log::warn!("Socket {} failed to connect to {}: {}", events.connection(), endpoint, error);
                    events.emit(TransportEvent::Error(error.to_string()));
                    events.emit(TransportEvent::Closed(CloseInfo {
                        code: None,
                        reason: "connection failed".to_string(),
                    }));
                    return;
                }
            },
            command = outbound.next() => match command {
                Some(Outbound::Text(_)) => {
                    log::warn!("Socket {} dropped a frame sent before open", events.connection());
                }
                Some(Outbound::Close) | None => {
                    log::info!("Socket {} closed before open", events.connection());
                    events.emit(TransportEvent::Closed(CloseInfo {
                        code: None,
                        reason: "closed before open".to_string(),
                    }));
                    return;
                }
            },
        }
    };

    log::info!("Socket {} connected to {}", events.connection(), endpoint);
    events.emit(TransportEvent::Opened);

    let (mut ws_tx, mut ws_rx) = stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            command = outbound.next(), if !closing => {
                match command {
                    Some(Outbound::Text(text)) => {
                        if let Err(error) = ws_tx.send(Message::Text(text.into())).await {
                            log::warn!("Socket {} send failed: {}", events.connection(), error);
                            events.emit(TransportEvent::Error(error.to_string()));
                            break;
                        }
                    }
                    // The link is gone or asked to close; wait for the peer's close frame
                    Some(Outbound::Close) | None => {
                        closing = true;
                        if let Err(error) = ws_tx.send(Message::Close(None)).await {
                            log::debug!("Socket {} close frame not sent: {}", events.connection(), error);
                            events.emit(TransportEvent::Closed(CloseInfo {
                                code: None,
                                reason: error.to_string(),
                            }));
                            break;
                        }
                    }
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        events.emit(TransportEvent::Message(text.to_string()));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        events.emit(TransportEvent::Message(String::from_utf8_lossy(&bytes).into_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let info = frame
                            .map(|frame| CloseInfo {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.to_string(),
                            })
                            .unwrap_or_default();
                        log::info!("Socket {} closed ({:?})", events.connection(), info.code);
                        events.emit(TransportEvent::Closed(info));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        log::warn!("Socket {} error: {}", events.connection(), error);
                        events.emit(TransportEvent::Error(error.to_string()));
                        events.emit(TransportEvent::Closed(CloseInfo {
                            code: None,
                            reason: "transport error".to_string(),
                        }));
                        break;
                    }
                    None => {
                        events.emit(TransportEvent::Closed(CloseInfo::default()));
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{SocketListeners, SocketSession, SocketState};
    use serde_json::json;
    use shared::SocketSection;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Echo server that prefixes every text frame.
    async fn spawn_echo_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let reply = format!("echo:{}", text);
                    if ws.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
        });
        port
    }

    #[tokio::test]
    async fn round_trip_over_a_local_socket() {
        let port = spawn_echo_server().await;
        let config = SocketSection {
            host: format!("127.0.0.1:{}", port),
            page_scheme: "http".to_string(),
        };
        let (session, mut events) = SocketSession::new(config, TungsteniteTransport::from_current().unwrap());

        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        session
            .connect(
                "/ws/spiders/7",
                SocketListeners::new().on_message(move |text| sink.borrow_mut().push(text.to_string())),
            )
            .unwrap();

        let flow = async {
            let state = session
                .drive_until(&mut events, |state| state != SocketState::Connecting)
                .await;
            assert_eq!(state, SocketState::Open);

            let payload = json!({ "spiderId": 7 }).as_object().cloned().unwrap();
            session.send("run", payload).unwrap();
            while received.borrow().is_empty() {
                let event = events.next().await.unwrap();
                session.dispatch(event);
            }

            session.close();
            session.drive_until_closed(&mut events).await
        };
        let final_state = tokio::time::timeout(Duration::from_secs(10), flow).await.unwrap();

        assert_eq!(final_state, SocketState::Closed);
        assert_eq!(*received.borrow(), vec![r#"echo:{"type":"run","spiderId":7}"#]);
    }

    /// Accepts TCP connections and never answers the handshake.
    async fn spawn_silent_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        port
    }

    #[tokio::test]
    async fn close_during_handshake_ends_the_connection() {
        let port = spawn_silent_server().await;
        let config = SocketSection {
            host: format!("127.0.0.1:{}", port),
            page_scheme: "http".to_string(),
        };
        let (session, mut events) = SocketSession::new(config, TungsteniteTransport::from_current().unwrap());
        let reasons = Rc::new(RefCell::new(Vec::new()));
        let sink = reasons.clone();
        session
            .connect(
                "/ws",
                SocketListeners::new().on_close(move |info| sink.borrow_mut().push(info.reason.clone())),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(session.state(), SocketState::Connecting);
        session.close();

        let state = tokio::time::timeout(Duration::from_secs(3), session.drive_until_closed(&mut events))
            .await
            .unwrap();

        assert_eq!(state, SocketState::Closed);
        assert_eq!(*reasons.borrow(), vec!["closed before open"]);
    }

    #[tokio::test]
    async fn reconnect_during_handshake_stops_the_released_task() {
        let port = spawn_silent_server().await;
        let config = SocketSection {
            host: format!("127.0.0.1:{}", port),
            page_scheme: "http".to_string(),
        };
        let (session, mut events) = SocketSession::new(config, TungsteniteTransport::from_current().unwrap());
        let first = session.connect("/ws", SocketListeners::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = session.connect("/ws", SocketListeners::new()).unwrap();

        // the released handle reports its close, which the session ignores
        let (id, event) = tokio::time::timeout(Duration::from_secs(3), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, first);
        assert!(matches!(event, TransportEvent::Closed(_)));
        session.dispatch((id, event));

        assert_eq!(session.connection_id(), Some(second));
        assert_eq!(session.state(), SocketState::Connecting);
        session.close();
    }

    #[tokio::test]
    async fn refused_connection_reports_error() {
        // bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = SocketSection {
            host: format!("127.0.0.1:{}", port),
            page_scheme: "http".to_string(),
        };
        let (session, mut events) = SocketSession::new(config, TungsteniteTransport::from_current().unwrap());
        let errors = Rc::new(RefCell::new(0));
        let sink = errors.clone();
        session
            .connect("/ws", SocketListeners::new().on_error(move |_| *sink.borrow_mut() += 1))
            .unwrap();

        let state = tokio::time::timeout(Duration::from_secs(10), session.drive_until_closed(&mut events))
            .await
            .unwrap();

        assert_eq!(state, SocketState::Error);
        assert_eq!(*errors.borrow(), 1);
    }
}
