//! WebSocket transport implementation
//!
//! Blocking handshake, then a non-blocking socket that the session polls
//! once per tick. TLS comes from tungstenite's native-tls support.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, WebSocket};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportEvent};

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// TCP connect timeout per resolved address
    pub connect_timeout: Duration,
    /// Upper bound on events returned per inbound burst before yielding
    pub max_pending_events: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_pending_events: 32,
        }
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// WebSocket transport
pub struct WebSocketTransport {
    config: WebSocketConfig,
    socket: Option<Socket>,
    pending: VecDeque<TransportEvent>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::with_config(WebSocketConfig::default())
    }

    pub fn with_config(config: WebSocketConfig) -> Self {
        Self {
            config,
            socket: None,
            pending: VecDeque::new(),
        }
    }

    fn open(&self, endpoint: &Endpoint) -> Result<Socket> {
        let addrs = (endpoint.host(), endpoint.port()).to_socket_addrs()?;

        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!("TCP connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        let stream = match (stream, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) => return Err(TransportError::ConnectionFailed(e.to_string())),
            (None, None) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "{} did not resolve",
                    endpoint.host()
                )))
            }
        };
        stream.set_nodelay(true)?;

        let url = endpoint.to_string();
        let (mut socket, response) = tungstenite::client_tls(url.as_str(), stream).map_err(|e| match e {
            HandshakeError::Failure(e) => TransportError::from(e),
            HandshakeError::Interrupted(_) => {
                TransportError::ConnectionFailed("handshake interrupted".to_string())
            }
        })?;
        debug!("WebSocket handshake complete, status {}", response.status());

        set_nonblocking(&mut socket)?;
        Ok(socket)
    }

    fn close_with(&mut self, reason: Option<String>) -> TransportEvent {
        self.socket = None;
        info!("WebSocket closed: {:?}", reason);
        TransportEvent::Disconnected { reason }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn set_nonblocking(socket: &mut Socket) -> Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(s) => s.set_nonblocking(true)?,
        MaybeTlsStream::NativeTls(s) => s.get_mut().set_nonblocking(true)?,
        _ => warn!("unknown stream type, leaving socket blocking"),
    }
    Ok(())
}

fn would_block(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if io.kind() == ErrorKind::WouldBlock)
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        if self.socket.is_some() {
            self.disconnect();
        }
        info!("Connecting to WebSocket: {}", endpoint);

        let socket = self.open(endpoint)?;
        self.socket = Some(socket);
        self.pending.push_back(TransportEvent::Connected);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.pending.clear();
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None) {
                trace!("close frame not sent: {}", e);
            }
            if let Err(e) = socket.flush() {
                trace!("close frame not flushed: {}", e);
            }
            debug!("WebSocket disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket.as_mut().ok_or(TransportError::NotConnected)?;
        let text = std::str::from_utf8(data).map_err(|e| TransportError::SendFailed(e.to_string()))?;

        match socket.send(WsMessage::Text(text.to_owned())) {
            Ok(()) => Ok(()),
            // Frame is buffered; the next poll flushes it
            Err(ref e) if would_block(e) => Ok(()),
            Err(e) => {
                warn!("WebSocket send error: {}", e);
                let event = self.close_with(Some(e.to_string()));
                self.pending.push_back(event);
                Err(e.into())
            }
        }
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        let socket = self.socket.as_mut()?;

        if let Err(e) = socket.flush() {
            if !would_block(&e) {
                return Some(self.close_with(Some(e.to_string())));
            }
        }

        for _ in 0..self.config.max_pending_events {
            let socket = self.socket.as_mut()?;
            match socket.read() {
                Ok(WsMessage::Text(text)) => return Some(TransportEvent::Data(Bytes::from(text))),
                Ok(WsMessage::Binary(data)) => return Some(TransportEvent::Data(Bytes::from(data))),
                Ok(WsMessage::Close(frame)) => {
                    let reason = frame.map(|f| f.reason.to_string());
                    return Some(self.close_with(reason));
                }
                // Pongs are queued by tungstenite and go out with the next flush
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => continue,
                Err(ref e) if would_block(e) => return None,
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    return Some(self.close_with(None));
                }
                Err(e) => return Some(self.close_with(Some(e.to_string()))),
            }
        }
        None
    }
}
