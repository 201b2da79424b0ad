//! Duplex client abstraction: keepalive, bounded outbound queue, graceful
//! close.
//!
//! Grounded on `game/client.go`. The original's `Client` is a thin wrapper
//! bundling a `*websocket.Conn` with a writer goroutine; here that becomes a
//! `Client` (the write half: outbound queue + writer task) paired with a
//! `ClientReader<St>` (the read half), mirroring the split the teacher
//! itself performs on its `axum::extract::ws::WebSocket` via
//! `futures::StreamExt::split`. Both halves are generic over a small
//! `WireSink`/`WireStream` pair of async traits rather than axum types
//! directly, so the game actor and its read loops never depend on axum, and
//! tests can drive them with an in-memory fake.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{Error, Result};

/// Time between keepalive pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);
/// Maximum time allowed waiting for a keepalive pong before the read side
/// considers the connection dead.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// A transport-agnostic view of one inbound or outbound WebSocket-like
/// frame. `Ping`/`Pong` never reach application code as a "message" — they
/// are consumed by the keepalive machinery.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Text(String),
    Binary,
    Ping,
    Pong,
    Close,
}

#[derive(Debug)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// The outbound half of a transport: whatever can have a [`WireMessage`]
/// written to it.
pub trait WireSink: Send + 'static {
    async fn send(&mut self, msg: WireMessage) -> std::result::Result<(), TransportError>;
}

/// The inbound half of a transport: whatever can yield the next
/// [`WireMessage`], or `None` on clean stream end.
pub trait WireStream: Send + 'static {
    async fn recv(&mut self) -> Option<std::result::Result<WireMessage, TransportError>>;
}

enum WriterCmd {
    Text(String),
    Close(String),
}

/// The write half of a client connection: a handle to its bounded outbound
/// queue and cancellation token. Cheap to hold inside a `Player`/`Host`
/// record and to call into from the game actor.
#[derive(Clone)]
pub struct Client {
    outbound: mpsc::Sender<WriterCmd>,
    pub token: CancellationToken,
}

impl Client {
    /// Spawns the writer task owning `sink` and returns the `Client` handle.
    /// Matches the original's `Open()`: installs the ping ticker and hands
    /// the transport to a dedicated task so no other code ever touches it
    /// directly again.
    pub fn open<Si>(sink: Si, token: CancellationToken) -> Client
    where
        Si: WireSink,
    {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(writer_task(sink, rx, token.clone()));
        Client { outbound: tx, token }
    }

    /// Enqueues a raw wire frame, aborting rather than blocking forever if
    /// the client's context is cancelled first.
    pub async fn send(&self, msg: String) {
        tokio::select! {
            _ = self.outbound.send(WriterCmd::Text(msg)) => {}
            _ = self.token.cancelled() => {}
        }
    }

    /// Formats `body` via [`codec::format`] and sends it.
    pub async fn send_message<T: Serialize>(&self, verb: &str, body: Option<&T>) {
        self.send(codec::format(verb, body)).await;
    }

    /// Sends a frame whose body is a pre-built [`serde_json::Value`].
    pub async fn send_value(&self, verb: &str, body: &serde_json::Value) {
        self.send(codec::format_value(verb, body)).await;
    }

    /// Gracefully tears down the connection with a close frame carrying
    /// `reason`.
    pub async fn close_reason(&self, reason: impl Into<String>) {
        let _ = self.outbound.send(WriterCmd::Close(reason.into())).await;
    }

    /// `close_reason` with the generic reason `"game over"`.
    pub async fn close(&self) {
        self.close_reason("game over").await;
    }
}

async fn writer_task<Si>(mut sink: Si, mut rx: mpsc::Receiver<WriterCmd>, token: CancellationToken)
where
    Si: WireSink,
{
    let mut ticker = tokio::time::interval(PING_INTERVAL);
    ticker.tick().await; // first tick fires immediately; discard it

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(WriterCmd::Text(s)) => {
                        if sink.send(WireMessage::Text(s)).await.is_err() {
                            token.cancel();
                            return;
                        }
                    }
                    Some(WriterCmd::Close(_reason)) => {
                        let _ = sink.send(WireMessage::Close).await;
                        return;
                    }
                    None => return,
                }
            }
            _ = ticker.tick() => {
                if sink.send(WireMessage::Ping).await.is_err() {
                    token.cancel();
                    return;
                }
            }
            _ = token.cancelled() => {
                let _ = sink.send(WireMessage::Close).await;
                return;
            }
        }
    }
}

/// The read half of a client connection. Holds the keepalive deadline
/// state; every call to [`Self::read_string`]/[`Self::read_message`]
/// extends the deadline on a pong and transparently skips ping/pong frames.
pub struct ClientReader<St> {
    stream: St,
    last_pong: Instant,
}

impl<St> ClientReader<St>
where
    St: WireStream,
{
    pub fn new(stream: St) -> ClientReader<St> {
        ClientReader { stream, last_pong: Instant::now() }
    }

    fn deadline(&self) -> Instant {
        self.last_pong + PING_INTERVAL + PONG_TIMEOUT
    }

    /// Blocks for the next data frame, returning its verb and raw JSON
    /// payload text. Ping/pong frames are consumed transparently; a pong
    /// extends the read deadline.
    pub async fn read_string(&mut self) -> Result<(String, String)> {
        loop {
            let frame = match tokio::time::timeout_at(self.deadline(), self.stream.recv()).await {
                Err(_elapsed) => return Err(Error::ConnectionClosed),
                Ok(None) => return Err(Error::ConnectionClosed),
                Ok(Some(Err(_))) => return Err(Error::ConnectionClosed),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                WireMessage::Pong => {
                    self.last_pong = Instant::now();
                    continue;
                }
                WireMessage::Ping => continue,
                WireMessage::Close => return Err(Error::ConnectionClosed),
                WireMessage::Binary => return Err(Error::BadMessageType),
                WireMessage::Text(s) => {
                    let (verb, data) = codec::parse(&s)?;
                    return Ok((verb.to_string(), data.to_string()));
                }
            }
        }
    }

    /// Like [`Self::read_string`], additionally JSON-decoding the payload
    /// into `T`.
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> Result<(String, T)> {
        let (verb, data) = self.read_string().await?;
        let body = serde_json::from_str(&data).map_err(Error::DataSyntax)?;
        Ok((verb, body))
    }

    /// Reads a single frame bounded by `timeout`, used by the two-phase
    /// player-connect handshake so a slow client never stalls the actor.
    pub async fn read_string_timeout(&mut self, timeout: Duration) -> Result<(String, String)> {
        match tokio::time::timeout(timeout, self.read_string()).await {
            Ok(res) => res,
            Err(_) => Err(Error::HandshakeTimeout),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::pair;
    use super::*;

    #[tokio::test]
    async fn send_and_read_round_trip() {
        let (sink, mut observed, stream, inbound) = pair();
        let token = CancellationToken::new();
        let client = Client::open(sink, token.clone());
        let mut reader = ClientReader::new(stream);

        client.send_message("ques", Some(&serde_json::json!({"n": 1}))).await;
        let sent = observed.recv().await.unwrap();
        assert_eq!(sent, WireMessage::Text("ques {\"n\":1}".to_string()));

        inbound.send(WireMessage::Text("ans {\"n\":2}".to_string())).unwrap();
        let (verb, data) = reader.read_string().await.unwrap();
        assert_eq!(verb, "ans");
        assert_eq!(data, "{\"n\":2}");
    }

    #[tokio::test]
    async fn pong_frames_are_swallowed() {
        let (_sink, _observed, stream, inbound) = pair();
        let mut reader = ClientReader::new(stream);

        inbound.send(WireMessage::Pong).unwrap();
        inbound.send(WireMessage::Text("ack ".to_string())).unwrap();

        let (verb, _) = reader.read_string().await.unwrap();
        assert_eq!(verb, "ack");
    }

    #[tokio::test]
    async fn binary_frame_is_rejected() {
        let (_sink, _observed, stream, inbound) = pair();
        let mut reader = ClientReader::new(stream);

        inbound.send(WireMessage::Binary).unwrap();
        let err = reader.read_string().await.unwrap_err();
        assert!(matches!(err, Error::BadMessageType));
    }

    #[tokio::test]
    async fn close_frame_is_connection_closed() {
        let (_sink, _observed, stream, inbound) = pair();
        let mut reader = ClientReader::new(stream);

        inbound.send(WireMessage::Close).unwrap();
        let err = reader.read_string().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn close_reason_sends_close_frame() {
        let (sink, mut observed, _stream, _inbound) = pair();
        let token = CancellationToken::new();
        let client = Client::open(sink, token);

        client.close_reason("bye").await;
        let frame = observed.recv().await.unwrap();
        assert_eq!(frame, WireMessage::Close);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (_sink, _observed, stream, inbound) = pair();
        let mut reader = ClientReader::new(stream);

        let filler = "a".repeat(crate::codec::MAX_MESSAGE_SIZE);
        inbound.send(WireMessage::Text(format!("ans {filler}"))).unwrap();

        let err = reader.read_string().await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge));
    }

    #[tokio::test]
    async fn handshake_timeout_fires_when_nothing_arrives() {
        let (_sink, _observed, stream, _inbound) = pair();
        let mut reader = ClientReader::new(stream);

        let err = reader.read_string_timeout(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, Error::HandshakeTimeout));
    }
}
