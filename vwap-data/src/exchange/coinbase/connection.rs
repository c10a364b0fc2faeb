use super::message::{CoinbaseSubscription, MatchMessage};
use crate::{
    config::FeedConfig,
    error::DataError,
    signal::{Completion, CompletionListener, completion},
    streams::timeout::TimeoutStream,
};
use derive_more::Display;
use futures::{
    SinkExt, Stream, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError, Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, warn};
use url::Url;

/// Convenient type alias for a tungstenite `WebSocketStream` over TCP, optionally TLS.
pub type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a [`WebSocket`].
pub type WsSink = SplitSink<WebSocket, Message>;

/// Read half of a [`WebSocket`].
pub type WsReader = SplitStream<WebSocket>;

/// Lifecycle of a [`CoinbaseConnection`].
///
/// `Disconnected -> Connecting -> Connected -> Closing -> Closed`, with no way back into
/// `Connecting` once closing has started.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

/// Delay to wait after failed connection attempt `attempt` (0-indexed): `(2^attempt - 1) / 2`
/// seconds, ie/ 0s, 0.5s, 1.5s, 3.5s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt)
        .unwrap_or(u64::MAX)
        .saturating_sub(1);

    Duration::from_millis(factor.saturating_mul(500))
}

/// Owns the WebSocket connection to the Coinbase feed.
pub struct CoinbaseConnection {
    url: Url,
    subscription: CoinbaseSubscription,
    retries: u32,
    read_timeout: Duration,
    state: ConnectionState,
    writer: Option<WsSink>,
    reader: Option<WsReader>,
}

impl std::fmt::Debug for CoinbaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseConnection")
            .field("url", &self.url)
            .field("subscription", &self.subscription)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CoinbaseConnection {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
            subscription: CoinbaseSubscription::new(
                config.product_ids.clone(),
                config.channels.clone(),
            ),
            retries: config.retries,
            read_timeout: config.read_timeout,
            state: ConnectionState::Disconnected,
            writer: None,
            reader: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Dial the feed, retrying up to the configured number of attempts with exponential
    /// [`backoff_delay`] between them.
    ///
    /// Each dial and each backoff wait races the `interrupt` signal. If the interrupt resolves
    /// first the whole call is aborted with [`DataError::Interrupted`].
    pub async fn connect(&mut self, interrupt: &mut CompletionListener) -> Result<(), DataError> {
        if self.state != ConnectionState::Disconnected {
            return Err(DataError::InvalidState(self.state));
        }

        self.state = ConnectionState::Connecting;

        for attempt in 0..self.retries {
            let dialed = tokio::select! {
                biased;
                _ = interrupt.completed() => {
                    self.state = ConnectionState::Disconnected;
                    return Err(DataError::Interrupted);
                }
                dialed = connect_async(self.url.as_str()) => dialed,
            };

            match dialed {
                Ok((websocket, _)) => {
                    info!(url = %self.url, attempt = attempt + 1, "connected to WebSocket feed");
                    let (writer, reader) = websocket.split();
                    self.writer = Some(writer);
                    self.reader = Some(reader);
                    self.state = ConnectionState::Connected;
                    return Ok(());
                }
                Err(error) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        url = %self.url,
                        attempt = attempt + 1,
                        retries = self.retries,
                        ?delay,
                        %error,
                        "failed to connect, backing off"
                    );

                    tokio::select! {
                        biased;
                        _ = interrupt.completed() => {
                            self.state = ConnectionState::Disconnected;
                            return Err(DataError::Interrupted);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(DataError::Connect {
            url: self.url.to_string(),
            attempts: self.retries,
        })
    }

    /// Send the subscription frame declaring the instruments and channels of interest.
    pub async fn subscribe(&mut self) -> Result<(), DataError> {
        let state = self.state;
        let writer = self
            .writer
            .as_mut()
            .filter(|_| state == ConnectionState::Connected)
            .ok_or_else(|| DataError::Protocol(format!("connection is {state}")))?;

        let payload = serde_json::to_string(&self.subscription)
            .map_err(|error| DataError::Protocol(error.to_string()))?;

        writer
            .send(Message::text(payload))
            .await
            .map_err(|error| DataError::Protocol(error.to_string()))?;

        info!(
            product_ids = ?self.subscription.product_ids,
            channels = ?self.subscription.channels,
            "subscribed to WebSocket feed"
        );
        Ok(())
    }

    /// Spawn the read loop on its own task, forwarding trades on `tx`.
    ///
    /// Returns the read loop's "done" signal, resolved when the loop terminates for any reason.
    pub fn receive(
        &mut self,
        tx: mpsc::Sender<MatchMessage>,
    ) -> Result<CompletionListener, DataError> {
        let reader = self
            .reader
            .take()
            .ok_or(DataError::InvalidState(self.state))?;

        let (done, listener) = completion();
        let frames = TimeoutStream::new(reader, self.read_timeout);
        tokio::spawn(read_loop(frames, tx, done));

        Ok(listener)
    }

    /// Send a normal-closure control frame. Does not wait for the read loop to observe it.
    ///
    /// Only valid on a [`ConnectionState::Connected`] connection, so a connection is closed at
    /// most once.
    pub async fn close(&mut self) -> Result<(), DataError> {
        let state = self.state;
        let writer = self
            .writer
            .as_mut()
            .filter(|_| state == ConnectionState::Connected)
            .ok_or_else(|| DataError::Close(format!("connection is {state}")))?;

        self.state = ConnectionState::Closing;
        let result = writer
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Default::default(),
            })))
            .await;
        self.state = ConnectionState::Closed;

        result.map_err(|error| DataError::Close(error.to_string()))
    }
}

/// Decode inbound frames and forward trades on `tx` until the stream ends, a frame fails to
/// decode, the transport errors, or the receiver is dropped.
///
/// `done` is resolved on exit, including on unwind.
pub async fn read_loop<S>(mut frames: S, tx: mpsc::Sender<MatchMessage>, done: Completion)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let _done = done;

    while let Some(frame) = frames.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => serde_json::from_str::<MatchMessage>(&text),
            Ok(Message::Binary(bytes)) => serde_json::from_slice::<MatchMessage>(&bytes),
            Ok(Message::Close(frame)) => {
                info!(?frame, "received closing frame");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            Err(error) => {
                warn!(%error, "WebSocket read failed");
                break;
            }
        };

        let message = match decoded {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "failed to decode frame");
                break;
            }
        };

        if message.is_error() {
            warn!(message = %message.message, "feed reported error");
        }

        if !message.is_trade() {
            continue;
        }

        if tx.send(message).await.is_err() {
            debug!("trade receiver dropped");
            break;
        }
    }

    debug!("read loop terminated");
}
