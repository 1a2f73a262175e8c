//! Typed-message WebSocket multiplexer.
//!
//! Every frame is a JSON envelope `{"type": ..., "data": ..., "timestamp": ...}`.
//! Subscribers ask for one message type with [`WsMultiplexer::on`] and receive
//! the decoded `data` payloads as a stream.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::{DataError, Result};

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of reconnection attempts after a drop.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;

const CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    /// Server URL (`ws://` or `wss://`).
    pub url: String,
    /// Reconnect after the connection drops.
    pub reconnect: bool,
    /// Delay before each reconnection attempt.
    pub reconnect_interval: Duration,
    /// Attempts before giving up.
    pub reconnect_attempts: u32,
}

impl WsConfig {
    /// Settings for `url` with the default reconnection policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }

    /// Enable or disable reconnection.
    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub const fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the number of attempts.
    #[must_use]
    pub const fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }
}

/// Envelope of every frame exchanged with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketMessage {
    /// Message type used for routing.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
}

impl WebSocketMessage {
    /// Envelope stamped with the current time.
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: now_millis(),
        }
    }
}

/// Shared WebSocket connection fanning incoming messages out by type.
///
/// Clones share the same connection.
#[derive(Clone, Default)]
pub struct WsMultiplexer {
    shared: Arc<Shared>,
}

struct Shared {
    messages: broadcast::Sender<WebSocketMessage>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    connected: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    config: Mutex<Option<WsConfig>>,
}

impl Default for Shared {
    fn default() -> Self {
        let (messages, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            messages,
            outgoing: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            config: Mutex::new(None),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl fmt::Debug for WsMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsMultiplexer")
            .field("connected", &self.is_connected())
            .field("subscribers", &self.shared.messages.receiver_count())
            .finish()
    }
}

impl WsMultiplexer {
    /// Create a disconnected multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the connection.
    ///
    /// The first handshake happens before this returns. Later drops are
    /// handled in the background according to `config`. Any previous
    /// connection is closed first.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::WebSocket`] if the handshake fails.
    pub async fn connect(&self, config: WsConfig) -> Result<()> {
        self.disconnect();

        let (stream, _) = connect_async(config.url.as_str())
            .await
            .map_err(|err| DataError::WebSocket(err.to_string()))?;
        info!(url = %config.url, "WebSocket connected");
        *lock(&self.shared.config) = Some(config.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.outgoing) = Some(tx);
        self.shared.connected.store(true, Ordering::SeqCst);

        let connection = Connection {
            config,
            messages: self.shared.messages.clone(),
            connected: Arc::clone(&self.shared.connected),
            outgoing: rx,
        };
        let task = tokio::spawn(connection.run(stream));
        if let Some(previous) = lock(&self.shared.task).replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Close the current connection and open a new one with the settings of
    /// the last [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotConnected`] if `connect` was never called, or
    /// [`DataError::WebSocket`] if the handshake fails.
    pub async fn reconnect(&self) -> Result<()> {
        let config = lock(&self.shared.config).clone();
        let config = config.ok_or(DataError::NotConnected)?;
        info!(url = %config.url, "reconnecting WebSocket on request");
        self.connect(config).await
    }

    /// Stream of every incoming envelope, whatever its type.
    pub fn messages(&self) -> BoxStream<'static, WebSocketMessage> {
        let receiver = self.shared.messages.subscribe();
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "subscriber lagged behind"),
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Stream of `data` payloads of messages whose type is `kind`.
    ///
    /// Payloads that do not decode as `T` are skipped with a warning. The
    /// stream ends when the multiplexer is dropped.
    pub fn on<T>(&self, kind: impl Into<String>) -> BoxStream<'static, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let receiver = self.shared.messages.subscribe();
        stream::unfold((receiver, kind.into()), |(mut receiver, kind)| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) if message.kind == kind => {
                        match serde_json::from_value::<T>(message.data) {
                            Ok(value) => return Some((value, (receiver, kind))),
                            Err(err) => warn!(%kind, %err, "skipping undecodable payload"),
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%kind, skipped, "subscriber lagged behind");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    /// Send a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotConnected`] without a live connection and
    /// [`DataError::Encode`] if `data` cannot be serialized.
    pub fn send<D: Serialize>(&self, kind: &str, data: &D) -> Result<()> {
        let data = serde_json::to_value(data).map_err(|err| DataError::Encode(err.into()))?;
        let frame = serde_json::to_string(&WebSocketMessage::new(kind, data))
            .map_err(|err| DataError::Encode(err.into()))?;

        if !self.is_connected() {
            return Err(DataError::NotConnected);
        }
        let outgoing = lock(&self.shared.outgoing);
        let sender = outgoing.as_ref().ok_or(DataError::NotConnected)?;
        sender
            .send(Message::text(frame))
            .map_err(|_| DataError::NotConnected)
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        if lock(&self.shared.outgoing).take().is_some() {
            info!("WebSocket disconnected");
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        if let Some(task) = lock(&self.shared.task).take() {
            task.abort();
        }
    }

    /// Returns `true` while a connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

struct Connection {
    config: WsConfig,
    messages: broadcast::Sender<WebSocketMessage>,
    connected: Arc<AtomicBool>,
    outgoing: mpsc::UnboundedReceiver<Message>,
}

impl Connection {
    async fn run(mut self, mut stream: WsStream) {
        loop {
            let closed_locally = self.pump(stream).await;
            self.connected.store(false, Ordering::SeqCst);
            if closed_locally || !self.config.reconnect {
                return;
            }

            match self.reconnect().await {
                Some(next) => {
                    self.connected.store(true, Ordering::SeqCst);
                    stream = next;
                }
                None => {
                    error!(
                        attempts = self.config.reconnect_attempts,
                        "WebSocket reconnection gave up"
                    );
                    return;
                }
            }
        }
    }

    /// Relay frames until the connection drops. Returns `true` when the
    /// local side closed it.
    async fn pump(&mut self, stream: WsStream) -> bool {
        let (mut write, mut read) = stream.split();
        loop {
            tokio::select! {
                message = self.outgoing.recv() => match message {
                    Some(message) => {
                        if let Err(err) = write.send(message).await {
                            warn!(%err, "WebSocket send failed");
                            return false;
                        }
                    }
                    None => {
                        if let Err(err) = write.close().await {
                            debug!(%err, "WebSocket close failed");
                        }
                        return true;
                    }
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed by server");
                        return false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "WebSocket read failed");
                        return false;
                    }
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<WebSocketMessage>(text) {
            Ok(message) => {
                debug!(kind = %message.kind, "WebSocket message");
                if self.messages.send(message).is_err() {
                    debug!("no WebSocket subscribers");
                }
            }
            Err(err) => warn!(%err, "ignoring malformed WebSocket frame"),
        }
    }

    async fn reconnect(&self) -> Option<WsStream> {
        for attempt in 1..=self.config.reconnect_attempts {
            tokio::time::sleep(self.config.reconnect_interval).await;
            info!(
                attempt,
                max = self.config.reconnect_attempts,
                "reconnecting WebSocket"
            );
            match connect_async(self.config.url.as_str()).await {
                Ok((stream, _)) => return Some(stream),
                Err(err) => warn!(attempt, %err, "WebSocket reconnect failed"),
            }
        }
        None
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}
