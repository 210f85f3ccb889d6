//! Persistence connector owning the MongoDB connection lifecycle.
//!
//! [`Connector`] is the only component that opens, supervises and closes the
//! store connection. Repositories borrow [`Database`] handles through it and
//! never reconnect or reconfigure. State changes are published on a
//! [`watch`] channel (one current value) and as [`ConnectionEvent`]s on a
//! [`broadcast`] channel consumed for diagnostics only.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use mongodb::{bson::doc, options::ClientOptions, Client, Database};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{broadcast, watch, Mutex, RwLock},
    task::JoinHandle,
};
use utoipa::ToSchema;

use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

/// Used when neither the configuration nor the URI names a database
const DEFAULT_DATABASE: &str = "library_management";
const EVENT_CAPACITY: usize = 64;

/// Current state of the store connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        write!(f, "{}", label)
    }
}

/// Lifecycle notification emitted by the connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Error(String),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid connection string: {0}")]
    InvalidUri(#[source] mongodb::error::Error),

    #[error("database unreachable: {0}")]
    Unreachable(#[source] mongodb::error::Error),

    #[error("timed out closing the connection after {0:?}")]
    CloseTimeout(Duration),
}

/// Driver settings applied on every `connect`
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub max_pool_size: u32,
    pub server_selection_timeout: Duration,
    /// Deadline for a single store operation, and for closing the client
    pub socket_timeout: Duration,
    pub buffer_commands: bool,
    /// Zero disables supervision
    pub heartbeat_interval: Duration,
    pub database: Option<String>,
}

impl From<&DatabaseConfig> for ConnectOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_pool_size: config.max_pool_size,
            server_selection_timeout: config.server_selection_timeout(),
            socket_timeout: config.socket_timeout(),
            buffer_commands: config.buffer_commands,
            heartbeat_interval: config.heartbeat_interval(),
            database: config.name.clone(),
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

/// Snapshot reported by the introspection endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub connected: bool,
    pub name: Option<String>,
    pub host: Option<String>,
}

struct Session {
    client: Client,
    database: Database,
    host: String,
}

struct Inner {
    options: ConnectOptions,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    session: RwLock<Option<Session>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    // serializes connect/disconnect
    lifecycle: Mutex<()>,
}

/// Shared handle to the single store connection
#[derive(Clone)]
pub struct Connector {
    inner: Arc<Inner>,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("state", &self.state())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Connector {
    pub fn new(options: ConnectOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                options,
                state,
                events,
                session: RwLock::new(None),
                heartbeat: Mutex::new(None),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive all future lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Open the connection and verify it with a `ping`.
    ///
    /// A failure leaves the connector disconnected; it is not retried.
    pub async fn connect(&self, uri: &str) -> Result<(), ConnectionError> {
        let _guard = self.inner.lifecycle.lock().await;

        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        self.transition(ConnectionState::Connecting);
        tracing::info!("Connecting to MongoDB...");

        match self.open(uri).await {
            Ok(session) => {
                tracing::info!(
                    database = %session.database.name(),
                    host = %session.host,
                    "MongoDB connected successfully"
                );
                self.install(session).await;
                Ok(())
            }
            Err(err) => {
                self.emit(ConnectionEvent::Error(err.to_string()));
                self.transition(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    async fn open(&self, uri: &str) -> Result<Session, ConnectionError> {
        let options = &self.inner.options;

        let mut client_options = ClientOptions::parse(uri)
            .await
            .map_err(ConnectionError::InvalidUri)?;
        client_options.max_pool_size = Some(options.max_pool_size);
        client_options.server_selection_timeout = Some(options.server_selection_timeout);
        client_options
            .app_name
            .get_or_insert_with(|| env!("CARGO_PKG_NAME").to_string());

        let host = client_options
            .hosts
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();

        let client = Client::with_options(client_options).map_err(ConnectionError::InvalidUri)?;
        let database = match &options.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };

        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(ConnectionError::Unreachable)?;

        Ok(Session {
            client,
            database,
            host,
        })
    }

    /// Replace any previous session, shutting its client down first
    async fn install(&self, session: Session) {
        self.stop_heartbeat().await;

        let stale = self.inner.session.write().await.take();
        if let Some(Session { client, .. }) = stale {
            let deadline = self.inner.options.socket_timeout;
            if tokio::time::timeout(deadline, client.shutdown()).await.is_err() {
                tracing::warn!("Previous MongoDB client did not shut down in time");
            }
        }

        *self.inner.session.write().await = Some(session);
        self.transition(ConnectionState::Connected);
        self.start_heartbeat().await;
    }

    /// Close the connection. Calling it while disconnected is a no-op.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let _guard = self.inner.lifecycle.lock().await;

        self.stop_heartbeat().await;

        let session = self.inner.session.write().await.take();
        let Some(Session { client, .. }) = session else {
            self.transition(ConnectionState::Disconnected);
            return Ok(());
        };

        self.transition(ConnectionState::Disconnecting);

        let deadline = self.inner.options.socket_timeout;
        let closed = tokio::time::timeout(deadline, client.shutdown()).await;

        self.transition(ConnectionState::Disconnected);
        closed.map_err(|_| ConnectionError::CloseTimeout(deadline))
    }

    /// Database handle for a data access.
    ///
    /// Without command buffering this fails immediately unless connected;
    /// with buffering it waits up to the server selection timeout.
    pub async fn database(&self) -> AppResult<Database> {
        if let Some(database) = self.current_database().await {
            return Ok(database);
        }

        if !self.inner.options.buffer_commands {
            return Err(self.unavailable());
        }

        let mut state = self.watch_state();
        let connected = tokio::time::timeout(
            self.inner.options.server_selection_timeout,
            state.wait_for(|s| *s == ConnectionState::Connected),
        )
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);

        if !connected {
            return Err(self.unavailable());
        }
        self.current_database()
            .await
            .ok_or_else(|| self.unavailable())
    }

    /// Run a store operation under the per-operation deadline
    pub async fn with_deadline<T, F>(&self, operation: F) -> AppResult<T>
    where
        F: Future<Output = mongodb::error::Result<T>>,
    {
        let deadline = self.inner.options.socket_timeout;
        match tokio::time::timeout(deadline, operation).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::DatabaseTimeout(deadline)),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        let state = self.state();
        let session = self.inner.session.read().await;

        ConnectionStatus {
            state,
            connected: state == ConnectionState::Connected,
            name: session.as_ref().map(|s| s.database.name().to_string()),
            host: session.as_ref().map(|s| s.host.clone()),
        }
    }

    async fn current_database(&self) -> Option<Database> {
        if self.state() != ConnectionState::Connected {
            return None;
        }
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.database.clone())
    }

    fn unavailable(&self) -> AppError {
        AppError::DatabaseUnavailable(format!("connection is {}", self.state()))
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.inner.state.send_replace(next);
        if previous == next {
            return;
        }

        tracing::debug!(%previous, %next, "connection state changed");
        self.emit(match next {
            ConnectionState::Connecting => ConnectionEvent::Connecting,
            ConnectionState::Connected => ConnectionEvent::Connected,
            ConnectionState::Disconnecting => ConnectionEvent::Disconnecting,
            ConnectionState::Disconnected => ConnectionEvent::Disconnected,
        });
    }

    fn emit(&self, event: ConnectionEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    async fn start_heartbeat(&self) {
        let period = self.inner.options.heartbeat_interval;
        if period.is_zero() {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if !(Connector { inner }).heartbeat().await {
                    break;
                }
            }
        });

        if let Some(previous) = self.inner.heartbeat.lock().await.replace(task) {
            previous.abort();
        }
    }

    async fn stop_heartbeat(&self) {
        if let Some(task) = self.inner.heartbeat.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// One supervision round; `false` once the session is gone
    async fn heartbeat(&self) -> bool {
        let database = match self.inner.session.read().await.as_ref() {
            Some(session) => session.database.clone(),
            None => return false,
        };

        let result = database.run_command(doc! { "ping": 1 }, None).await;
        match (result, self.state()) {
            (Ok(_), ConnectionState::Disconnected) => {
                self.transition(ConnectionState::Connected);
            }
            (Err(err), ConnectionState::Connected) => {
                self.emit(ConnectionEvent::Error(err.to_string()));
                self.transition(ConnectionState::Disconnected);
            }
            _ => {}
        }
        true
    }

    /// Install an already-built client as a live session
    #[cfg(test)]
    pub(crate) async fn attach(&self, client: Client) {
        let database = client.database(DEFAULT_DATABASE);
        self.install(Session {
            client,
            database,
            host: "localhost:27017".to_string(),
        })
        .await;
    }
}

/// Log every lifecycle event until the connector is dropped
pub fn spawn_event_logger(connector: &Connector) -> JoinHandle<()> {
    let mut events = connector.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Connecting) => tracing::debug!("MongoDB connecting"),
                Ok(ConnectionEvent::Connected) => tracing::info!("MongoDB connection established"),
                Ok(ConnectionEvent::Disconnecting) => tracing::info!("MongoDB disconnecting"),
                Ok(ConnectionEvent::Disconnected) => tracing::warn!("MongoDB disconnected"),
                Ok(ConnectionEvent::Error(cause)) => {
                    tracing::error!(%cause, "MongoDB connection error")
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "connection event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn quick_options() -> ConnectOptions {
        ConnectOptions {
            server_selection_timeout: Duration::from_millis(200),
            socket_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::ZERO,
            ..ConnectOptions::default()
        }
    }

    fn drain(events: &mut broadcast::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        let mut seen = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => seen.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return seen,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let connector = Connector::new(quick_options());
        let status = connector.status().await;

        assert_eq!(connector.state(), ConnectionState::Disconnected);
        assert!(!status.connected);
        assert!(status.name.is_none());
    }

    #[tokio::test]
    async fn data_access_fails_fast_without_buffering() {
        let connector = Connector::new(quick_options());

        let err = connector.database().await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseUnavailable(_)));
    }

    #[tokio::test]
    async fn buffered_access_gives_up_after_selection_timeout() {
        let connector = Connector::new(ConnectOptions {
            buffer_commands: true,
            server_selection_timeout: Duration::from_millis(50),
            ..quick_options()
        });

        let started = std::time::Instant::now();
        let err = connector.database().await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseUnavailable(_)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn invalid_uri_is_rejected() {
        let connector = Connector::new(quick_options());
        let err = connector.connect("not-a-mongodb-uri").await.unwrap_err();

        assert!(matches!(err, ConnectionError::InvalidUri(_)));
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_store_reports_error_and_stays_disconnected() {
        let connector = Connector::new(quick_options());
        let mut events = connector.subscribe();

        let err = connector
            .connect("mongodb://127.0.0.1:1/?directConnection=true")
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::Unreachable(_)));
        assert_eq!(connector.state(), ConnectionState::Disconnected);

        let seen = drain(&mut events);
        assert_eq!(seen.first(), Some(&ConnectionEvent::Connecting));
        assert!(seen.iter().any(|e| matches!(e, ConnectionEvent::Error(_))));
        assert_eq!(seen.last(), Some(&ConnectionEvent::Disconnected));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let connector = Connector::new(quick_options());
        let client = Client::with_uri_str("mongodb://127.0.0.1:1").await.unwrap();
        connector.attach(client).await;
        assert_eq!(connector.state(), ConnectionState::Connected);
        assert!(connector.database().await.is_ok());

        let mut events = connector.subscribe();
        tokio_test::assert_ok!(connector.disconnect().await);
        assert_eq!(
            drain(&mut events),
            vec![ConnectionEvent::Disconnecting, ConnectionEvent::Disconnected]
        );

        tokio_test::assert_ok!(connector.disconnect().await);
        assert!(drain(&mut events).is_empty());
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn heartbeat_failure_marks_connection_lost() {
        let mut client_options = ClientOptions::parse("mongodb://127.0.0.1:1/?directConnection=true")
            .await
            .unwrap();
        client_options.server_selection_timeout = Some(Duration::from_millis(50));
        let client = Client::with_options(client_options).unwrap();

        let connector = Connector::new(ConnectOptions {
            heartbeat_interval: Duration::from_millis(20),
            ..quick_options()
        });
        let mut events = connector.subscribe();
        connector.attach(client).await;

        let mut state = connector.watch_state();
        let lost = tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ConnectionState::Disconnected),
        )
        .await;
        assert!(lost.is_ok(), "heartbeat never noticed the lost store");

        let seen = drain(&mut events);
        assert!(seen.iter().any(|e| matches!(e, ConnectionEvent::Error(_))));
        assert!(seen.contains(&ConnectionEvent::Disconnected));

        let err = connector.database().await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseUnavailable(_)));

        tokio_test::assert_ok!(connector.disconnect().await);
    }

    #[tokio::test]
    async fn replacing_a_session_closes_the_previous_client() {
        let connector = Connector::new(quick_options());
        let first = Client::with_uri_str("mongodb://127.0.0.1:1").await.unwrap();
        let second = Client::with_uri_str("mongodb://127.0.0.1:2").await.unwrap();

        connector.attach(first).await;
        let replaced =
            tokio::time::timeout(Duration::from_secs(5), connector.attach(second)).await;
        assert!(replaced.is_ok());
        assert_eq!(connector.state(), ConnectionState::Connected);
        assert!(connector.database().await.is_ok());

        tokio_test::assert_ok!(connector.disconnect().await);
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn slow_operations_hit_the_deadline() {
        let connector = Connector::new(ConnectOptions {
            socket_timeout: Duration::from_millis(20),
            ..quick_options()
        });

        let err = connector
            .with_deadline(std::future::pending::<mongodb::error::Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseTimeout(_)));
    }
}
