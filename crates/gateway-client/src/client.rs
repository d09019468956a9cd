//! Gateway client
//!
//! Ties the transport to the dispatcher: dials, installs the dispatcher as
//! the message handler and keeps a session alive across reconnects.

use crate::connection::{
    GatewayStream, MessageHandler, Outbound, SendError, Transport, TransportConfig, TransportError,
};
use crate::dispatch::{Dependencies, Dispatcher, EventContext, Identity};
use crate::events::{install_session_handlers, EventHandler};
use crate::handlers::{ConnectionSlot, HandlerResult, InvalidSessionHandler, ReconnectHandler};
use crate::protocol::{CloseCode, OpCode, Payload};
use crate::ratelimit::{RateLimitError, RateLimits};
use gateway_common::{AppConfig, AppError, Telemetry};
use gateway_core::SessionStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// No connection is running
    #[error("Not connected")]
    NotConnected,
}

impl ClientError {
    /// Whether dialing again could succeed
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        match self {
            Self::Transport(e) => e.should_reconnect(),
            Self::Send(_) | Self::NotConnected => true,
            Self::RateLimit(_) => false,
        }
    }

    /// Gateway close code that ended the connection, if any
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Transport(e) => e.close_code(),
            _ => None,
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err.close_code() {
            Some(CloseCode::AuthenticationFailed) => return Self::Authentication(err.to_string()),
            Some(_) => return Self::protocol(&err),
            None => {}
        }
        match err {
            ClientError::Transport(TransportError::ShutdownRequested) => Self::Shutdown,
            ClientError::RateLimit(e) => Self::internal(e),
            other => Self::connection(&other),
        }
    }
}

/// A gateway client for one shard
pub struct GatewayClient {
    url: String,
    token: String,
    transport: TransportConfig,
    dispatcher: Arc<Dispatcher>,
    connection: ConnectionSlot,
    outbound: Mutex<Option<Outbound>>,
}

impl GatewayClient {
    /// Build a client from application configuration
    pub fn new(
        config: &AppConfig,
        session: Arc<dyn SessionStore>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, ClientError> {
        let limits = RateLimits::from_config(&config.rate_limit)?;
        let deps = Dependencies::new(session)
            .with_limits(limits)
            .with_telemetry(telemetry);

        Ok(Self::with_dependencies(
            config.gateway.url.clone(),
            Identity::from_config(config),
            TransportConfig::from(&config.gateway),
            deps,
        ))
    }

    /// Build a client from explicit parts
    #[must_use]
    pub fn with_dependencies(
        url: impl Into<String>,
        identity: Identity,
        transport: TransportConfig,
        deps: Dependencies,
    ) -> Self {
        let connection = ConnectionSlot::default();
        let token = identity.token.clone();
        let dispatcher = Dispatcher::builder(deps, identity)
            .with_opcode_handler(OpCode::Reconnect, ReconnectHandler::new(Arc::clone(&connection)))
            .with_opcode_handler(OpCode::InvalidSession, InvalidSessionHandler::default())
            .build();
        install_session_handlers(dispatcher.events());

        Self {
            url: url.into(),
            token,
            transport,
            dispatcher: Arc::new(dispatcher),
            connection,
            outbound: Mutex::new(None),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        self.dispatcher.session()
    }

    /// Whether a connection is currently running
    pub fn is_connected(&self) -> bool {
        self.outbound.lock().is_some()
    }

    /// Register a handler for a dispatch event
    pub fn add_event_handler(&self, event: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.dispatcher.add_event_handler(event, handler);
    }

    /// Register a function or closure for a dispatch event
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&EventContext, &Payload) -> HandlerResult<()> + Send + Sync + 'static,
    {
        self.dispatcher.events().on(event, handler);
    }

    /// Dial the gateway and install the dispatcher on the new transport
    pub async fn connect(&self, scope: &CancellationToken) -> Result<Transport<GatewayStream>, ClientError> {
        let deps = self.dispatcher.dependencies();
        let mut transport =
            Transport::dial(scope, &self.url, &self.token, &self.transport, &deps.limits).await?;
        transport.set_handler(Arc::clone(&self.dispatcher) as Arc<dyn MessageHandler>);
        transport.set_telemetry(Arc::clone(&deps.telemetry));
        Ok(transport)
    }

    /// Connect once and run until `scope` ends or the connection fails
    ///
    /// Returns `Ok(())` on shutdown and when the server asked for a reconnect.
    pub async fn run(&self, scope: CancellationToken) -> Result<(), ClientError> {
        let transport = match self.connect(&scope).await {
            Ok(transport) => transport,
            Err(ClientError::Transport(e)) if e.is_shutdown() => return Ok(()),
            Err(e) => return Err(e),
        };
        self.run_transport(transport, scope).await
    }

    /// Run an already-open transport with the dispatcher installed
    pub async fn run_transport<S>(&self, mut transport: Transport<S>, scope: CancellationToken) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        transport.set_handler(Arc::clone(&self.dispatcher) as Arc<dyn MessageHandler>);
        transport.set_telemetry(Arc::clone(&self.dispatcher.dependencies().telemetry));

        let connection = scope.child_token();
        *self.connection.lock() = Some(connection.clone());
        *self.outbound.lock() = Some(transport.outbound());

        let result = transport.run(connection).await;

        *self.outbound.lock() = None;
        *self.connection.lock() = None;
        self.dispatcher.heartbeat().stop();
        result.map_err(ClientError::from)
    }

    /// Keep reconnecting until `scope` ends or a close code forbids it
    pub async fn run_forever(&self, scope: CancellationToken) -> Result<(), ClientError> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.run(scope.clone()).await;
            if scope.is_cancelled() {
                return Ok(());
            }

            match result {
                Ok(()) => {
                    attempt = 0;
                    tracing::info!("Connection ended; reconnecting");
                }
                Err(e) if e.should_reconnect() => {
                    attempt += 1;
                    if e.close_code().is_some_and(|code| !code.can_resume()) {
                        self.session().clear_session();
                    }
                    tracing::warn!(attempt, error = %e, "Connection lost; reconnecting");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Connection failed permanently");
                    return Err(e);
                }
            }
        }
    }

    /// Send a payload on the running connection
    pub async fn send(&self, scope: &CancellationToken, payload: &Payload) -> Result<(), ClientError> {
        let outbound = self.outbound.lock().clone().ok_or(ClientError::NotConnected)?;
        outbound.send(scope, payload).await?;
        Ok(())
    }

    /// Restart the heartbeat on the running connection
    pub fn reconfigure_heartbeat(&self, scope: &CancellationToken, interval_ms: u64) -> Result<(), ClientError> {
        let outbound = self.outbound.lock().clone().ok_or(ClientError::NotConnected)?;
        self.dispatcher
            .heartbeat()
            .reconfigure(scope, interval_ms, outbound);
        Ok(())
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("url", &self.url)
            .field("transport", &self.transport)
            .field("dispatcher", &self.dispatcher)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
