//! WebSocket transport
//!
//! Owns one socket and runs two loops over it:
//! - the read loop turns frames into [`Message`]s and hands each one to the
//!   installed [`MessageHandler`] on the worker pool;
//! - the response loop is the only writer, draining the outbound queue in
//!   enqueue order.
//!
//! Both loops share one child scope; the first real failure cancels it.

use super::{
    ConnectionState, FrameKind, Message, MessageHandler, Outbound, OutboundQueue, StateCell,
    TransportError, WorkerPool, DEFAULT_WORKERS,
};
use crate::protocol::Payload;
use crate::ratelimit::RateLimits;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use gateway_common::{GatewayConfig, NoopTelemetry, Telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// Default upper bound for draining the outbound queue on shutdown
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Transport tuning
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Worker pool size, also the outbound queue capacity
    pub workers: usize,
    pub shutdown_grace: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl From<&GatewayConfig> for TransportConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            workers: config.workers,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Socket type produced by [`Transport::dial`]
pub type GatewayStream = MaybeTlsStream<TcpStream>;

/// A single gateway connection
pub struct Transport<S> {
    stream: WebSocketStream<S>,
    state: Arc<StateCell>,
    pool: WorkerPool,
    outbound: Outbound,
    queue: OutboundQueue,
    handler: Option<Arc<dyn MessageHandler>>,
    telemetry: Arc<dyn Telemetry>,
    shutdown_grace: Duration,
}

impl Transport<GatewayStream> {
    /// Open a connection to `url`, waiting on the connect limiter first
    pub async fn dial(
        scope: &CancellationToken,
        url: &str,
        token: &str,
        config: &TransportConfig,
        limits: &RateLimits,
    ) -> Result<Self, TransportError> {
        let state = Arc::new(StateCell::default());
        state.advance(ConnectionState::Dialing);

        limits
            .connect
            .wait(scope)
            .await
            .map_err(|_| TransportError::ShutdownRequested)?;

        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let authorization =
            HeaderValue::from_str(token).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, authorization);

        tracing::debug!(url = %url, "Dialing gateway");
        let (stream, response) = tokio::select! {
            biased;
            () = scope.cancelled() => return Err(TransportError::ShutdownRequested),
            dialed = tokio_tungstenite::connect_async(request) => {
                dialed.map_err(TransportError::Dial)?
            }
        };
        tracing::info!(url = %url, status = %response.status(), "Gateway connected");

        Ok(Self::with_state(stream, state, config, limits))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already-open WebSocket
    pub fn from_stream(stream: WebSocketStream<S>, config: &TransportConfig, limits: &RateLimits) -> Self {
        Self::with_state(stream, Arc::new(StateCell::default()), config, limits)
    }

    fn with_state(
        stream: WebSocketStream<S>,
        state: Arc<StateCell>,
        config: &TransportConfig,
        limits: &RateLimits,
    ) -> Self {
        state.advance(ConnectionState::Connected);
        let pool = WorkerPool::new(config.workers);
        let (outbound, queue) = Outbound::channel(pool.size(), Arc::clone(&limits.message));

        Self {
            stream,
            state,
            pool,
            outbound,
            queue,
            handler: None,
            telemetry: Arc::new(NoopTelemetry),
            shutdown_grace: config.shutdown_grace,
        }
    }

    /// Install the handler invoked for every inbound frame
    pub fn set_handler(&mut self, handler: Arc<dyn MessageHandler>) {
        self.handler = Some(handler);
    }

    pub fn set_telemetry(&mut self, telemetry: Arc<dyn Telemetry>) {
        self.telemetry = telemetry;
    }

    /// Handle for enqueueing outbound messages
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Shared state cell, readable after `run` consumes the transport
    pub fn state_cell(&self) -> Arc<StateCell> {
        Arc::clone(&self.state)
    }

    /// Rate-limited send of one payload
    pub async fn send(&self, scope: &CancellationToken, payload: &Payload) -> Result<(), super::SendError> {
        self.outbound.send(scope, payload).await
    }

    /// Run both loops until `scope` is cancelled or the connection fails
    ///
    /// Returns `Ok(())` for a requested shutdown and the first fatal error
    /// otherwise. In-flight handlers are awaited before the socket is closed.
    pub async fn run(self, scope: CancellationToken) -> Result<(), TransportError> {
        let Self {
            stream,
            state,
            pool,
            outbound,
            mut queue,
            handler,
            telemetry,
            shutdown_grace,
        } = self;
        let handler = handler.ok_or(TransportError::NoHandler)?;

        let (mut sink, stream) = stream.split();
        let group = scope.child_token();

        let reader = async {
            let result = read_loop(stream, &group, &pool, handler, outbound, telemetry).await;
            match result {
                Err(TransportError::ShutdownRequested) => Ok(()),
                Err(e) => {
                    group.cancel();
                    Err(e)
                }
                Ok(()) => Ok(()),
            }
        };
        let writer = response_loop(&mut sink, &mut queue, &group, &state, shutdown_grace);

        let result = tokio::try_join!(reader, writer);
        group.cancel();
        let close_by = match &result {
            Ok(((), deadline)) => *deadline,
            Err(_) => Instant::now() + shutdown_grace,
        };
        let result = result.map(|_| ());

        if state.begin_closing() {
            tracing::info!("Connection closing");
        }
        queue.close();

        pool.close();
        tracing::debug!(in_flight = pool.in_flight(), "Waiting for handlers");
        pool.wait().await;

        match tokio::time::timeout_at(close_by, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Socket close failed"),
            Err(_) => tracing::warn!("Socket close timed out"),
        }
        state.advance(ConnectionState::Closed);

        match &result {
            Ok(()) => tracing::info!("Connection closed"),
            Err(e) => tracing::error!(error = %e, "Connection failed"),
        }
        result
    }
}

async fn read_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    group: &CancellationToken,
    pool: &WorkerPool,
    handler: Arc<dyn MessageHandler>,
    outbound: Outbound,
    telemetry: Arc<dyn Telemetry>,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = group.cancelled() => return Err(TransportError::ShutdownRequested),
            frame = stream.next() => frame,
        };

        let (kind, bytes) = match frame {
            Some(Ok(Frame::Binary(bytes))) => (FrameKind::Binary, bytes),
            Some(Ok(Frame::Text(text))) => (FrameKind::Text, text.into_bytes()),
            Some(Ok(Frame::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                    .unwrap_or_default();
                tracing::info!(code = ?code, reason = %reason, "Peer closed connection");
                return Err(TransportError::Closed { code, reason });
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Read(e)),
            None => {
                return Err(TransportError::Closed {
                    code: None,
                    reason: "stream ended".to_string(),
                })
            }
        };

        tracing::trace!(kind = kind.as_str(), len = bytes.len(), "Frame received");
        if let Err(e) = telemetry.record_frame(kind.as_str()) {
            tracing::debug!(error = %e, "Telemetry rejected frame");
        }

        let message = Message::new(group.child_token(), kind, bytes);

        // backpressure: no further reads until a handler finishes
        let Some(permit) = pool.acquire(group).await else {
            return Err(TransportError::ShutdownRequested);
        };

        let handler = Arc::clone(&handler);
        let outbound = outbound.clone();
        pool.spawn(permit, "message", async move {
            if message.scope.is_cancelled() {
                return Ok(());
            }
            handler.handle(message, outbound).await
        });
    }
}

/// Returns the deadline that bounds the rest of the shutdown
async fn response_loop<S>(
    sink: &mut SplitSink<WebSocketStream<S>, Frame>,
    queue: &mut OutboundQueue,
    group: &CancellationToken,
    state: &StateCell,
    grace: Duration,
) -> Result<Instant, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let message = tokio::select! {
            biased;
            () = group.cancelled() => break,
            next = queue.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };
        // a peer that stops reading must not hold up shutdown
        tokio::select! {
            biased;
            () = group.cancelled() => {
                tracing::debug!("Write interrupted by shutdown");
                break;
            }
            () = write(sink, message) => {}
        }
    }

    let deadline = Instant::now() + grace;
    if state.begin_closing() {
        tracing::info!("Connection closing");
    }
    queue.stop_accepting();

    let drain = async {
        let mut drained = 0usize;
        while let Some(message) = queue.try_recv() {
            write(sink, message).await;
            drained += 1;
        }
        drained
    };
    match tokio::time::timeout_at(deadline, drain).await {
        Ok(0) => {}
        Ok(drained) => tracing::debug!(drained, "Drained outbound queue"),
        Err(_) => tracing::warn!(grace_ms = grace.as_millis() as u64, "Outbound drain timed out"),
    }

    let close = Frame::Close(Some(CloseFrame {
        code: WsCloseCode::Normal,
        reason: "".into(),
    }));
    match tokio::time::timeout_at(deadline, sink.send(close)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Failed to send close frame"),
        Err(_) => tracing::warn!("Close frame not sent before the grace period ended"),
    }
    queue.close();

    Ok(deadline)
}

async fn write<S>(sink: &mut SplitSink<WebSocketStream<S>, Frame>, message: Message)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let len = message.len();
    if let Err(e) = sink.send(message.into_frame()).await {
        tracing::warn!(error = %e, len, "Failed to write frame");
    }
}
