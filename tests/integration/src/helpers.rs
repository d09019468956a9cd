//! Test helpers for integration tests
//!
//! Provides a fake gateway that accepts client connections on a loopback
//! port and lets a test script each session frame by frame.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use gateway_client::protocol::{OpCode, Payload};
use gateway_common::AppConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Upper bound for any single wait in a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Token the fake gateway expects
pub const TEST_TOKEN: &str = "Bot test-token";

/// Client configuration pointing at `url` with fast rate limits
pub fn test_config(url: &str) -> Result<AppConfig> {
    let vars = [
        ("GATEWAY_URL", url),
        ("GATEWAY_TOKEN", TEST_TOKEN),
        ("GATEWAY_WORKERS", "4"),
        ("GATEWAY_SHUTDOWN_GRACE_MS", "1000"),
        ("GATEWAY_INTENTS", "513"),
        ("CLIENT_OS", "linux"),
        ("CLIENT_BROWSER", "integration-tests"),
        ("RATE_LIMIT_MESSAGE_PERIOD_MS", "1"),
        ("RATE_LIMIT_MESSAGE_BURST", "100"),
        ("RATE_LIMIT_CONNECT_PERIOD_MS", "10"),
        ("RATE_LIMIT_CONNECT_BURST", "5"),
    ];
    let config = AppConfig::from_lookup(|key| {
        vars.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| (*value).to_string())
    })?;
    Ok(config)
}

/// Await `future` with the test timeout
pub async fn within<F: Future>(what: &str, future: F) -> Result<F::Output> {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .map_err(|_| anyhow!("timed out waiting for {what}"))
}

/// Poll `condition` until it holds or the test timeout passes
pub async fn eventually(what: &str, condition: impl Fn() -> bool) -> Result<()> {
    within(what, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// In-process gateway server
pub struct FakeGateway {
    pub addr: SocketAddr,
    sessions: mpsc::UnboundedReceiver<ServerSession>,
    _handle: JoinHandle<()>,
}

impl FakeGateway {
    /// Bind a loopback port and start accepting WebSocket connections
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, sessions) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => {
                        if tx.send(ServerSession { ws }).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("fake gateway handshake failed: {e}"),
                }
            }
        });

        Ok(Self {
            addr,
            sessions,
            _handle: handle,
        })
    }

    /// URL clients dial
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next client connection
    pub async fn next_session(&mut self) -> Result<ServerSession> {
        within("a client connection", self.sessions.recv())
            .await?
            .ok_or_else(|| anyhow!("fake gateway stopped accepting"))
    }
}

/// Server side of one client connection
pub struct ServerSession {
    ws: WebSocketStream<TcpStream>,
}

impl ServerSession {
    /// Send a payload as a binary frame
    pub async fn send(&mut self, payload: &Payload) -> Result<()> {
        self.ws.send(Message::Binary(payload.encode())).await?;
        Ok(())
    }

    /// Next payload from the client; `None` once the client closed
    pub async fn recv(&mut self) -> Result<Option<Payload>> {
        loop {
            let frame = within("a client frame", self.ws.next()).await?;
            match frame {
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(Payload::decode(&bytes)?)),
                Some(Ok(Message::Text(text))) => return Ok(Some(Payload::decode(text.as_bytes())?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => bail!("client connection failed: {e}"),
            }
        }
    }

    /// Next payload with opcode `op`, skipping anything else
    pub async fn recv_op(&mut self, op: OpCode) -> Result<Payload> {
        loop {
            match self.recv().await? {
                Some(payload) if payload.op == op => return Ok(payload),
                Some(_) => {}
                None => bail!("client closed before sending {op}"),
            }
        }
    }

    /// Read until the client's close frame and return its code
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            let frame = within("the client close frame", self.ws.next()).await?;
            match frame {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => {}
                Some(Err(e)) => bail!("client connection failed: {e}"),
                None => bail!("client dropped the connection without a close frame"),
            }
        }
    }

    /// Close the connection with a gateway close code
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.ws
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            }))
            .await?;
        Ok(())
    }
}
