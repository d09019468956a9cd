//! Gateway Integration Tests
//!
//! Runs the real client against an in-process gateway on a loopback port.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;

use gateway_client::protocol::{CloseCode, OpCode, Payload, PresenceUpdatePayload};
use gateway_client::{ClientError, GatewayClient, MemorySessionStore};
use gateway_common::{AppError, Counters};
use gateway_core::{Element, SessionStore, Snowflake};
use integration_tests::{
    eventually, guild_create, message_create, ready, test_config, within, FakeGateway,
    ServerSession, TEST_TOKEN,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    gateway: FakeGateway,
    client: Arc<GatewayClient>,
    store: Arc<MemorySessionStore>,
    counters: Arc<Counters>,
    scope: CancellationToken,
}

impl Harness {
    async fn start() -> Self {
        let gateway = FakeGateway::start().await.expect("Failed to start gateway");
        let config = test_config(&gateway.url()).expect("Invalid test config");
        let store = MemorySessionStore::new_shared();
        let counters = Arc::new(Counters::new());
        let client = GatewayClient::new(&config, store.clone(), counters.clone())
            .expect("Failed to build client");

        Self {
            gateway,
            client: Arc::new(client),
            store,
            counters,
            scope: CancellationToken::new(),
        }
    }

    fn run_once(&self) -> JoinHandle<Result<(), ClientError>> {
        let client = Arc::clone(&self.client);
        let scope = self.scope.clone();
        tokio::spawn(async move { client.run(scope).await })
    }

    fn run_forever(&self) -> JoinHandle<Result<(), ClientError>> {
        let client = Arc::clone(&self.client);
        let scope = self.scope.clone();
        tokio::spawn(async move { client.run_forever(scope).await })
    }

    /// Accept a connection, greet it and return the handshake reply
    async fn handshake(&mut self) -> (ServerSession, Payload) {
        let mut session = self.gateway.next_session().await.unwrap();
        session.send(&Payload::hello(45_000)).await.unwrap();
        let reply = loop {
            let payload = session.recv().await.unwrap().expect("client closed");
            if matches!(payload.op, OpCode::Identify | OpCode::Resume) {
                break payload;
            }
        };
        (session, reply)
    }
}

fn text<'a>(payload: &'a Payload, field: &str) -> Option<&'a str> {
    payload.fields().get(field).and_then(Element::as_str)
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_then_ready_populates_store() {
    let mut h = Harness::start().await;
    let task = h.run_once();

    let (mut session, identify) = h.handshake().await;
    assert_eq!(identify.op, OpCode::Identify);
    assert_eq!(text(&identify, "token"), Some(TEST_TOKEN));
    assert_eq!(identify.fields().get("intents").map(Element::to_int::<u64>), Some(Ok(513)));
    let properties = identify.fields().get("properties").unwrap();
    assert_eq!(properties.get("os").and_then(Element::as_str), Some("linux"));
    assert_eq!(
        properties.get("browser").and_then(Element::as_str),
        Some("integration-tests")
    );

    session
        .send(&Payload::dispatch("READY", 1, ready("sess-1", 80, &[100])))
        .await
        .unwrap();
    session
        .send(&Payload::dispatch("GUILD_CREATE", 2, guild_create(100, 200, 300, 400)))
        .await
        .unwrap();

    let store = Arc::clone(&h.store);
    eventually("the guild to be cached", || {
        store.channel_count() == 1 && store.member_count() == 1 && store.role_count() == 1
    })
    .await
    .unwrap();

    assert_eq!(h.store.session_id(), "sess-1");
    assert_eq!(h.store.resume_url().as_deref(), Some("ws://127.0.0.1:1"));
    assert!(h.store.guild(Snowflake::new(100)).is_some());
    assert!(h.store.member(Snowflake::new(100), Snowflake::new(300)).is_some());
    assert!(h.store.role(Snowflake::new(100), Snowflake::new(400)).is_some());
    assert_eq!(h.store.last_sequence(), 2);
    assert_eq!(h.counters.opcode_count("Hello"), 1);
    assert_eq!(h.counters.event_count("GUILD_CREATE"), 1);

    h.scope.cancel();
    assert_eq!(session.expect_close().await.unwrap(), Some(1000));
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_event_handlers_receive_dispatches() {
    let mut h = Harness::start().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    h.client.on("MESSAGE_CREATE", move |_, payload: &Payload| {
        let content = payload
            .fields()
            .get("content")
            .and_then(Element::as_str)
            .unwrap_or_default()
            .to_string();
        let _ = tx.send(content);
        Ok(())
    });
    let task = h.run_once();

    let (mut session, _) = h.handshake().await;
    session
        .send(&Payload::dispatch("MESSAGE_CREATE", 1, message_create(200, "hello there")))
        .await
        .unwrap();
    // unknown events are dropped without affecting the connection
    session
        .send(&Payload::dispatch("SOMETHING_NEW", 2, Element::map()))
        .await
        .unwrap();

    let content = within("the message handler", rx.recv()).await.unwrap();
    assert_eq!(content.as_deref(), Some("hello there"));

    let store = Arc::clone(&h.store);
    eventually("sequence 2", || store.last_sequence() == 2).await.unwrap();
    assert!(h.client.is_connected());

    h.scope.cancel();
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
}

// ============================================================================
// Heartbeat Tests
// ============================================================================

#[tokio::test]
async fn test_server_heartbeat_request_and_ack() {
    let mut h = Harness::start().await;
    let task = h.run_once();

    let (mut session, _) = h.handshake().await;
    session
        .send(&Payload::dispatch("READY", 5, ready("sess-1", 80, &[])))
        .await
        .unwrap();
    session
        .send(&Payload::new(OpCode::Heartbeat, Element::Nil))
        .await
        .unwrap();

    let beat = session.recv_op(OpCode::Heartbeat).await.unwrap();
    assert!(matches!(beat.data, Element::Nil | Element::SmallInt(5)));

    session.send(&Payload::heartbeat_ack()).await.unwrap();
    let client = Arc::clone(&h.client);
    eventually("the heartbeat ack", || {
        client.dispatcher().heartbeat().latency().is_some()
    })
    .await
    .unwrap();

    h.scope.cancel();
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
}

// ============================================================================
// Send Tests
// ============================================================================

#[tokio::test]
async fn test_client_send_reaches_gateway() {
    let mut h = Harness::start().await;
    let task = h.run_once();

    let (mut session, _) = h.handshake().await;
    let presence = PresenceUpdatePayload {
        status: "idle".to_string(),
        ..PresenceUpdatePayload::online()
    };
    h.client
        .send(&h.scope, &Payload::new(OpCode::StatusUpdate, presence.to_element()))
        .await
        .unwrap();

    let update = session.recv_op(OpCode::StatusUpdate).await.unwrap();
    assert_eq!(text(&update, "status"), Some("idle"));

    h.scope.cancel();
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
}

// ============================================================================
// Reconnect Tests
// ============================================================================

#[tokio::test]
async fn test_reconnect_resumes_session() {
    let mut h = Harness::start().await;
    let task = h.run_forever();

    let (mut first, identify) = h.handshake().await;
    assert_eq!(identify.op, OpCode::Identify);
    first
        .send(&Payload::dispatch("READY", 1, ready("sess-1", 80, &[])))
        .await
        .unwrap();
    first
        .send(&Payload::dispatch("MESSAGE_CREATE", 2, message_create(200, "before")))
        .await
        .unwrap();
    let store = Arc::clone(&h.store);
    eventually("the session", || {
        store.session_id() == "sess-1" && store.last_sequence() == 2
    })
    .await
    .unwrap();

    first.send(&Payload::reconnect()).await.unwrap();
    assert_eq!(first.expect_close().await.unwrap(), Some(1000));

    let (mut second, resume) = h.handshake().await;
    assert_eq!(resume.op, OpCode::Resume);
    assert_eq!(text(&resume, "token"), Some(TEST_TOKEN));
    assert_eq!(text(&resume, "session_id"), Some("sess-1"));
    assert_eq!(resume.fields().get("seq").map(Element::to_int::<u64>), Some(Ok(2)));

    second
        .send(&Payload::dispatch("RESUMED", 3, Element::map()))
        .await
        .unwrap();
    let store = Arc::clone(&h.store);
    eventually("sequence 3", || store.last_sequence() == 3).await.unwrap();

    h.scope.cancel();
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_dropped_connection_resumes() {
    let mut h = Harness::start().await;
    let task = h.run_forever();

    let (mut first, _) = h.handshake().await;
    first
        .send(&Payload::dispatch("READY", 1, ready("sess-9", 80, &[])))
        .await
        .unwrap();
    let store = Arc::clone(&h.store);
    eventually("the session", || store.session_id() == "sess-9").await.unwrap();

    first.close(4000, "Unknown error").await.unwrap();

    let (_second, resume) = h.handshake().await;
    assert_eq!(resume.op, OpCode::Resume);
    assert_eq!(text(&resume, "session_id"), Some("sess-9"));

    h.scope.cancel();
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_session_timeout_reidentifies() {
    let mut h = Harness::start().await;
    let task = h.run_forever();

    let (mut first, _) = h.handshake().await;
    first
        .send(&Payload::dispatch("READY", 1, ready("sess-old", 80, &[])))
        .await
        .unwrap();
    let store = Arc::clone(&h.store);
    eventually("the session", || store.session_id() == "sess-old").await.unwrap();

    first.close(4009, "Session timed out").await.unwrap();

    let (_second, reply) = h.handshake().await;
    assert_eq!(reply.op, OpCode::Identify);
    assert_eq!(h.store.session_id(), "");

    h.scope.cancel();
    within("client shutdown", task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let mut h = Harness::start().await;
    let task = h.run_forever();

    let (mut session, _) = h.handshake().await;
    session.close(4004, "Authentication failed").await.unwrap();

    let err = within("client failure", task)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.close_code(), Some(CloseCode::AuthenticationFailed));
    assert!(!err.should_reconnect());

    let app_error = AppError::from(err);
    assert!(matches!(app_error, AppError::Authentication(_)));
    assert_eq!(app_error.exit_code(), 77);
}
