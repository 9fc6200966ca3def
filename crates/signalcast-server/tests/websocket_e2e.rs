//! End-to-end tests over a real TCP listener.
//!
//! Each test binds an ephemeral port, runs the event loop and the HTTP
//! server, and talks to them with a `tokio-tungstenite` client.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use signalcast_core::clock::TickClock;
use signalcast_core::config::{LoopConfig, ServerConfig};
use signalcast_core::simulator::{SignalSimulator, SignalTimings};
use signalcast_server::transport::channel;
use signalcast_server::{AppState, EventLoop, LoopSummary, ShutdownFlag, StopReason, bind, serve};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownFlag,
    event_loop: JoinHandle<LoopSummary>,
}

async fn start() -> Running {
    let server_config = ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        ..ServerConfig::default()
    };
    let loop_config = LoopConfig {
        service_timeout_ms: 10,
        ..LoopConfig::default()
    };

    let listener = bind(&server_config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (acceptor, transport) = channel(
        server_config.event_queue_capacity,
        server_config.outbound_queue_capacity,
    );
    let shutdown = ShutdownFlag::new();

    let simulator = SignalSimulator::new(SignalTimings::default()).unwrap();
    let clock = TickClock::starting_now(loop_config.tick_policy, loop_config.max_catch_up_ticks);
    let event_loop = EventLoop::new(transport, simulator, clock, &loop_config, shutdown.clone());

    tokio::spawn(serve(
        listener,
        Arc::new(AppState::new(acceptor)),
        shutdown.clone(),
    ));
    let event_loop = tokio::spawn(event_loop.run());

    Running {
        addr,
        shutdown,
        event_loop,
    }
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let url = format!("ws://{addr}{path}");
    let (client, _response) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

#[tokio::test]
async fn echo_ping_gets_pong_then_ack() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws/echo").await;

    client.send(Message::Text("ping".into())).await.unwrap();

    assert_eq!(
        next_text(&mut client).await,
        r#"{"type":"pong","data":"Server pong"}"#
    );
    assert_eq!(
        next_text(&mut client).await,
        r#"{"type":"received","data":"received"}"#
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn echo_plain_message_gets_ack() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws/echo").await;

    client
        .send(Message::Text("Hello Server!".into()))
        .await
        .unwrap();

    assert_eq!(
        next_text(&mut client).await,
        r#"{"type":"received","data":"received"}"#
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn binary_ping_is_treated_as_text() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws/echo").await;

    client
        .send(Message::Binary(b"ping!".to_vec().into()))
        .await
        .unwrap();

    assert_eq!(
        next_text(&mut client).await,
        r#"{"type":"pong","data":"Server pong"}"#
    );

    server.shutdown.trigger();
}

#[tokio::test]
async fn traffic_client_receives_updates() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws").await;

    let frame = next_text(&mut client).await;
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "traffic_update");
    for axis in ["ns", "ew"] {
        let color = value[axis]["color"].as_str().unwrap();
        assert!(["red", "green", "yellow"].contains(&color));
        assert!(value[axis]["timer"].as_u64().unwrap() >= 1);
    }
    // Both axes are never green together.
    assert!(!(value["ns"]["color"] == "green" && value["ew"]["color"] == "green"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_closes_clients_and_stops_loop() {
    let server = start().await;
    let mut client = connect(server.addr, "/ws/echo").await;

    // Make sure the loop has adopted the connection.
    client.send(Message::Text("hi".into())).await.unwrap();
    next_text(&mut client).await;

    server.shutdown.trigger();
    let summary = tokio::time::timeout(WAIT, server.event_loop)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.reason, StopReason::ShutdownRequested);
    assert_eq!(summary.released_connections, 1);

    // The socket task sees its queue close and sends a close frame.
    let closed = tokio::time::timeout(WAIT, async {
        while let Some(msg) = client.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .unwrap();
    assert!(closed);
}
