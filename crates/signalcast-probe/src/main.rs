//! Command-line probe for a running Signalcast server.
//!
//! Connects to a `WebSocket` route, optionally sends one message, and
//! prints the replies it receives. Against `/ws/echo` it checks the
//! ack/pong protocol; against `/ws` it watches traffic updates.

use std::time::Duration;

use anyhow::{Context as _, bail};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use signalcast_types::ServerMessage;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "signalcast-probe")]
#[command(about = "Send a message to a Signalcast server and print the replies")]
struct Args {
    /// Server `WebSocket` URL
    #[arg(short, long, default_value = "ws://localhost:8080/ws/echo")]
    url: String,

    /// Text to send after connecting; empty sends nothing
    #[arg(short, long, default_value = "Hello Server!")]
    message: String,

    /// Number of replies to wait for before exiting
    #[arg(short, long, default_value = "1")]
    replies: u32,

    /// Seconds to wait for each reply
    #[arg(short, long, default_value = "5")]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let wait = Duration::from_secs(args.timeout);

    let (mut socket, _response) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;
    info!(url = %args.url, "Connected");

    if !args.message.is_empty() {
        socket
            .send(Message::Text(args.message.clone().into()))
            .await
            .context("failed to send message")?;
        info!(message = %args.message, "Sent");
    }

    let mut received: u32 = 0;
    while received < args.replies {
        let Ok(next) = tokio::time::timeout(wait, socket.next()).await else {
            bail!("no reply within {}s ({received}/{} received)", args.timeout, args.replies);
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                received = received.saturating_add(1);
                report(received, text.as_str());
            }
            Some(Ok(Message::Close(frame))) => {
                warn!(?frame, "Server closed the connection");
                break;
            }
            Some(Ok(other)) => debug!(?other, "Ignoring non-text frame"),
            Some(Err(e)) => return Err(e).context("connection error"),
            None => {
                warn!("Connection ended");
                break;
            }
        }
    }

    // The server may already be gone; nothing to do if the close fails.
    let _ = socket.close(None).await;
    info!(received, "Done");
    Ok(())
}

/// Print one reply, decoded when it matches the server schema.
fn report(index: u32, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::TrafficUpdate { ns, ew }) => info!(
            index,
            ns = %ns.color,
            ns_timer = ns.timer,
            ew = %ew.color,
            ew_timer = ew.timer,
            "Traffic update"
        ),
        Ok(ServerMessage::Pong { data }) => info!(index, data = %data, "Pong"),
        Ok(ServerMessage::Received { data }) => info!(index, data = %data, "Ack"),
        Err(_) => info!(index, raw = text, "Reply"),
    }
}
