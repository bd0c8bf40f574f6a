//! CLI for framebus
//!
//! Subcommands:
//! - `server`: run the WebSocket broker
//! - `client`: connect, subscribe and publish once (useful for smoke tests)

use clap::Parser;
use framebus::broker::MessageBroker;
use framebus::config::{Settings, load_config};
use framebus::transport::start_websocket_server;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "framebus")]
enum Command {
    /// Start the WebSocket broker
    Server,
    /// Run a smoke-test client against a running broker
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Client id to connect as
        #[arg(long, default_value = "cli")]
        client_id: String,
        /// Channel to subscribe and publish on
        #[arg(long, default_value = "demo")]
        channel: String,
        /// Targets: `*` or a comma-separated list of client ids
        #[arg(long, default_value = "*")]
        targets: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cmd = Command::parse();

    match cmd {
        Command::Server => match load_config() {
            Ok(config) => {
                framebus::utils::logging::init(&config.log.level);
                if let Err(e) = run_server(config).await {
                    error!("Server failed: {}", e);
                }
            }
            Err(e) => {
                framebus::utils::logging::init("info");
                error!("Failed to load configuration: {}", e);
            }
        },
        Command::Client {
            url,
            client_id,
            channel,
            targets,
        } => {
            framebus::utils::logging::init("info");
            if let Err(e) = run_client(&url, &client_id, &channel, &targets).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = MessageBroker::from_settings(&config.broker);
    info!(
        "Accepted origins: {}",
        broker.get_accepted_origins().join(", ")
    );

    tokio::select! {
        res = start_websocket_server(addr, broker, config.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(
    url: &str,
    client_id: &str,
    channel: &str,
    targets: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use framebus::broker::{ChannelSpec, TargetClients};
    use framebus::transport::{ClientMessage, ServerMessage};
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    let targets: Vec<String> = targets
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let requests = [
        ClientMessage::Connect {
            client_id: client_id.to_string(),
        },
        ClientMessage::Subscribe {
            channels: vec![ChannelSpec::new(channel, "1.0")],
        },
        ClientMessage::Publish {
            channel_id: channel.to_string(),
            message_id: String::new(),
            message_name: "hello".to_string(),
            targets: TargetClients::from(targets),
            data: json!({ "from": client_id }),
        },
    ];

    for request in requests {
        let op = request.op();
        ws_stream
            .send(WsMessage::Text(serde_json::to_string(&request)?.into()))
            .await?;

        // skip pushed frames until the reply to this request arrives
        while let Some(frame) = ws_stream.next().await {
            let WsMessage::Text(text) = frame? else {
                continue;
            };
            let reply: ServerMessage = serde_json::from_str(text.as_str())?;
            info!("{op}: {reply:?}");
            if !matches!(
                reply,
                ServerMessage::Message { .. } | ServerMessage::ClientConnection { .. }
            ) {
                break;
            }
        }
    }

    ws_stream
        .send(WsMessage::Text(
            serde_json::to_string(&ClientMessage::Disconnect {})?.into(),
        ))
        .await?;
    ws_stream.close(None).await?;

    Ok(())
}
