use crate::broker::MessageBroker;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::websocket::serve;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const HOST_ORIGIN: &str = "http://shell.example:8080";

async fn start_server(max_connections: usize) -> (String, MessageBroker) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    let broker = MessageBroker::new(HOST_ORIGIN);
    tokio::spawn(serve(listener, broker.clone(), max_connections));
    (format!("ws://{addr}"), broker)
}

async fn connect_with_origin(url: &str, origin: Option<&str>) -> Result<Ws, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    if let Some(origin) = origin {
        request
            .headers_mut()
            .insert("Origin", origin.parse().unwrap());
    }
    tokio_tungstenite::connect_async(request)
        .await
        .map(|(ws, _)| ws)
}

async fn send(ws: &mut Ws, msg: ClientMessage) {
    ws.send(WsMessage::Text(serde_json::to_string(&msg).unwrap().into()))
        .await
        .expect("Failed to send");
}

async fn recv(ws: &mut Ws) -> ServerMessage {
    let frame = ws
        .next()
        .await
        .expect("Did not receive response")
        .unwrap();
    let raw_data = frame.into_data();
    serde_json::from_slice(&raw_data).unwrap_or_else(|e| {
        panic!(
            "Failed to deserialize ServerMessage from '{:?}': {}",
            raw_data, e
        )
    })
}

fn channels() -> Vec<crate::broker::message::ChannelSpec> {
    vec![crate::broker::message::ChannelSpec::new("ch1", "1.0")]
}

#[tokio::test]
async fn test_publish_over_websocket() {
    let (url, broker) = start_server(16).await;
    let mut a = connect_with_origin(&url, Some(HOST_ORIGIN)).await.unwrap();
    let mut b = connect_with_origin(&url, Some(HOST_ORIGIN)).await.unwrap();

    send(&mut a, ClientMessage::Connect { client_id: "a".into() }).await;
    assert_eq!(recv(&mut a).await, ServerMessage::ok("connect"));
    send(&mut a, ClientMessage::Subscribe { channels: channels() }).await;
    assert_eq!(recv(&mut a).await, ServerMessage::ok("subscribe"));

    send(&mut b, ClientMessage::Connect { client_id: "b".into() }).await;
    assert_eq!(recv(&mut b).await, ServerMessage::ok("connect"));
    send(&mut b, ClientMessage::Subscribe { channels: channels() }).await;
    assert_eq!(recv(&mut b).await, ServerMessage::ok("subscribe"));

    // a learns about b
    match recv(&mut a).await {
        ServerMessage::ClientConnection { client_id, .. } => assert_eq!(client_id, "b"),
        other => panic!("Expected client_connection, got {other:?}"),
    }

    send(
        &mut a,
        serde_json::from_value(json!({
            "type": "publish",
            "channel_id": "ch1",
            "message_id": "m1",
            "message_name": "greet",
            "targets": ["*"],
            "data": "hello"
        }))
        .unwrap(),
    )
    .await;

    match recv(&mut a).await {
        ServerMessage::Published { deliveries, .. } => {
            assert_eq!(deliveries.len(), 1);
            assert_eq!(deliveries[0].target_client_id, "b");
        }
        other => panic!("Expected published, got {other:?}"),
    }
    assert_eq!(
        recv(&mut b).await,
        ServerMessage::Message {
            source_client_id: "a".into(),
            channel_id: "ch1".into(),
            message_name: "greet".into(),
            data: json!("hello"),
        }
    );

    assert_eq!(broker.get_subscribed_clients()["ch1"].len(), 2);
}

#[tokio::test]
async fn test_rejects_unaccepted_origin() {
    let (url, broker) = start_server(16).await;

    let res = connect_with_origin(&url, Some("http://evil.example")).await;
    match res {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 403),
        Err(e) => panic!("Expected HTTP 403, got {e}"),
        Ok(_) => panic!("Expected HTTP 403, but the upgrade was accepted"),
    }

    broker.add_accepted_origin("http://evil.example");
    assert!(connect_with_origin(&url, Some("http://evil.example")).await.is_ok());
}

#[tokio::test]
async fn test_accepts_request_without_origin() {
    let (url, _broker) = start_server(16).await;
    assert!(connect_with_origin(&url, None).await.is_ok());
}

#[tokio::test]
async fn test_close_disconnects_client() {
    let (url, broker) = start_server(16).await;
    let mut a = connect_with_origin(&url, None).await.unwrap();

    send(&mut a, ClientMessage::Connect { client_id: "a".into() }).await;
    assert_eq!(recv(&mut a).await, ServerMessage::ok("connect"));
    assert!(broker.is_connected("a"));

    a.close(None).await.expect("Failed to close WebSocket");
    // drain until the server acknowledges the close
    while let Some(Ok(_)) = a.next().await {}

    for _ in 0..50 {
        if !broker.is_connected("a") {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    assert!(!broker.is_connected("a"));
}

#[tokio::test]
async fn test_invalid_json_gets_error_reply() {
    let (url, _broker) = start_server(16).await;
    let mut a = connect_with_origin(&url, None).await.unwrap();

    a.send(WsMessage::Text("not json".to_string().into()))
        .await
        .unwrap();

    match recv(&mut a).await {
        ServerMessage::Error { op, .. } => assert_eq!(op, "parse"),
        other => panic!("Expected error, got {other:?}"),
    }
}
