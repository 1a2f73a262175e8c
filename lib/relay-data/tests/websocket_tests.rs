//! WebSocket multiplexer tests against a local echo server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert2::{check, let_assert};
use futures_util::{SinkExt, StreamExt};
use relay::Pipeline;
use relay_data::{
    CrudClient, DataError, Identity, PollingRealtimeSource, RealtimeConfig, WsConfig,
    WsMultiplexer,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    id: u32,
    name: String,
}

#[derive(Clone, Default)]
struct ServerOptions {
    /// Close the first connection right after the handshake.
    drop_first: bool,
    /// Frame pushed to every client after the handshake.
    greeting: Option<String>,
}

/// Echo server. Returns its URL and the number of accepted connections.
async fn spawn_server(options: ServerOptions) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let options = options.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                if options.drop_first && index == 0 {
                    ws.close(None).await.ok();
                    return;
                }
                if let Some(greeting) = options.greeting {
                    ws.send(Message::text(greeting)).await.ok();
                }
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() && ws.send(message).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (format!("ws://{addr}/ws"), connections)
}

#[tokio::test]
async fn messages_are_routed_by_type() {
    let (url, _) = spawn_server(ServerOptions::default()).await;
    let ws = WsMultiplexer::new();
    let mut chat = ws.on::<Value>("chat");

    ws.connect(WsConfig::new(url)).await.expect("connect");
    check!(ws.is_connected());

    ws.send("presence", &json!({"user": "ann"})).expect("send");
    ws.send("chat", &json!({"text": "hello"})).expect("send");

    let_assert!(Ok(Some(payload)) = timeout(WAIT, chat.next()).await);
    check!(payload == json!({"text": "hello"}));
}

#[tokio::test]
async fn several_subscribers_receive_the_same_message() {
    let (url, _) = spawn_server(ServerOptions::default()).await;
    let ws = WsMultiplexer::new();
    let mut first = ws.on::<String>("note");
    let mut second = ws.clone().on::<String>("note");

    ws.connect(WsConfig::new(url)).await.expect("connect");
    ws.send("note", &"ping").expect("send");

    let_assert!(Ok(Some(a)) = timeout(WAIT, first.next()).await);
    let_assert!(Ok(Some(b)) = timeout(WAIT, second.next()).await);
    check!(a == "ping");
    check!(b == "ping");
}

#[tokio::test]
async fn all_messages_stream_sees_every_type() {
    let (url, _) = spawn_server(ServerOptions::default()).await;
    let ws = WsMultiplexer::new();
    let mut all = ws.messages();

    ws.connect(WsConfig::new(url)).await.expect("connect");
    ws.send("presence", &json!({"user": "ann"})).expect("send");
    ws.send("chat", &json!({"text": "hello"})).expect("send");

    let_assert!(Ok(Some(first)) = timeout(WAIT, all.next()).await);
    let_assert!(Ok(Some(second)) = timeout(WAIT, all.next()).await);
    check!(first.kind == "presence");
    check!(first.data == json!({"user": "ann"}));
    check!(second.kind == "chat");
    check!(second.timestamp > 0);
}

#[tokio::test]
async fn manual_reconnect_reuses_the_last_settings() {
    let (url, connections) = spawn_server(ServerOptions::default()).await;
    let ws = WsMultiplexer::new();
    let mut chat = ws.on::<String>("chat");

    ws.connect(WsConfig::new(url)).await.expect("connect");
    ws.reconnect().await.expect("reconnect");

    check!(ws.is_connected());
    check!(connections.load(Ordering::SeqCst) == 2);

    ws.send("chat", &"after reconnect").expect("send");
    let_assert!(Ok(Some(text)) = timeout(WAIT, chat.next()).await);
    check!(text == "after reconnect");
}

#[tokio::test]
async fn disconnect_closes_the_connection() {
    let (url, _) = spawn_server(ServerOptions::default()).await;
    let ws = WsMultiplexer::new();

    ws.connect(WsConfig::new(url)).await.expect("connect");
    ws.disconnect();

    check!(!ws.is_connected());
    let_assert!(Err(DataError::NotConnected) = ws.send("chat", &"late"));
}

#[tokio::test]
async fn dropped_connection_is_reestablished() {
    let (url, connections) = spawn_server(ServerOptions {
        drop_first: true,
        ..ServerOptions::default()
    })
    .await;
    let ws = WsMultiplexer::new();
    let mut chat = ws.on::<String>("chat");

    let config = WsConfig::new(url).with_reconnect_interval(Duration::from_millis(50));
    ws.connect(config).await.expect("connect");

    let reconnected = timeout(WAIT, async {
        while connections.load(Ordering::SeqCst) < 2 || !ws.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    check!(reconnected.is_ok());

    ws.send("chat", &"again").expect("send");
    let_assert!(Ok(Some(text)) = timeout(WAIT, chat.next()).await);
    check!(text == "again");
}

#[tokio::test]
async fn without_reconnect_a_drop_is_final() {
    let (url, connections) = spawn_server(ServerOptions {
        drop_first: true,
        ..ServerOptions::default()
    })
    .await;
    let ws = WsMultiplexer::new();

    ws.connect(WsConfig::new(url).with_reconnect(false))
        .await
        .expect("connect");

    let dropped = timeout(WAIT, async {
        while ws.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    check!(dropped.is_ok());
    tokio::time::sleep(Duration::from_millis(200)).await;
    check!(connections.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn realtime_source_publishes_websocket_updates() {
    let greeting = json!({
        "type": "items:updated",
        "data": [{"id": 1, "name": "laptop"}, {"id": 2, "name": "phone"}],
        "timestamp": 0,
    });
    let (url, _) = spawn_server(ServerOptions {
        greeting: Some(greeting.to_string()),
        ..ServerOptions::default()
    })
    .await;

    // Polling is off, so the backend is never contacted
    let client = CrudClient::new(
        Pipeline::default(),
        "http://127.0.0.1:1/api/items",
        Identity::<Item>::new(),
    );
    let config = RealtimeConfig::default()
        .with_websocket(url)
        .with_websocket_event("items:updated")
        .with_polling(false);
    let source = PollingRealtimeSource::new(client, config);
    let mut data = source.data();

    source.start();
    let_assert!(Ok(Ok(())) = timeout(WAIT, data.changed()).await);
    check!(data.borrow().len() == 2);
    check!(source.websocket().is_connected());

    source.stop();
    check!(!source.websocket().is_connected());
}

#[tokio::test]
async fn single_item_payload_becomes_a_one_item_list() {
    let greeting = json!({
        "type": "data:updated",
        "data": {"id": 7, "name": "tablet"},
    });
    let (url, _) = spawn_server(ServerOptions {
        greeting: Some(greeting.to_string()),
        ..ServerOptions::default()
    })
    .await;

    let client = CrudClient::new(
        Pipeline::default(),
        "http://127.0.0.1:1/api/items",
        Identity::<Item>::new(),
    );
    let config = RealtimeConfig::default()
        .with_websocket(url)
        .with_polling(false);
    let source = PollingRealtimeSource::new(client, config);
    let mut data = source.data();

    source.start();
    let_assert!(Ok(Ok(())) = timeout(WAIT, data.changed()).await);
    check!(source.current() == vec![Item { id: 7, name: "tablet".into() }]);
}
