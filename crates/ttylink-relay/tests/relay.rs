//! End-to-end relay scenarios against a real server on an ephemeral port.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use ttylink_relay::http::{app, AppState};
use ttylink_relay::registry::DeviceRegistry;
use ttylink_relay::sweeper;

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_server(sweep_interval: Option<Duration>) -> SocketAddr {
    let registry = DeviceRegistry::new();
    if let Some(interval) = sweep_interval {
        tokio::spawn(sweeper::run(registry.clone(), interval));
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(AppState::new(registry), Path::new("./www"));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
        .await
        .unwrap();
    ws
}

async fn recv_json(ws: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame");
        match frame {
            Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("connection ended unexpectedly: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Ping/pong round trip; doubles as a barrier that the server has
/// finished processing everything we sent before it.
async fn sync_device(ws: &mut Client) {
    send_json(ws, json!({"type": "ping"})).await;
    assert_eq!(recv_json(ws).await, json!({"type": "pong"}));
}

async fn list_devices(addr: SocketAddr) -> Vec<String> {
    reqwest::get(format!("http://{addr}/list"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn expect_closed(ws: &mut Client) {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    });
    deadline.await.expect("connection was not closed");
}

#[tokio::test]
async fn login_and_relay_both_directions() {
    let addr = spawn_server(None).await;

    let mut device = connect(addr, "/ws/device?did=dev1").await;
    sync_device(&mut device).await;
    assert_eq!(list_devices(addr).await, vec!["dev1"]);

    let mut browser = connect(addr, "/ws/browser?did=dev1").await;
    let login = recv_json(&mut browser).await;
    let sid = login["sid"].as_str().expect("browser login carries sid");
    assert_eq!(login, json!({"type": "login", "sid": sid}));

    let device_login = recv_json(&mut device).await;
    assert_eq!(
        device_login,
        json!({"type": "login", "did": "dev1", "sid": sid})
    );

    // Device → browser, payload untouched.
    let output = json!({"type": "data", "sid": sid, "payload": "ls\n"});
    send_json(&mut device, output.clone()).await;
    assert_eq!(recv_json(&mut browser).await, output);

    // Browser → device, payload untouched.
    let input = json!({"type": "data", "did": "dev1", "sid": sid, "payload": "whoami\n"});
    send_json(&mut browser, input.clone()).await;
    assert_eq!(recv_json(&mut device).await, input);
}

#[tokio::test]
async fn login_against_unregistered_device_is_rejected() {
    let addr = spawn_server(None).await;

    let mut browser = connect(addr, "/ws/browser?did=ghost").await;
    assert_eq!(
        recv_json(&mut browser).await,
        json!({"type": "login", "err": "Device off-line"})
    );
    expect_closed(&mut browser).await;
    assert!(list_devices(addr).await.is_empty());
}

#[tokio::test]
async fn duplicate_device_id_is_rejected_and_original_survives() {
    let addr = spawn_server(None).await;

    let mut first = connect(addr, "/ws/device?did=dev1").await;
    sync_device(&mut first).await;

    let mut second = connect(addr, "/ws/device?did=dev1").await;
    assert_eq!(
        recv_json(&mut second).await,
        json!({"type": "add", "err": "ID conflicts"})
    );
    expect_closed(&mut second).await;

    // The original registration is untouched.
    sync_device(&mut first).await;
    assert_eq!(list_devices(addr).await, vec!["dev1"]);
}

#[tokio::test]
async fn browser_disconnect_logs_the_session_out() {
    let addr = spawn_server(None).await;

    let mut device = connect(addr, "/ws/device?did=dev1").await;
    sync_device(&mut device).await;

    let mut browser = connect(addr, "/ws/browser?did=dev1").await;
    let login = recv_json(&mut browser).await;
    let sid = login["sid"].as_str().unwrap().to_string();
    recv_json(&mut device).await; // login notification

    browser.close(None).await.unwrap();

    assert_eq!(
        recv_json(&mut device).await,
        json!({"type": "logout", "did": "dev1", "sid": sid})
    );
}

#[tokio::test]
async fn device_disconnect_tears_down_its_sessions() {
    let addr = spawn_server(None).await;

    let mut device = connect(addr, "/ws/device?did=dev1").await;
    sync_device(&mut device).await;

    let mut browser = connect(addr, "/ws/browser?did=dev1").await;
    let login = recv_json(&mut browser).await;
    let sid = login["sid"].as_str().unwrap().to_string();
    recv_json(&mut device).await; // login notification

    device.close(None).await.unwrap();

    assert_eq!(
        recv_json(&mut browser).await,
        json!({"type": "logout", "did": "dev1", "sid": sid})
    );
    expect_closed(&mut browser).await;
}

#[tokio::test]
async fn silent_device_is_swept_out() {
    let addr = spawn_server(Some(Duration::from_millis(50))).await;

    let mut device = connect(addr, "/ws/device?did=dev1").await;
    sync_device(&mut device).await;
    assert_eq!(list_devices(addr).await, vec!["dev1"]);

    // Three sweep ticks with no heartbeat.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(list_devices(addr).await.is_empty());
    expect_closed(&mut device).await;
}
