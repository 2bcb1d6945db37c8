//! Per-connection tasks: register or log in, then pump frames between the
//! socket and the outbound queue until either side goes away.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use ttylink_common::{Message, ERR_DEVICE_OFFLINE, ERR_ID_CONFLICT};

use crate::broker::SessionBroker;
use crate::registry::{ConnectionHandle, DeviceRegistry, Frame};
use crate::router;

/// Drive a device connection for its whole lifetime.
pub async fn device(socket: WebSocket, did: String, registry: DeviceRegistry) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut rx) = ConnectionHandle::channel();

    if !registry.register(&did, handle.clone()).await {
        tracing::warn!(device = %did, "rejecting duplicate device id");
        let _ = send(
            &mut sink,
            &Message::Add {
                err: ERR_ID_CONFLICT.into(),
            },
        )
        .await;
        let _ = sink.close().await;
        return;
    }

    tracing::info!(device = %did, "device registered");

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                match frame {
                    Frame::Message(msg) => {
                        if send(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    Frame::Close => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<Message>(&text) {
                            Ok(msg) => router::from_device(&registry, &did, msg).await,
                            Err(e) => {
                                tracing::debug!(device = %did, error = %e, "undecodable frame, ignoring");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(device = %did, error = %e, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(device = %did, "device disconnected");
    // Only remove our own registration: the sweeper may have evicted it
    // and the id re-registered while our close was still queued.
    registry.evict_if(&did, &handle).await;
}

/// Drive a browser connection for its whole lifetime.
pub async fn browser(
    socket: WebSocket,
    did: String,
    registry: DeviceRegistry,
    broker: SessionBroker,
) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut rx) = ConnectionHandle::channel();

    let sid = match broker.login(&did, handle).await {
        Ok(sid) => sid,
        Err(e) => {
            tracing::warn!(device = %did, error = %e, "browser login rejected");
            let _ = send(
                &mut sink,
                &Message::Login {
                    did: None,
                    sid: None,
                    err: Some(ERR_DEVICE_OFFLINE.into()),
                },
            )
            .await;
            let _ = sink.close().await;
            return;
        }
    };

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                match frame {
                    Frame::Message(msg) => {
                        if send(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    Frame::Close => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<Message>(&text) {
                            Ok(msg) => router::from_browser(&registry, msg).await,
                            Err(e) => {
                                tracing::debug!(device = %did, error = %e, "undecodable frame, ignoring");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(device = %did, error = %e, "websocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(device = %did, session = %sid, "browser disconnected");

    // Closing the browser implicitly ends its session; the device may
    // already be gone, which is fine here.
    if let Err(e) = broker.logout(&did, &sid).await {
        tracing::debug!(device = %did, error = %e, "logout after disconnect");
    }
}

/// Encode a protocol message as a JSON text frame and send it.
async fn send(
    sink: &mut SplitSink<WebSocket, WsMessage>,
    msg: &Message,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sink.send(WsMessage::Text(json.into())).await
}
