//! WebSocket host endpoint: one JSON frame per text message.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info_span, warn, Instrument};

use super::connection::HostSession;
use crate::agent::Registry;
use crate::transport::frame::Frame;

/// Handler for `GET /socket`.
pub async fn socket(ws: WebSocketUpgrade, State(registry): State<Arc<Registry>>) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, registry))
}

async fn run_socket(socket: WebSocket, registry: Arc<Registry>) {
    let (session, mut outbound) = HostSession::attach(registry);
    let span = info_span!("host_ws", sid = %session.sid());

    async move {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        debug!("outbound queue closed, connection replaced");
                        break;
                    };
                    let text = match frame.to_json() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(%err, "could not encode outbound frame");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        warn!(%err, "websocket write failed");
                        break;
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => match Frame::parse(text.as_str()) {
                            Ok(frame) => session.receive(frame),
                            Err(err) => warn!(%err, "skipping malformed websocket frame"),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(%err, "websocket read failed");
                            break;
                        }
                    }
                }
            }
        }

        session.close();
    }
    .instrument(span)
    .await;
}
