//! End-to-end host session over the WebSocket endpoint.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use logspyq::agent::{Catalog, Registry};
use logspyq::scheduler::Scheduler;
use logspyq::server::serve_http;
use logspyq::transport::frame::Frame;
use logspyq::transport::Transport;

use super::test_helpers::memory_store;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsHost {
    socket: Socket,
}

impl WsHost {
    async fn send(&mut self, text: &str) {
        self.socket.send(Message::text(text)).await.unwrap();
    }

    async fn send_frame(&mut self, frame: &Frame) {
        let text = frame.to_json().unwrap();
        self.send(&text).await;
    }

    async fn recv(&mut self) -> Frame {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), self.socket.next())
                .await
                .expect("message within deadline")
                .expect("socket open")
                .unwrap();
            if let Message::Text(text) = message {
                return Frame::parse(text.as_str()).unwrap();
            }
        }
    }

    async fn expect_event(&mut self, name: &str) -> (Value, Option<u64>) {
        match self.recv().await {
            Frame::Event { event, args, ack } => {
                assert_eq!(event, name);
                (args.into_iter().next().unwrap_or(Value::Null), ack)
            }
            other => panic!("expected {name}, got {other:?}"),
        }
    }
}

async fn start(enabled: &[&str]) -> (WsHost, Arc<Registry>, CancellationToken) {
    let store = memory_store().await;
    for name in enabled {
        store.set_enabled(name, true).await.unwrap();
    }
    let registry = Arc::new(
        Registry::multi(
            Arc::new(Transport::default()),
            store,
            Arc::new(Scheduler::new()),
            &Catalog::builtin(),
        )
        .await
        .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ct = CancellationToken::new();
    tokio::spawn(serve_http(listener, Arc::clone(&registry), ct.clone()));

    let (socket, _) = connect_async(format!("ws://{addr}/socket")).await.unwrap();
    (WsHost { socket }, registry, ct)
}

async fn wait_until(registry: &Registry, connected: bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while registry.transport().is_connected() != connected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection state reached");
}

#[tokio::test]
async fn ready_then_slash_command_round_trip() {
    let (mut host, registry, ct) = start(&["bye"]).await;

    host.send("{ not a frame").await;
    host.send(r#"{"type":"event","event":"ready","args":[],"ack":7}"#)
        .await;

    let (payload, ack) = host.expect_event("Editor.registerSlashCommand").await;
    assert_eq!(ack, None);
    assert_eq!(payload["command"], "bye");
    assert_eq!(payload["event_name"], "slash-command-bye");
    assert_eq!(host.recv().await, Frame::Ack { ack: 7, data: Value::Null });
    assert!(registry.agent("bye").unwrap().is_enabled());

    host.send_frame(&Frame::Event {
        event: "slash-command-bye".into(),
        args: vec![json!({"uuid": "b1"})],
        ack: Some(8),
    })
    .await;

    let (payload, _) = host.expect_event("Editor.insertAtEditingCursor").await;
    assert_eq!(payload["args"], json!(["Seeya later, World!"]));
    assert_eq!(host.recv().await, Frame::Ack { ack: 8, data: Value::Null });

    ct.cancel();
}

#[tokio::test]
async fn agent_requests_are_answered_over_the_socket() {
    let (mut host, registry, ct) = start(&[]).await;
    wait_until(&registry, true).await;

    let transport = Arc::clone(registry.transport());
    let call = tokio::spawn(async move {
        transport
            .request("App.getCurrentGraph", Vec::new(), Default::default(), None)
            .await
    });

    let (_, ack) = host.expect_event("App.getCurrentGraph").await;
    host.send_frame(&Frame::Ack {
        ack: ack.unwrap(),
        data: json!({"name": "notes"}),
    })
    .await;

    let reply = call.await.unwrap().unwrap();
    assert_eq!(reply.get_str("name"), Some("notes"));

    ct.cancel();
}

#[tokio::test]
async fn close_message_detaches_the_host() {
    let (mut host, registry, ct) = start(&["hello"]).await;
    wait_until(&registry, true).await;

    host.socket.close(None).await.unwrap();
    wait_until(&registry, false).await;
    assert_eq!(registry.transport().pending_requests(), 0);

    ct.cancel();
}
