//! Host-triggered events: handler dispatch, acks and the catch-all.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use logspyq::models::{Options, Reply};
use logspyq::proxy::{handler, normalizing};
use logspyq::transport::frame::Frame;
use logspyq::transport::Transport;
use logspyq::AppError;

use super::test_helpers::{connect, host_event, next_ack, next_event};

#[tokio::test]
async fn handler_return_value_is_acked() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    transport
        .on(
            "slash-command-count",
            normalizing(handler(|args| async move { Ok(Some(json!(args.len()))) })),
        )
        .unwrap();

    transport.receive(host_event(
        "slash-command-count",
        vec![json!("a"), json!("b")],
        Some(9),
    ));

    assert_eq!(next_ack(&mut host).await, (9, json!(2)));
}

#[tokio::test]
async fn handler_arguments_are_normalized() {
    let transport = Arc::new(Transport::default());
    let (_sid, _host) = connect(&transport);
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Vec<Reply>>();

    transport
        .on(
            "changed",
            normalizing(handler(move |args| {
                let seen_tx = seen_tx.clone();
                async move {
                    let _ = seen_tx.send(args);
                    Ok(None)
                }
            })),
        )
        .unwrap();

    transport.receive(host_event(
        "changed",
        vec![json!("null"), json!({"uuid": "x"}), json!([1, 2])],
        None,
    ));

    let args = seen_rx.recv().await.unwrap();
    assert_eq!(args[0], Reply::Absent);
    assert_eq!(args[1].get_str("uuid"), Some("x"));
    assert_eq!(args[2].as_list().map(<[Value]>::len), Some(2));
}

#[tokio::test]
async fn last_subscription_wins() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    transport
        .on("ev", normalizing(handler(|_| async { Ok(Some(json!("first"))) })))
        .unwrap();
    transport
        .on("ev", normalizing(handler(|_| async { Ok(Some(json!("second"))) })))
        .unwrap();
    assert_eq!(transport.subscriptions(), vec!["ev".to_owned()]);

    transport.receive(host_event("ev", Vec::new(), Some(1)));
    assert_eq!(next_ack(&mut host).await, (1, json!("second")));
}

#[tokio::test]
async fn subscribing_without_a_host_fails() {
    let transport = Transport::default();
    let err = transport
        .on("ev", normalizing(handler(|_| async { Ok(None) })))
        .unwrap_err();
    assert!(matches!(err, AppError::NotConnected(_)));
    assert!(!transport.is_subscribed("ev"));
}

#[tokio::test]
async fn unhandled_event_with_ack_gets_null() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    transport.receive(host_event("nobody-listens", Vec::new(), Some(4)));
    assert_eq!(next_ack(&mut host).await, (4, Value::Null));
}

#[tokio::test]
async fn catch_all_sees_event_name_first() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    transport.set_catch_all(normalizing(handler(|args| async move {
        Ok(args.into_iter().next().map(Reply::into_value))
    })));

    transport.receive(host_event("mystery", vec![json!(1)], Some(2)));
    assert_eq!(next_ack(&mut host).await, (2, json!("mystery")));
}

#[tokio::test]
async fn handler_error_is_reported_in_the_ack() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    transport
        .on(
            "boom",
            normalizing(handler(|_| async {
                Err(AppError::Handler("exploded".into()))
            })),
        )
        .unwrap();

    transport.receive(host_event("boom", Vec::new(), Some(3)));
    let (ack, data) = next_ack(&mut host).await;
    assert_eq!(ack, 3);
    assert!(data["error"].as_str().unwrap().contains("exploded"));
}

#[tokio::test]
async fn handler_may_await_its_own_request() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    let inner = Arc::clone(&transport);
    transport
        .on(
            "slash-command-lookup",
            normalizing(handler(move |_| {
                let inner = Arc::clone(&inner);
                async move {
                    let block = inner
                        .request("Editor.getCurrentBlock", Vec::new(), Options::new(), None)
                        .await?;
                    Ok(block.get("uuid").cloned())
                }
            })),
        )
        .unwrap();

    transport.receive(host_event("slash-command-lookup", Vec::new(), Some(70)));

    let (event, _, ack) = next_event(&mut host).await;
    assert_eq!(event, "Editor.getCurrentBlock");
    transport.receive(Frame::Ack {
        ack: ack.unwrap(),
        data: json!({"uuid": "b7"}),
    });

    assert_eq!(next_ack(&mut host).await, (70, json!("b7")));
}

#[tokio::test]
async fn unbinding_one_owner_leaves_the_others_subscribed() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);
    transport
        .bind("a", "changed", normalizing(handler(|_| async { Ok(Some(json!("a"))) })))
        .unwrap();
    transport
        .bind("b", "changed", normalizing(handler(|_| async { Ok(Some(json!("b"))) })))
        .unwrap();

    assert!(transport.unbind("b", "changed"));
    assert!(!transport.unbind("b", "changed"));
    assert_eq!(transport.subscriptions(), vec!["changed".to_owned()]);

    transport.receive(host_event("changed", Vec::new(), Some(5)));
    assert_eq!(next_ack(&mut host).await, (5, json!("a")));

    assert!(transport.unbind("a", "changed"));
    assert!(!transport.is_subscribed("changed"));
}
