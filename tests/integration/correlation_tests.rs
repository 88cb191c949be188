//! Request/reply correlation over a live transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use logspyq::models::{Options, Reply};
use logspyq::transport::frame::Frame;
use logspyq::transport::Transport;
use logspyq::AppError;

use super::test_helpers::{connect, next_event};

fn spawn_request(
    transport: &Arc<Transport>,
    event: &'static str,
    timeout: Option<Duration>,
) -> tokio::task::JoinHandle<logspyq::Result<Reply>> {
    let transport = Arc::clone(transport);
    tokio::spawn(async move {
        transport
            .request(event, vec![json!("arg")], Options::new(), timeout)
            .await
    })
}

#[tokio::test]
async fn object_reply_is_keyed() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    let call = spawn_request(&transport, "Editor.getCurrentBlock", None);
    let (event, payload, ack) = next_event(&mut host).await;
    assert_eq!(event, "Editor.getCurrentBlock");
    assert_eq!(payload["args"], json!(["arg"]));

    transport.receive(Frame::Ack {
        ack: ack.expect("request carries ack"),
        data: json!({"uuid": "b1", "content": "text"}),
    });

    let reply = call.await.unwrap().unwrap();
    assert_eq!(reply.get_str("uuid"), Some("b1"));
    assert!(reply.as_object().is_some());
}

#[tokio::test]
async fn list_reply_is_ordered() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    let call = spawn_request(&transport, "Editor.getPageBlocksTree", None);
    let (_, _, ack) = next_event(&mut host).await;
    transport.receive(Frame::Ack {
        ack: ack.unwrap(),
        data: json!([{"uuid": "a"}, {"uuid": "b"}]),
    });

    let reply = call.await.unwrap().unwrap();
    let items = reply.elements();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].get_str("uuid"), Some("a"));
    assert_eq!(items[1].get_str("uuid"), Some("b"));
}

#[tokio::test]
async fn null_and_sentinel_replies_are_absent() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    for data in [json!(null), json!("null")] {
        let call = spawn_request(&transport, "Editor.getCurrentPage", None);
        let (_, _, ack) = next_event(&mut host).await;
        transport.receive(Frame::Ack {
            ack: ack.unwrap(),
            data,
        });
        assert_eq!(call.await.unwrap().unwrap(), Reply::Absent);
    }
}

#[tokio::test]
async fn timeout_resolves_promptly_and_names_the_request() {
    let transport = Arc::new(Transport::default());
    let (_sid, _host) = connect(&transport);

    let started = Instant::now();
    let err = transport
        .request(
            "Editor.getCurrentBlock",
            vec![json!(1)],
            Options::new(),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(200));
    assert!(err.is_timeout());
    match err {
        AppError::Timeout { event, args } => {
            assert_eq!(event, "Editor.getCurrentBlock");
            assert_eq!(args, vec![json!(1)]);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(transport.pending_requests(), 0);
}

#[tokio::test]
async fn out_of_order_replies_reach_their_own_callers() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    let first = spawn_request(&transport, "App.getCurrentGraph", None);
    let (event_a, _, ack_a) = next_event(&mut host).await;
    let second = spawn_request(&transport, "Editor.getCurrentPage", None);
    let (event_b, _, ack_b) = next_event(&mut host).await;
    assert_eq!(event_a, "App.getCurrentGraph");
    assert_eq!(event_b, "Editor.getCurrentPage");
    assert_ne!(ack_a, ack_b);

    transport.receive(Frame::Ack {
        ack: ack_b.unwrap(),
        data: json!({"name": "page"}),
    });
    transport.receive(Frame::Ack {
        ack: ack_a.unwrap(),
        data: json!({"name": "graph"}),
    });

    assert_eq!(first.await.unwrap().unwrap().get_str("name"), Some("graph"));
    assert_eq!(second.await.unwrap().unwrap().get_str("name"), Some("page"));
}

#[tokio::test]
async fn late_reply_after_timeout_is_discarded() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    let call = spawn_request(&transport, "Editor.checkEditing", Some(Duration::from_millis(20)));
    let (_, _, ack) = next_event(&mut host).await;
    assert!(call.await.unwrap().unwrap_err().is_timeout());

    transport.receive(Frame::Ack {
        ack: ack.unwrap(),
        data: json!(true),
    });
    assert_eq!(transport.pending_requests(), 0);

    let next = spawn_request(&transport, "Editor.checkEditing", None);
    let (_, _, next_ack) = next_event(&mut host).await;
    assert_ne!(next_ack, ack);
    transport.receive(Frame::Ack {
        ack: next_ack.unwrap(),
        data: json!(false),
    });
    assert_eq!(next.await.unwrap().unwrap().as_bool(), Some(false));
}

#[tokio::test]
async fn calls_without_a_host_fail_not_connected() {
    let transport = Transport::default();

    let err = transport
        .request("Editor.getCurrentBlock", Vec::new(), Options::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotConnected(_)));

    let err = transport
        .emit("Editor.exitEditingMode", Vec::new(), Options::new())
        .unwrap_err();
    assert!(matches!(err, AppError::NotConnected(_)));
    assert_eq!(transport.pending_requests(), 0);
}

#[tokio::test]
async fn disconnect_fails_outstanding_requests() {
    let transport = Arc::new(Transport::default());
    let (sid, mut host) = connect(&transport);

    let call = spawn_request(&transport, "Editor.getCurrentBlock", None);
    let _ = next_event(&mut host).await;

    assert!(transport.detach(&sid));
    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Disconnected(_)), "got {err:?}");
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn reconnect_replaces_the_previous_host() {
    let transport = Arc::new(Transport::default());
    let (old_sid, mut old_host) = connect(&transport);

    let call = spawn_request(&transport, "Editor.getCurrentBlock", None);
    let _ = next_event(&mut old_host).await;

    let (new_sid, _new_host) = connect(&transport);
    assert_ne!(old_sid, new_sid);
    assert!(matches!(
        call.await.unwrap().unwrap_err(),
        AppError::Disconnected(_)
    ));

    assert!(!transport.detach(&old_sid), "stale session must not detach");
    assert_eq!(transport.sid(), Some(new_sid));
}

#[tokio::test]
async fn aborted_caller_releases_its_slot() {
    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);

    let call = spawn_request(&transport, "Editor.getCurrentBlock", Some(Duration::from_secs(60)));
    let (_, _, ack) = next_event(&mut host).await;
    assert_eq!(transport.pending_requests(), 1);

    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());
    assert_eq!(transport.pending_requests(), 0);

    transport.receive(Frame::Ack {
        ack: ack.unwrap(),
        data: json!({"uuid": "late"}),
    });
    assert_eq!(transport.pending_requests(), 0);
}

#[tokio::test]
async fn cancelled_job_does_not_leak_its_request() {
    use logspyq::proxy::handler;
    use logspyq::scheduler::{ScheduledJob, Scheduler, Trigger};

    let transport = Arc::new(Transport::default());
    let (_sid, mut host) = connect(&transport);
    let scheduler = Scheduler::new();

    let job_transport = Arc::clone(&transport);
    scheduler.add_job(&ScheduledJob {
        id: "demo:lookup".into(),
        trigger: Trigger::After(Duration::ZERO),
        handler: handler(move |_| {
            let transport = Arc::clone(&job_transport);
            async move {
                transport
                    .request("DB.q", vec![json!("(todo)")], Options::new(), Some(Duration::from_secs(60)))
                    .await?;
                Ok(None)
            }
        }),
    });

    let (event, _, _) = next_event(&mut host).await;
    assert_eq!(event, "DB.q");
    assert_eq!(transport.pending_requests(), 1);

    scheduler.cancel("demo:lookup");
    tokio::time::timeout(Duration::from_secs(1), async {
        while transport.pending_requests() != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("slot released after cancellation");
}
