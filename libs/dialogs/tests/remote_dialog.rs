use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use toybox_core::testkit::{RecordingSink, message_turn};
use toybox_core::{MemoryStorage, TurnContext};
use toybox_dialogs::{
    DialogContext, DialogError, DialogSet, DialogTurnResult, DialogTurnStatus, RemoteDialog,
};
use toybox_memory::{MemoryFragment, MemoryScope};

#[derive(Default)]
struct Script {
    replies: Mutex<VecDeque<(StatusCode, String)>>,
    received: Mutex<Vec<Value>>,
}

impl Script {
    fn reply(&self, status: StatusCode, body: Value) {
        self.replies
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

/// Serves `script` on a random local port. A bind failure fails the test
/// unless `TOYBOX_SKIP_NETWORK_TESTS` is set, in which case it yields `None`.
async fn remote_bot(script: Arc<Script>) -> Option<SocketAddr> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) if std::env::var_os("TOYBOX_SKIP_NETWORK_TESTS").is_some() => {
            eprintln!("skipping remote dialog test: {err}");
            return None;
        }
        Err(err) => panic!("cannot bind mock remote bot: {err}"),
    };
    let app = Router::new().route(
        "/api/messages",
        post(move |Json(payload): Json<Value>| {
            let script = script.clone();
            async move {
                script.received.lock().unwrap().push(payload);
                script
                    .replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((StatusCode::OK, "[]".into()))
            }
        }),
    );
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app.into_make_service()).await {
            eprintln!("remote bot mock error: {err}");
        }
    });
    Some(addr)
}

struct Relay {
    scope: Arc<MemoryScope>,
    stack: MemoryFragment,
    dialogs: Arc<DialogSet>,
}

impl Relay {
    fn new(addr: SocketAddr) -> Self {
        let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
        let stack = scope.fragment("dialogState").unwrap();
        let mut dialogs = DialogSet::new();
        dialogs
            .add(
                "remote",
                RemoteDialog::from_url(&format!("http://{addr}/api/messages")).unwrap(),
            )
            .unwrap();
        Self {
            scope,
            stack,
            dialogs: Arc::new(dialogs),
        }
    }

    async fn context(&self, ctx: &TurnContext) -> DialogContext {
        self.dialogs.create_context(ctx, &self.stack).await.unwrap()
    }
}

#[tokio::test]
async fn relays_turns_until_end_of_conversation() {
    let script = Arc::new(Script::default());
    let Some(addr) = remote_bot(script.clone()).await else {
        return;
    };
    script.reply(StatusCode::OK, json!([{"type": "message", "text": "hi"}]));
    script.reply(
        StatusCode::OK,
        json!([
            {"type": "message", "text": "bye"},
            {"type": "endOfConversation", "value": {"x": 1}}
        ]),
    );
    let relay = Relay::new(addr);
    let sink = Arc::new(RecordingSink::default());

    let first = message_turn("book a flight", sink.clone());
    let mut dc = relay.context(&first).await;
    let started = dc
        .begin_dialog("remote", Some(json!({"intent": "flight"})))
        .await
        .unwrap();
    assert_eq!(started.status, DialogTurnStatus::Waiting);
    assert_eq!(dc.stack_depth(), 1);
    assert_eq!(sink.texts().await, vec!["hi"]);
    relay.scope.save_changes(&first).await.unwrap();

    let second = message_turn("to Oslo", sink.clone());
    let mut dc = relay.context(&second).await;
    let done = dc.continue_dialog().await.unwrap();
    assert_eq!(done, DialogTurnResult::complete(Some(json!({"x": 1}))));
    assert_eq!(dc.stack_depth(), 0);
    // endOfConversation is consumed, never forwarded.
    let sent = sink.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|activity| activity.is_message()));

    let received = script.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["type"], "event");
    assert_eq!(received[0]["name"], "dialogBegin");
    assert_eq!(received[0]["value"], json!({"intent": "flight"}));
    assert_eq!(received[0]["conversation"]["id"], "conv-1");
    assert_eq!(received[1]["type"], "message");
    assert_eq!(received[1]["text"], "to Oslo");
    assert!(received.iter().all(|body| body.get("serviceUrl").is_none()));
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let script = Arc::new(Script::default());
    let Some(addr) = remote_bot(script.clone()).await else {
        return;
    };
    script.reply(StatusCode::BAD_GATEWAY, json!({"error": "upstream"}));
    let relay = Relay::new(addr);
    let sink = Arc::new(RecordingSink::default());

    let ctx = message_turn("hello", sink.clone());
    let mut dc = relay.context(&ctx).await;
    let err = dc.begin_dialog("remote", None).await.unwrap_err();
    match err {
        DialogError::Transport { status, body } => {
            assert_eq!(status.as_u16(), 502);
            assert!(body.contains("upstream"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(sink.sent().await.is_empty());
}

#[tokio::test]
async fn computed_target_is_resolved_per_turn() {
    let script = Arc::new(Script::default());
    let Some(addr) = remote_bot(script.clone()).await else {
        return;
    };
    let remote = RemoteDialog::computed(move |ctx| {
        let channel = ctx.activity().channel_id.clone().unwrap_or_default();
        assert_eq!(channel, "test");
        format!("http://{addr}/api/messages")
            .parse()
            .map_err(|err| DialogError::InvalidTarget(format!("{err}")))
    });
    let mut dialogs = DialogSet::new();
    dialogs.add("remote", remote).unwrap();
    let dialogs = Arc::new(dialogs);

    let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
    let stack = scope.fragment("dialogState").unwrap();
    let ctx = message_turn("hello", Arc::new(RecordingSink::default()));
    let mut dc = dialogs.create_context(&ctx, &stack).await.unwrap();
    let started = dc.begin_dialog("remote", None).await.unwrap();

    // An empty array keeps the dialog waiting.
    assert_eq!(started.status, DialogTurnStatus::Waiting);
    assert_eq!(script.received().len(), 1);
}

#[tokio::test]
async fn end_of_conversation_on_begin_completes_immediately() {
    let script = Arc::new(Script::default());
    let Some(addr) = remote_bot(script.clone()).await else {
        return;
    };
    script.reply(
        StatusCode::OK,
        json!([{"type": "endOfConversation", "value": {"x": 1}}]),
    );
    let relay = Relay::new(addr);
    let sink = Arc::new(RecordingSink::default());

    let ctx = message_turn("quick one", sink.clone());
    let mut dc = relay.context(&ctx).await;
    let done = dc.begin_dialog("remote", None).await.unwrap();
    assert_eq!(done, DialogTurnResult::complete(Some(json!({"x": 1}))));
    assert_eq!(dc.stack_depth(), 0);
    assert!(sink.sent().await.is_empty());
}

#[tokio::test]
async fn failed_continue_keeps_the_dialog_active() {
    let script = Arc::new(Script::default());
    let Some(addr) = remote_bot(script.clone()).await else {
        return;
    };
    script.reply(StatusCode::OK, json!([{"type": "message", "text": "hi"}]));
    script.reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "crashed"}));
    let relay = Relay::new(addr);
    let sink = Arc::new(RecordingSink::default());

    let first = message_turn("start", sink.clone());
    let mut dc = relay.context(&first).await;
    dc.begin_dialog("remote", None).await.unwrap();
    relay.scope.save_changes(&first).await.unwrap();

    let second = message_turn("next", sink.clone());
    let mut dc = relay.context(&second).await;
    let err = dc.continue_dialog().await.unwrap_err();
    match err {
        DialogError::Transport { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert!(body.contains("crashed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(dc.stack_depth(), 1);
    assert_eq!(dc.active_dialog().unwrap().id, "remote");
    assert_eq!(sink.texts().await, vec!["hi"]);
}
