use std::sync::Arc;

use serde_json::{Value, json};
use toybox_core::testkit::{RecordingSink, message_turn};
use toybox_core::{Activity, MemoryStorage};
use toybox_dialogs::{
    DialogContainer, DialogError, DialogHandler, DialogSet, DialogTurnResult, DialogTurnStatus,
    Waterfall,
};
use toybox_memory::MemoryScope;

fn checkout_container() -> DialogContainer {
    let address = Waterfall::new()
        .step(|step| {
            Box::pin(async move {
                step.context()
                    .send_activity(Activity::message("Shipping address?"))
                    .await?;
                step.wait()
            })
        })
        .step(|mut step| {
            Box::pin(async move {
                let address = step.take_result();
                step.end_dialog(address).await
            })
        });
    let root = Waterfall::new()
        .step(|mut step| Box::pin(async move { step.begin_dialog("address", None).await }))
        .step(|mut step| {
            Box::pin(async move {
                let summary = json!({ "address": step.result().cloned().unwrap_or(Value::Null) });
                step.end_dialog(Some(summary)).await
            })
        });

    let mut inner = DialogSet::new();
    inner
        .add("root", root)
        .unwrap()
        .add("address", address)
        .unwrap();
    DialogContainer::new("root", inner).unwrap()
}

#[test]
fn initial_dialog_must_exist() {
    let err = DialogContainer::new("missing", DialogSet::new()).unwrap_err();
    assert!(matches!(err, DialogError::UnknownDialog(ref id) if id == "missing"));
}

#[tokio::test]
async fn container_ends_with_the_inner_result() {
    let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
    let stack = scope.fragment("dialogState").unwrap();
    let sink = Arc::new(RecordingSink::default());
    let mut outer = DialogSet::new();
    outer.add("checkout", checkout_container()).unwrap();
    let outer = Arc::new(outer);

    let first = message_turn("buy", sink.clone());
    let mut dc = outer.create_context(&first, &stack).await.unwrap();
    let started = dc.begin_dialog("checkout", None).await.unwrap();
    assert_eq!(started.status, DialogTurnStatus::Waiting);
    assert_eq!(dc.stack_depth(), 1);
    let nested = dc.active_dialog().unwrap().state["dialogStack"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(nested, vec!["root", "address"]);
    scope.save_changes(&first).await.unwrap();

    let second = message_turn("Main St 1", sink.clone());
    let mut dc = outer.create_context(&second, &stack).await.unwrap();
    let done = dc.continue_dialog().await.unwrap();
    assert_eq!(
        done,
        DialogTurnResult::complete(Some(json!({"address": "Main St 1"})))
    );
    assert_eq!(dc.stack_depth(), 0);
    assert_eq!(sink.texts().await, vec!["Shipping address?"]);
}

#[tokio::test]
async fn inner_cancel_ends_the_container() {
    let quitter = DialogHandler::new(|_dc, _args| {
        Box::pin(async move { Ok::<_, DialogError>(DialogTurnResult::waiting()) })
    })
    .on_continue(|dc| Box::pin(async move { dc.cancel_all_dialogs().await }));
    let mut inner = DialogSet::new();
    inner.add("quit", quitter).unwrap();
    let mut outer = DialogSet::new();
    outer
        .add("wrapper", DialogContainer::new("quit", inner).unwrap())
        .unwrap();
    let outer = Arc::new(outer);

    let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
    let stack = scope.fragment("dialogState").unwrap();
    let ctx = message_turn("start", Arc::new(RecordingSink::default()));
    let mut dc = outer.create_context(&ctx, &stack).await.unwrap();
    dc.begin_dialog("wrapper", None).await.unwrap();

    let result = dc.continue_dialog().await.unwrap();
    assert_eq!(result, DialogTurnResult::complete(None));
    assert_eq!(dc.stack_depth(), 0);
}
