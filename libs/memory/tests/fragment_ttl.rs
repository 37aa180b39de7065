use std::sync::Arc;

use serde_json::json;
use toybox_core::testkit::{ManualClock, RecordingSink, message_turn_at};
use toybox_core::{MemoryStorage, SharedStorage, TurnContext};
use toybox_memory::{MemoryScope, save_all};

fn turn(clock: &Arc<ManualClock>) -> TurnContext {
    message_turn_at("hi", Arc::new(RecordingSink::default()), clock.clone())
}

#[tokio::test]
async fn reads_slide_the_expiry_window() {
    let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
    let answer = scope.fragment("answer").unwrap().forget_after(10);
    let clock = ManualClock::at_epoch();
    let ctx = turn(&clock);

    answer.set(&ctx, json!(42)).await.unwrap();
    clock.set_secs(5);
    assert_eq!(answer.get(&ctx).await.unwrap(), Some(json!(42)));
    clock.set_secs(14);
    assert_eq!(answer.get(&ctx).await.unwrap(), Some(json!(42)));
}

#[tokio::test]
async fn value_expires_ten_seconds_after_last_read() {
    let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
    let answer = scope.fragment("answer").unwrap().forget_after(10);
    let clock = ManualClock::at_epoch();
    let ctx = turn(&clock);

    answer.set(&ctx, json!(42)).await.unwrap();
    clock.set_secs(5);
    assert_eq!(answer.get(&ctx).await.unwrap(), Some(json!(42)));
    clock.set_secs(16);
    assert_eq!(answer.get(&ctx).await.unwrap(), None);
}

#[tokio::test]
async fn fragments_persist_across_turns() {
    let storage: SharedStorage = Arc::new(MemoryStorage::new());
    let conversation = MemoryScope::conversation(storage.clone());
    let user = MemoryScope::user(storage.clone());
    let topic = conversation.fragment("topic").unwrap().forget_after(60);
    let name = user.fragment("name").unwrap();
    let clock = ManualClock::at_epoch();

    let first = turn(&clock);
    topic.set(&first, json!("weather")).await.unwrap();
    name.set(&first, json!("Ada")).await.unwrap();
    save_all(&first, &[conversation.clone(), user.clone()]).await.unwrap();

    clock.set_secs(30);
    let second = turn(&clock);
    assert_eq!(topic.get(&second).await.unwrap(), Some(json!("weather")));
    assert_eq!(name.get(&second).await.unwrap(), Some(json!("Ada")));
    save_all(&second, &[conversation.clone(), user.clone()]).await.unwrap();

    // The read at t=30 was persisted, so the topic survives until t=90.
    clock.set_secs(85);
    let third = turn(&clock);
    assert_eq!(topic.get(&third).await.unwrap(), Some(json!("weather")));

    clock.set_secs(200);
    let fourth = turn(&clock);
    assert_eq!(topic.get(&fourth).await.unwrap(), None);
    assert_eq!(name.get(&fourth).await.unwrap(), Some(json!("Ada")));
}
