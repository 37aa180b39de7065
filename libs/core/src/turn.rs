use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::activity::{Activity, ResourceResponse};
use crate::clock::{SharedClock, system_clock};

/// Delivery side of the host adapter: whatever hands activities to the channel.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn send(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>>;
}

pub type SharedActivitySink = Arc<dyn ActivitySink>;

/// Handle for a single conversational turn. Cloning is cheap and every clone
/// sees the same turn state.
#[derive(Clone)]
pub struct TurnContext {
    inner: Arc<TurnInner>,
}

struct TurnInner {
    activity: Activity,
    sink: SharedActivitySink,
    clock: SharedClock,
    responded: AtomicBool,
    turn_state: DashMap<String, Value>,
}

impl TurnContext {
    pub fn new(activity: Activity, sink: SharedActivitySink) -> Self {
        Self::with_clock(activity, sink, system_clock())
    }

    pub fn with_clock(activity: Activity, sink: SharedActivitySink, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(TurnInner {
                activity,
                sink,
                clock,
                responded: AtomicBool::new(false),
                turn_state: DashMap::new(),
            }),
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    pub fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    pub fn now_unix_ms(&self) -> i64 {
        self.inner.clock.now_unix_ms()
    }

    /// True once anything has been sent during this turn.
    pub fn responded(&self) -> bool {
        self.inner.responded.load(Ordering::SeqCst)
    }

    pub async fn send_activity(&self, activity: Activity) -> Result<ResourceResponse> {
        let mut responses = self.send_activities(vec![activity]).await?;
        Ok(responses.pop().unwrap_or_default())
    }

    pub async fn send_activities(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>> {
        if activities.is_empty() {
            return Ok(Vec::new());
        }
        let incoming = &self.inner.activity;
        let outgoing: Vec<Activity> = activities
            .into_iter()
            .map(|activity| activity.reply_to(incoming))
            .collect();
        debug!(count = outgoing.len(), "sending activities");
        let responses = self.inner.sink.send(outgoing).await?;
        self.inner.responded.store(true, Ordering::SeqCst);
        Ok(responses)
    }

    pub fn has_turn_state(&self, key: &str) -> bool {
        self.inner.turn_state.contains_key(key)
    }

    pub fn insert_turn_state(&self, key: impl Into<String>, value: Value) {
        self.inner.turn_state.insert(key.into(), value);
    }

    pub fn remove_turn_state(&self, key: &str) -> Option<Value> {
        self.inner.turn_state.remove(key).map(|(_, value)| value)
    }

    pub fn turn_state(&self, key: &str) -> Option<Value> {
        self.inner
            .turn_state
            .get(key)
            .map(|entry| entry.value().clone())
    }

    /// Runs `f` against the cached value for `key`, if present. `f` must not
    /// touch turn state itself.
    pub fn with_turn_state<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        self.inner
            .turn_state
            .get_mut(key)
            .map(|mut entry| f(entry.value_mut()))
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("activity", &self.inner.activity)
            .field("responded", &self.responded())
            .finish_non_exhaustive()
    }
}
