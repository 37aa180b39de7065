use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use toybox_core::TurnContext;
use tracing::trace;

use crate::error::MemoryResult;
use crate::scope::MemoryScope;

const VALUE_FIELD: &str = "value";
const LAST_ACCESS_FIELD: &str = "lastAccess";

/// Named value inside a scope record, stored as `{value, lastAccess}`.
///
/// With a TTL set, an entry whose `lastAccess` is more than `max_seconds` in the
/// past is dropped the next time it is read. Reads refresh `lastAccess`, so the
/// window slides with use. There is no background eviction.
///
/// Clones share the TTL policy.
#[derive(Clone)]
pub struct MemoryFragment {
    scope: Arc<MemoryScope>,
    name: String,
    default: Option<Value>,
    max_seconds: Arc<AtomicU64>,
}

impl MemoryFragment {
    pub(crate) fn new(scope: Arc<MemoryScope>, name: String) -> Self {
        Self {
            scope,
            name,
            default: None,
            max_seconds: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Arc<MemoryScope> {
        &self.scope
    }

    /// Value seeded by `get` when the entry is absent.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn forget_after(self, seconds: u64) -> Self {
        self.set_forget_after(seconds);
        self
    }

    /// Changes the TTL used by subsequent reads. `0` disables expiry.
    pub fn set_forget_after(&self, seconds: u64) {
        self.max_seconds.store(seconds, Ordering::SeqCst);
    }

    pub fn max_seconds(&self) -> Option<u64> {
        match self.max_seconds.load(Ordering::SeqCst) {
            0 => None,
            seconds => Some(seconds),
        }
    }

    /// Returns the live value, seeding the registered default when absent.
    pub async fn get(&self, ctx: &TurnContext) -> MemoryResult<Option<Value>> {
        self.read(ctx, self.default.clone()).await
    }

    pub async fn get_or(&self, ctx: &TurnContext, default: Value) -> MemoryResult<Value> {
        let value = self.read(ctx, Some(default.clone())).await?;
        Ok(value.unwrap_or(default))
    }

    pub async fn get_as<T: DeserializeOwned>(&self, ctx: &TurnContext) -> MemoryResult<Option<T>> {
        match self.get(ctx).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, ctx: &TurnContext, value: Value) -> MemoryResult<()> {
        let now = ctx.now_unix_ms();
        let name = self.name.clone();
        self.scope
            .update(ctx, move |record| {
                record.insert(name, entry(value, now));
            })
            .await
    }

    pub async fn set_as<T: Serialize>(&self, ctx: &TurnContext, value: &T) -> MemoryResult<()> {
        self.set(ctx, serde_json::to_value(value)?).await
    }

    /// Removes the entry; no-op when it does not exist.
    pub async fn forget(&self, ctx: &TurnContext) -> MemoryResult<()> {
        self.scope
            .update(ctx, |record| {
                record.remove(&self.name);
            })
            .await
    }

    async fn read(&self, ctx: &TurnContext, default: Option<Value>) -> MemoryResult<Option<Value>> {
        let now = ctx.now_unix_ms();
        let ttl_ms = self.max_seconds().map(|s| (s as i64).saturating_mul(1000));
        self.scope
            .update(ctx, |record| read_entry(record, &self.name, now, ttl_ms, default))
            .await
    }
}

impl std::fmt::Debug for MemoryFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFragment")
            .field("scope", &self.scope.namespace())
            .field("name", &self.name)
            .field("max_seconds", &self.max_seconds())
            .finish_non_exhaustive()
    }
}

fn entry(value: Value, now: i64) -> Value {
    json!({ VALUE_FIELD: value, LAST_ACCESS_FIELD: now })
}

fn read_entry(
    record: &mut Map<String, Value>,
    name: &str,
    now: i64,
    ttl_ms: Option<i64>,
    default: Option<Value>,
) -> Option<Value> {
    let expired = match (record.get(name), ttl_ms) {
        (Some(existing), Some(ttl_ms)) => existing
            .get(LAST_ACCESS_FIELD)
            .and_then(Value::as_i64)
            .is_some_and(|last| now > last.saturating_add(ttl_ms)),
        _ => false,
    };
    if expired {
        trace!(fragment = name, "fragment expired");
        record.remove(name);
    }

    if let Some(existing) = record.get_mut(name) {
        if let Some(obj) = existing.as_object_mut() {
            obj.insert(LAST_ACCESS_FIELD.to_string(), Value::from(now));
            return Some(obj.get(VALUE_FIELD).cloned().unwrap_or(Value::Null));
        }
    }

    let default = default?;
    record.insert(name.to_string(), entry(default.clone(), now));
    Some(default)
}
