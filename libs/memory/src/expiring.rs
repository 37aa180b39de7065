use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toybox_core::TurnContext;

use crate::error::MemoryResult;
use crate::fragment::MemoryFragment;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    timestamp: i64,
    value: Value,
}

/// Value that is only valid for a fixed window after it was written.
///
/// Unlike a fragment TTL the window does not slide on reads. An expired value
/// is replaced by the default (when one is configured) instead of being
/// deleted.
#[derive(Clone)]
pub struct ExpiringProperty {
    fragment: MemoryFragment,
    expire_after: Duration,
    default: Option<Value>,
}

impl ExpiringProperty {
    pub fn new(fragment: MemoryFragment, expire_after: Duration) -> Self {
        Self {
            fragment,
            expire_after,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn expire_after(&self) -> Duration {
        self.expire_after
    }

    pub async fn get(&self, ctx: &TurnContext) -> MemoryResult<Option<Value>> {
        let now = ctx.now_unix_ms();
        let window = i64::try_from(self.expire_after.as_millis()).unwrap_or(i64::MAX);
        if let Some(envelope) = self.fragment.get_as::<Envelope>(ctx).await? {
            if now <= envelope.timestamp.saturating_add(window) {
                return Ok(Some(envelope.value));
            }
        }
        match &self.default {
            Some(default) => {
                self.set(ctx, default.clone()).await?;
                Ok(Some(default.clone()))
            }
            None => Ok(None),
        }
    }

    pub async fn set(&self, ctx: &TurnContext, value: Value) -> MemoryResult<()> {
        let envelope = Envelope {
            timestamp: ctx.now_unix_ms(),
            value,
        };
        self.fragment.set_as(ctx, &envelope).await
    }

    pub async fn delete(&self, ctx: &TurnContext) -> MemoryResult<()> {
        self.fragment.forget(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryScope;
    use serde_json::json;
    use std::sync::Arc;
    use toybox_core::MemoryStorage;
    use toybox_core::testkit::{ManualClock, RecordingSink, message_turn_at};

    #[tokio::test]
    async fn window_is_fixed_from_write() {
        let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
        let clock = ManualClock::at_epoch();
        let ctx = message_turn_at("hi", Arc::new(RecordingSink::default()), clock.clone());
        let prop = ExpiringProperty::new(scope.fragment("otp").unwrap(), Duration::from_secs(10));

        prop.set(&ctx, json!("123456")).await.unwrap();
        clock.set_secs(8);
        assert_eq!(prop.get(&ctx).await.unwrap(), Some(json!("123456")));
        // Reading at t=8 did not extend the window.
        clock.set_secs(11);
        assert_eq!(prop.get(&ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expiry_reseeds_default() {
        let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
        let clock = ManualClock::at_epoch();
        let ctx = message_turn_at("hi", Arc::new(RecordingSink::default()), clock.clone());
        let prop = ExpiringProperty::new(scope.fragment("mode").unwrap(), Duration::from_secs(5))
            .with_default(json!("basic"));

        prop.set(&ctx, json!("expert")).await.unwrap();
        clock.set_secs(6);
        assert_eq!(prop.get(&ctx).await.unwrap(), Some(json!("basic")));
        clock.set_secs(10);
        // The reseeded default carries a fresh timestamp.
        assert_eq!(prop.get(&ctx).await.unwrap(), Some(json!("basic")));

        prop.delete(&ctx).await.unwrap();
        assert!(!scope.load(&ctx).await.unwrap().contains_key("mode"));
    }

    #[tokio::test]
    async fn corrupt_envelope_is_an_error() {
        let scope = MemoryScope::conversation(Arc::new(MemoryStorage::new()));
        let ctx = message_turn_at("hi", Arc::new(RecordingSink::default()), ManualClock::at_epoch());
        let fragment = scope.fragment("otp").unwrap();
        fragment.set(&ctx, json!({"not": "an envelope"})).await.unwrap();

        let prop = ExpiringProperty::new(fragment, Duration::from_secs(10)).with_default(json!("x"));
        let err = prop.get(&ctx).await.unwrap_err();
        assert!(matches!(err, crate::MemoryError::Serialization(_)));
        // The stored value is left as it was.
        let stored = scope.load(&ctx).await.unwrap();
        assert_eq!(stored["otp"]["value"], json!({"not": "an envelope"}));
    }
}
