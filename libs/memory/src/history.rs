use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toybox_core::TurnContext;
use tracing::trace;

use crate::error::{MemoryError, MemoryResult};
use crate::fragment::MemoryFragment;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySettings {
    /// Keep at most this many retired values.
    pub max_count: Option<usize>,
    /// Drop retired values older than this.
    pub ttl: Option<Duration>,
}

impl HistorySettings {
    fn validate(&self) -> MemoryResult<()> {
        if self.max_count == Some(0) {
            return Err(MemoryError::InvalidSettings(
                "history max_count must be at least 1".into(),
            ));
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(MemoryError::InvalidSettings(
                "history ttl must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub value: Value,
    /// Unix ms at which the value was set.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<HistoryEntry>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

/// Value that keeps the values it replaced.
///
/// `set` retires the current value into the history list; `delete` retires it
/// and leaves no current value. The history is pruned, oldest entries first,
/// by `set`, `delete` and `history`; `get` only reads the current value.
#[derive(Clone)]
pub struct HistoryProperty {
    fragment: MemoryFragment,
    settings: HistorySettings,
}

impl HistoryProperty {
    pub fn new(fragment: MemoryFragment, settings: HistorySettings) -> MemoryResult<Self> {
        settings.validate()?;
        Ok(Self { fragment, settings })
    }

    pub async fn get(&self, ctx: &TurnContext) -> MemoryResult<Option<Value>> {
        let record = self.load(ctx).await?;
        Ok(record.current.map(|entry| entry.value))
    }

    pub async fn set(&self, ctx: &TurnContext, value: Value) -> MemoryResult<()> {
        let now = ctx.now_unix_ms();
        let mut record = self.load(ctx).await?;
        if let Some(previous) = record.current.take() {
            record.history.push(previous);
        }
        record.current = Some(HistoryEntry {
            value,
            timestamp: now,
        });
        self.store(ctx, record, now).await
    }

    pub async fn delete(&self, ctx: &TurnContext) -> MemoryResult<()> {
        let now = ctx.now_unix_ms();
        let mut record = self.load(ctx).await?;
        match record.current.take() {
            Some(previous) => {
                record.history.push(previous);
                self.store(ctx, record, now).await
            }
            None => Ok(()),
        }
    }

    /// Retired entries, oldest first.
    pub async fn history(&self, ctx: &TurnContext) -> MemoryResult<Vec<HistoryEntry>> {
        let now = ctx.now_unix_ms();
        let mut record = self.load(ctx).await?;
        let before = record.history.len();
        prune(&mut record.history, &self.settings, now);
        if record.history.len() != before {
            let history = record.history.clone();
            self.fragment.set_as(ctx, &record).await?;
            return Ok(history);
        }
        Ok(record.history)
    }

    async fn load(&self, ctx: &TurnContext) -> MemoryResult<HistoryRecord> {
        Ok(self.fragment.get_as(ctx).await?.unwrap_or_default())
    }

    async fn store(&self, ctx: &TurnContext, mut record: HistoryRecord, now: i64) -> MemoryResult<()> {
        prune(&mut record.history, &self.settings, now);
        self.fragment.set_as(ctx, &record).await
    }
}

fn prune(history: &mut Vec<HistoryEntry>, settings: &HistorySettings, now: i64) {
    if let Some(ttl) = settings.ttl {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        history.retain(|entry| now.saturating_sub(entry.timestamp) <= ttl_ms);
    }
    if let Some(max) = settings.max_count {
        if history.len() > max {
            let excess = history.len() - max;
            trace!(dropped = excess, "pruning history");
            history.drain(..excess);
        }
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

    fn values(entries: &[HistoryEntry]) -> Vec<Value> {
        entries.iter().map(|e| e.value.clone()).collect()
    }

    #[test]
    fn zero_max_count_is_rejected() {
        let scope = MemoryScope::user(Arc::new(MemoryStorage::new()));
        let err = HistoryProperty::new(
            scope.fragment("h").unwrap(),
            HistorySettings {
                max_count: Some(0),
                ttl: None,
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, MemoryError::InvalidSettings(_)));
    }

    #[tokio::test]
    async fn set_and_delete_retire_values() {
        let scope = MemoryScope::user(Arc::new(MemoryStorage::new()));
        let clock = ManualClock::at_epoch();
        let ctx = message_turn_at("hi", Arc::new(RecordingSink::default()), clock.clone());
        let prop = HistoryProperty::new(scope.fragment("city").unwrap(), HistorySettings::default())
            .unwrap();

        prop.set(&ctx, json!("Oslo")).await.unwrap();
        prop.set(&ctx, json!("Lima")).await.unwrap();
        assert_eq!(prop.get(&ctx).await.unwrap(), Some(json!("Lima")));
        assert_eq!(values(&prop.history(&ctx).await.unwrap()), vec![json!("Oslo")]);

        prop.delete(&ctx).await.unwrap();
        assert_eq!(prop.get(&ctx).await.unwrap(), None);
        assert_eq!(
            values(&prop.history(&ctx).await.unwrap()),
            vec![json!("Oslo"), json!("Lima")]
        );
    }

    #[tokio::test]
    async fn prunes_by_count_and_age() {
        let scope = MemoryScope::user(Arc::new(MemoryStorage::new()));
        let clock = ManualClock::at_epoch();
        let ctx = message_turn_at("hi", Arc::new(RecordingSink::default()), clock.clone());
        let prop = HistoryProperty::new(
            scope.fragment("topic").unwrap(),
            HistorySettings {
                max_count: Some(2),
                ttl: Some(Duration::from_secs(100)),
            },
        )
        .unwrap();

        for (t, topic) in [(0, "a"), (10, "b"), (20, "c"), (30, "d")] {
            clock.set_secs(t);
            prop.set(&ctx, json!(topic)).await.unwrap();
        }
        // a, b, c retired; only the newest two survive.
        assert_eq!(
            values(&prop.history(&ctx).await.unwrap()),
            vec![json!("b"), json!("c")]
        );

        clock.set_secs(115);
        // b was set at 10 and is now older than 100s.
        assert_eq!(values(&prop.history(&ctx).await.unwrap()), vec![json!("c")]);
        let stored = scope.load(&ctx).await.unwrap();
        assert_eq!(stored["topic"]["value"]["history"].as_array().unwrap().len(), 1);
    }
}
