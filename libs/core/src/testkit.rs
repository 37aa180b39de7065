//! Helpers for exercising bot components without a channel.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;

use crate::activity::{Activity, ChannelAccount, ConversationAccount, ResourceResponse};
use crate::clock::{Clock, SharedClock};
use crate::turn::{ActivitySink, SharedActivitySink, TurnContext};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts at the unix epoch, which keeps millisecond math in tests readable.
    pub fn at_epoch() -> Arc<Self> {
        Arc::new(Self::new(OffsetDateTime::UNIX_EPOCH))
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }

    pub fn set(&self, at: OffsetDateTime) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = at;
    }

    pub fn set_secs(&self, secs_since_epoch: i64) {
        self.set(OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(secs_since_epoch));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sink that keeps every delivered activity.
#[derive(Default)]
pub struct RecordingSink {
    sent: AsyncMutex<Vec<Activity>>,
}

impl RecordingSink {
    pub async fn sent(&self) -> Vec<Activity> {
        self.sent.lock().await.clone()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|activity| activity.text.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl ActivitySink for RecordingSink {
    async fn send(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>> {
        let responses = activities
            .iter()
            .map(|_| ResourceResponse {
                id: uuid::Uuid::new_v4().to_string(),
            })
            .collect();
        self.sent.lock().await.extend(activities);
        Ok(responses)
    }
}

/// Inbound activity addressed as `user-1` talking to `bot` in `conv-1`.
pub fn inbound(mut activity: Activity) -> Activity {
    activity.id.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
    activity.channel_id.get_or_insert_with(|| "test".into());
    activity
        .service_url
        .get_or_insert_with(|| "https://channel.invalid".into());
    activity
        .from
        .get_or_insert_with(|| ChannelAccount::new("user-1"));
    activity
        .recipient
        .get_or_insert_with(|| ChannelAccount::new("bot"));
    activity
        .conversation
        .get_or_insert_with(|| ConversationAccount::new("conv-1"));
    activity
}

pub fn message_turn(text: &str, sink: SharedActivitySink) -> TurnContext {
    TurnContext::new(inbound(Activity::message(text)), sink)
}

pub fn message_turn_at(text: &str, sink: SharedActivitySink, clock: SharedClock) -> TurnContext {
    TurnContext::with_clock(inbound(Activity::message(text)), sink, clock)
}

pub fn activity_turn(activity: Activity, sink: SharedActivitySink, clock: SharedClock) -> TurnContext {
    TurnContext::with_clock(inbound(activity), sink, clock)
}
