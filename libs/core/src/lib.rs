//! Host-side primitives the toybox components are layered on: activities, the
//! per-turn context, outbound delivery, storage providers and a clock.
//!
//! Nothing in here knows about dialogs or memory fragments; those crates only
//! need a [`TurnContext`] and a [`Storage`] to work.
pub mod activity;
pub mod clock;
pub mod storage;
pub mod telemetry;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod turn;

pub use activity::{
    Activity, CardAction, ChannelAccount, ConversationAccount, ResourceResponse, SuggestedActions,
    activity_types,
};
pub use clock::{Clock, SharedClock, SystemClock, system_clock, unix_ms};
pub use storage::{
    ETAG_ANY, ETAG_FIELD, FileStorage, MemoryStorage, SharedStorage, Storage, StorageError,
    StorageResult, StoreItems, shared_memory_storage, storage_from_env,
};
pub use telemetry::{TelemetryConfig, init_tracing};
pub use turn::{ActivitySink, SharedActivitySink, TurnContext};
