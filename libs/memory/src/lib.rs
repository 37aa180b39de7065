//! Scoped memory for bots.
//!
//! A [`MemoryScope`] maps a turn to one storage record (per conversation, per
//! user, ...). Fragments are named entries inside that record, optionally
//! expiring after a sliding TTL. [`ExpiringProperty`], [`HistoryProperty`] and
//! [`ListProperty`] layer common shapes on top of a fragment.
mod error;
mod expiring;
mod fragment;
mod history;
mod list;
mod scope;

pub use error::{MemoryError, MemoryResult};
pub use expiring::ExpiringProperty;
pub use fragment::MemoryFragment;
pub use history::{HistoryEntry, HistoryProperty, HistorySettings};
pub use list::{ListItem, ListProperty};
pub use scope::{MemoryScope, ScopeKeyFn, ScopeKind};

use std::sync::Arc;

use toybox_core::TurnContext;

/// Saves every scope loaded during the turn, in order. Stops at the first
/// failure.
pub async fn save_all(ctx: &TurnContext, scopes: &[Arc<MemoryScope>]) -> MemoryResult<()> {
    for scope in scopes {
        scope.save_changes(ctx).await?;
    }
    Ok(())
}
