use std::{fmt, sync::Arc};

use dashmap::DashSet;
use serde_json::{Map, Value};
use toybox_core::{ETAG_FIELD, SharedStorage, StoreItems, TurnContext};
use tracing::{debug, instrument};

use crate::error::{MemoryError, MemoryResult};
use crate::fragment::MemoryFragment;

/// Derives the storage key for a custom scope. `None` means the turn carries
/// no usable identity for this scope.
pub type ScopeKeyFn = Arc<dyn Fn(&TurnContext) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub enum ScopeKind {
    /// `{channelId}/conversations/{conversationId}`
    Conversation,
    /// `{channelId}/users/{userId}`
    User,
    /// `{channelId}/conversations/{conversationId}/users/{userId}`
    UserInConversation,
    Custom(ScopeKeyFn),
}

impl fmt::Debug for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Conversation => f.write_str("Conversation"),
            ScopeKind::User => f.write_str("User"),
            ScopeKind::UserInConversation => f.write_str("UserInConversation"),
            ScopeKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// A group of fragments that share one storage record and one load/save
/// lifecycle per turn.
///
/// The record is read on first access in a turn and cached in the turn state;
/// `save_changes` writes it back. Writes are last-writer-wins: no etag is sent
/// to the provider.
pub struct MemoryScope {
    namespace: String,
    kind: ScopeKind,
    storage: SharedStorage,
    cache_key: String,
    fragments: DashSet<String>,
}

impl MemoryScope {
    pub fn new(namespace: impl Into<String>, kind: ScopeKind, storage: SharedStorage) -> Arc<Self> {
        let namespace = namespace.into();
        Arc::new(Self {
            cache_key: format!("toybox.scope.{namespace}"),
            namespace,
            kind,
            storage,
            fragments: DashSet::new(),
        })
    }

    pub fn conversation(storage: SharedStorage) -> Arc<Self> {
        Self::new("conversation", ScopeKind::Conversation, storage)
    }

    pub fn user(storage: SharedStorage) -> Arc<Self> {
        Self::new("user", ScopeKind::User, storage)
    }

    pub fn user_in_conversation(storage: SharedStorage) -> Arc<Self> {
        Self::new("private", ScopeKind::UserInConversation, storage)
    }

    pub fn custom<F>(namespace: impl Into<String>, storage: SharedStorage, key: F) -> Arc<Self>
    where
        F: Fn(&TurnContext) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(namespace, ScopeKind::Custom(Arc::new(key)), storage)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    /// Registers a fragment. Names are unique within a scope.
    pub fn fragment(self: &Arc<Self>, name: impl Into<String>) -> MemoryResult<MemoryFragment> {
        let name = name.into();
        if !self.fragments.insert(name.clone()) {
            return Err(MemoryError::DuplicateFragment {
                scope: self.namespace.clone(),
                name,
            });
        }
        Ok(MemoryFragment::new(Arc::clone(self), name))
    }

    pub fn has_fragment(&self, name: &str) -> bool {
        self.fragments.contains(name)
    }

    pub fn storage_key(&self, ctx: &TurnContext) -> MemoryResult<String> {
        let activity = ctx.activity();
        let channel = activity.channel_id.as_deref().filter(|c| !c.is_empty());
        let base = match &self.kind {
            ScopeKind::Conversation => channel
                .zip(activity.conversation_id())
                .map(|(channel, conversation)| format!("{channel}/conversations/{conversation}")),
            ScopeKind::User => channel
                .zip(activity.from_id())
                .map(|(channel, user)| format!("{channel}/users/{user}")),
            ScopeKind::UserInConversation => {
                match (channel, activity.conversation_id(), activity.from_id()) {
                    (Some(channel), Some(conversation), Some(user)) => Some(format!(
                        "{channel}/conversations/{conversation}/users/{user}"
                    )),
                    _ => None,
                }
            }
            ScopeKind::Custom(key) => key(ctx).filter(|key| !key.is_empty()),
        };
        base.map(|base| format!("{base}/{}", self.namespace))
            .ok_or_else(|| MemoryError::MissingScopeKey {
                scope: self.namespace.clone(),
            })
    }

    pub fn is_loaded(&self, ctx: &TurnContext) -> bool {
        ctx.has_turn_state(&self.cache_key)
    }

    /// Returns a snapshot of the scope record, reading storage on first use in
    /// the turn.
    pub async fn load(&self, ctx: &TurnContext) -> MemoryResult<Map<String, Value>> {
        self.update(ctx, |record| record.clone()).await
    }

    /// Writes the record back if it was loaded during this turn.
    #[instrument(name = "memory.scope.save", skip(self, ctx), fields(scope = %self.namespace))]
    pub async fn save_changes(&self, ctx: &TurnContext) -> MemoryResult<()> {
        let Some(record) = ctx.turn_state(&self.cache_key) else {
            return Ok(());
        };
        let key = self.storage_key(ctx)?;
        self.storage
            .write(StoreItems::from([(key.clone(), record)]))
            .await?;
        debug!(key = %key, "scope record saved");
        Ok(())
    }

    /// Empties the cached record; the next `save_changes` persists the empty record.
    pub fn clear(&self, ctx: &TurnContext) {
        ctx.insert_turn_state(self.cache_key.clone(), Value::Object(Map::new()));
    }

    /// Removes the record from storage and from the turn cache.
    pub async fn delete(&self, ctx: &TurnContext) -> MemoryResult<()> {
        let key = self.storage_key(ctx)?;
        ctx.remove_turn_state(&self.cache_key);
        self.storage.delete(&[key]).await?;
        Ok(())
    }

    /// Applies `f` to the cached record, loading it first when needed.
    pub(crate) async fn update<R>(
        &self,
        ctx: &TurnContext,
        f: impl FnOnce(&mut Map<String, Value>) -> R,
    ) -> MemoryResult<R> {
        self.ensure_loaded(ctx).await?;
        ctx.with_turn_state(&self.cache_key, |record| f(as_object(record)))
            .ok_or_else(|| MemoryError::NotLoaded {
                scope: self.namespace.clone(),
            })
    }

    async fn ensure_loaded(&self, ctx: &TurnContext) -> MemoryResult<()> {
        if self.is_loaded(ctx) {
            return Ok(());
        }
        let key = self.storage_key(ctx)?;
        let mut items = self.storage.read(std::slice::from_ref(&key)).await?;
        let mut record = items
            .remove(&key)
            .unwrap_or_else(|| Value::Object(Map::new()));
        as_object(&mut record).remove(ETAG_FIELD);
        debug!(scope = %self.namespace, key = %key, "scope record loaded");
        ctx.insert_turn_state(self.cache_key.clone(), record);
        Ok(())
    }
}

impl fmt::Debug for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScope")
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn as_object(record: &mut Value) -> &mut Map<String, Value> {
    if !record.is_object() {
        *record = Value::Object(Map::new());
    }
    match record {
        Value::Object(map) => map,
        _ => unreachable!("record was replaced with an object above"),
    }
}
