use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use toybox_core::TurnContext;

use crate::error::{MemoryError, MemoryResult};
use crate::fragment::MemoryFragment;

/// Item stored in a [`ListProperty`].
pub trait ListItem: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn id(&self) -> &str;
}

/// Array-valued fragment addressed by item id. Lookups are linear scans;
/// lists are expected to stay conversation sized.
pub struct ListProperty<T> {
    fragment: MemoryFragment,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for ListProperty<T> {
    fn clone(&self) -> Self {
        Self {
            fragment: self.fragment.clone(),
            _item: PhantomData,
        }
    }
}

impl<T: ListItem> ListProperty<T> {
    pub fn new(fragment: MemoryFragment) -> Self {
        Self {
            fragment,
            _item: PhantomData,
        }
    }

    pub async fn items(&self, ctx: &TurnContext) -> MemoryResult<Vec<T>> {
        Ok(self.fragment.get_as(ctx).await?.unwrap_or_default())
    }

    pub async fn add_item(&self, ctx: &TurnContext, item: T) -> MemoryResult<()> {
        let mut items = self.items(ctx).await?;
        if items.iter().any(|existing| existing.id() == item.id()) {
            return Err(MemoryError::DuplicateItem {
                id: item.id().to_string(),
            });
        }
        items.push(item);
        self.fragment.set_as(ctx, &items).await
    }

    /// Replaces the item with the same id, appending when there is none.
    pub async fn update_item(&self, ctx: &TurnContext, item: T) -> MemoryResult<()> {
        let mut items = self.items(ctx).await?;
        match items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(slot) => *slot = item,
            None => items.push(item),
        }
        self.fragment.set_as(ctx, &items).await
    }

    pub async fn get_item(&self, ctx: &TurnContext, id: &str) -> MemoryResult<Option<T>> {
        Ok(self
            .items(ctx)
            .await?
            .into_iter()
            .find(|item| item.id() == id))
    }

    pub async fn has_item(&self, ctx: &TurnContext, id: &str) -> MemoryResult<bool> {
        Ok(self.items(ctx).await?.iter().any(|item| item.id() == id))
    }

    /// Returns whether an item was removed.
    pub async fn delete_item(&self, ctx: &TurnContext, id: &str) -> MemoryResult<bool> {
        let mut items = self.items(ctx).await?;
        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        self.fragment.set_as(ctx, &items).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryScope;
    use serde::Deserialize;
    use std::sync::Arc;
    use toybox_core::MemoryStorage;
    use toybox_core::testkit::{RecordingSink, message_turn};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Alarm {
        id: String,
        time: String,
    }

    impl ListItem for Alarm {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn alarm(id: &str, time: &str) -> Alarm {
        Alarm {
            id: id.into(),
            time: time.into(),
        }
    }

    #[tokio::test]
    async fn add_get_update_delete() {
        let scope = MemoryScope::user(Arc::new(MemoryStorage::new()));
        let ctx = message_turn("hi", Arc::new(RecordingSink::default()));
        let alarms: ListProperty<Alarm> = ListProperty::new(scope.fragment("alarms").unwrap());

        alarms.add_item(&ctx, alarm("wake", "07:00")).await.unwrap();
        alarms.add_item(&ctx, alarm("gym", "18:00")).await.unwrap();
        assert!(alarms.has_item(&ctx, "gym").await.unwrap());

        alarms.update_item(&ctx, alarm("gym", "19:00")).await.unwrap();
        assert_eq!(
            alarms.get_item(&ctx, "gym").await.unwrap(),
            Some(alarm("gym", "19:00"))
        );

        assert!(alarms.delete_item(&ctx, "gym").await.unwrap());
        assert!(!alarms.delete_item(&ctx, "gym").await.unwrap());
        assert!(!alarms.has_item(&ctx, "gym").await.unwrap());
        assert_eq!(alarms.get_item(&ctx, "gym").await.unwrap(), None);
        assert_eq!(alarms.items(&ctx).await.unwrap(), vec![alarm("wake", "07:00")]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let scope = MemoryScope::user(Arc::new(MemoryStorage::new()));
        let ctx = message_turn("hi", Arc::new(RecordingSink::default()));
        let alarms: ListProperty<Alarm> = ListProperty::new(scope.fragment("alarms").unwrap());

        alarms.add_item(&ctx, alarm("wake", "07:00")).await.unwrap();
        let err = alarms
            .add_item(&ctx, alarm("wake", "08:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateItem { ref id } if id == "wake"));
        assert_eq!(alarms.items(&ctx).await.unwrap().len(), 1);
    }
}
