use std::collections::HashMap;
use std::sync::Arc;

use toybox_core::TurnContext;
use toybox_memory::MemoryFragment;
use tracing::debug;

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogInstance};
use crate::error::{DialogError, DialogResult};

/// Registry of dialogs by id.
///
/// Built once at startup and shared behind an `Arc`; contexts created from it
/// look dialogs up by the ids stored on the stack.
#[derive(Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<D>(&mut self, id: impl Into<String>, dialog: D) -> DialogResult<&mut Self>
    where
        D: Dialog + 'static,
    {
        self.add_shared(id, Arc::new(dialog))
    }

    pub fn add_shared(
        &mut self,
        id: impl Into<String>,
        dialog: Arc<dyn Dialog>,
    ) -> DialogResult<&mut Self> {
        let id = id.into();
        if self.dialogs.contains_key(&id) {
            return Err(DialogError::DuplicateDialog(id));
        }
        self.dialogs.insert(id, dialog);
        Ok(self)
    }

    pub fn find(&self, id: &str) -> Option<Arc<dyn Dialog>> {
        self.dialogs.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dialogs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Loads the stack persisted in `stack` (empty when absent) and binds the
    /// context to it, so every stack change is written back to the fragment.
    pub async fn create_context(
        self: &Arc<Self>,
        turn: &TurnContext,
        stack: &MemoryFragment,
    ) -> DialogResult<DialogContext> {
        let instances: Vec<DialogInstance> = stack.get_as(turn).await?.unwrap_or_default();
        debug!(
            fragment = stack.name(),
            depth = instances.len(),
            "dialog stack loaded"
        );
        Ok(DialogContext::new(
            turn.clone(),
            Arc::clone(self),
            instances,
            Some(stack.clone()),
        ))
    }

    /// Context over an in-memory stack that is not persisted anywhere. The
    /// caller owns the stack and reads it back with
    /// [`DialogContext::into_stack`].
    pub fn detached_context(
        self: &Arc<Self>,
        turn: &TurnContext,
        stack: Vec<DialogInstance>,
    ) -> DialogContext {
        DialogContext::new(turn.clone(), Arc::clone(self), stack, None)
    }
}

impl std::fmt::Debug for DialogSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.dialogs.keys().collect();
        ids.sort();
        f.debug_struct("DialogSet").field("dialogs", &ids).finish()
    }
}
