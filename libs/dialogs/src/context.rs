use std::sync::Arc;

use serde_json::Value;
use toybox_core::TurnContext;
use toybox_memory::MemoryFragment;
use tracing::{debug, instrument};

use crate::dialog::{Dialog, DialogInstance, DialogTurnResult};
use crate::error::{DialogError, DialogResult};
use crate::set::DialogSet;

/// A dialog stack for one turn.
///
/// Created by [`DialogSet::create_context`]; stack changes are written
/// through to the bound fragment immediately, and become durable when the
/// owning scope saves its changes at the end of the turn.
pub struct DialogContext {
    turn: TurnContext,
    dialogs: Arc<DialogSet>,
    stack: Vec<DialogInstance>,
    binding: Option<MemoryFragment>,
}

impl DialogContext {
    pub(crate) fn new(
        turn: TurnContext,
        dialogs: Arc<DialogSet>,
        stack: Vec<DialogInstance>,
        binding: Option<MemoryFragment>,
    ) -> Self {
        Self {
            turn,
            dialogs,
            stack,
            binding,
        }
    }

    pub fn context(&self) -> &TurnContext {
        &self.turn
    }

    pub fn dialogs(&self) -> &Arc<DialogSet> {
        &self.dialogs
    }

    pub fn stack(&self) -> &[DialogInstance] {
        &self.stack
    }

    pub fn into_stack(self) -> Vec<DialogInstance> {
        self.stack
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn active_dialog(&self) -> Option<&DialogInstance> {
        self.stack.last()
    }

    /// Mutable access to the active instance. Call [`Self::flush`] afterwards
    /// when the change must reach the bound fragment before the next stack
    /// operation.
    pub fn active_dialog_mut(&mut self) -> Option<&mut DialogInstance> {
        self.stack.last_mut()
    }

    /// Writes the stack through to the bound fragment, if any.
    pub async fn flush(&mut self) -> DialogResult<()> {
        if let Some(binding) = &self.binding {
            binding.set_as(&self.turn, &self.stack).await?;
        }
        Ok(())
    }

    #[instrument(name = "dialogs.begin", skip(self, args), fields(depth = self.stack.len()))]
    pub async fn begin_dialog(
        &mut self,
        id: &str,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let dialog = self.lookup(id)?;
        self.stack.push(DialogInstance::new(id));
        self.flush().await?;
        debug!("dialog started");
        dialog.begin_dialog(self, args).await
    }

    /// Routes the turn to the active dialog. Returns `Empty` when the stack
    /// is empty.
    pub async fn continue_dialog(&mut self) -> DialogResult<DialogTurnResult> {
        let Some(id) = self.active_dialog().map(|active| active.id.clone()) else {
            return Ok(DialogTurnResult::empty());
        };
        let dialog = self.lookup(&id)?;
        dialog.continue_dialog(self).await
    }

    /// Pops the active dialog and resumes its parent with `result`.
    ///
    /// When nothing is left to resume the result comes back as `Complete`.
    /// Ending on an empty stack does nothing and returns `Empty`.
    pub async fn end_dialog(&mut self, result: Option<Value>) -> DialogResult<DialogTurnResult> {
        let Some(ended) = self.stack.pop() else {
            return Ok(DialogTurnResult::empty());
        };
        self.flush().await?;
        debug!(dialog = %ended.id, depth = self.stack.len(), "dialog ended");
        self.resume_active(result).await
    }

    /// Swaps the active dialog for `id` without resuming the parent in
    /// between. An unknown id leaves the stack untouched.
    pub async fn replace_dialog(
        &mut self,
        id: &str,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.lookup(id)?;
        if let Some(replaced) = self.stack.pop() {
            debug!(dialog = %replaced.id, with = id, "dialog replaced");
        }
        self.begin_dialog(id, args).await
    }

    /// Clears the whole stack. Dialogs are not notified.
    pub async fn cancel_all_dialogs(&mut self) -> DialogResult<DialogTurnResult> {
        if self.stack.is_empty() {
            return Ok(DialogTurnResult::empty());
        }
        let cancelled = self.stack.len();
        self.stack.clear();
        self.flush().await?;
        debug!(cancelled, "dialog stack cancelled");
        Ok(DialogTurnResult::cancelled())
    }

    /// Hands `result` to the active dialog, or reports `Complete` when the
    /// stack is empty.
    pub(crate) async fn resume_active(
        &mut self,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let Some(id) = self.active_dialog().map(|active| active.id.clone()) else {
            return Ok(DialogTurnResult::complete(result));
        };
        let parent = self.lookup(&id)?;
        parent.resume_dialog(self, result).await
    }

    fn lookup(&self, id: &str) -> DialogResult<Arc<dyn Dialog>> {
        self.dialogs
            .find(id)
            .ok_or_else(|| DialogError::UnknownDialog(id.to_string()))
    }
}

impl std::fmt::Debug for DialogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogContext")
            .field("stack", &self.stack)
            .field("bound", &self.binding.as_ref().map(MemoryFragment::name))
            .finish()
    }
}
