use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogInstance, DialogTurnResult, DialogTurnStatus};
use crate::error::{DialogError, DialogResult};
use crate::set::DialogSet;

const DIALOG_STACK: &str = "dialogStack";

/// Dialog that runs its own [`DialogSet`] on a nested stack.
///
/// The nested stack lives in the container's instance state, so it is saved
/// and restored with the outer stack. The container ends, with the inner
/// result, once its nested stack empties.
#[derive(Debug, Clone)]
pub struct DialogContainer {
    initial_dialog_id: String,
    dialogs: Arc<DialogSet>,
}

impl DialogContainer {
    pub fn new(initial_dialog_id: impl Into<String>, dialogs: DialogSet) -> DialogResult<Self> {
        let initial_dialog_id = initial_dialog_id.into();
        if !dialogs.contains(&initial_dialog_id) {
            return Err(DialogError::UnknownDialog(initial_dialog_id));
        }
        Ok(Self {
            initial_dialog_id,
            dialogs: Arc::new(dialogs),
        })
    }

    pub fn initial_dialog_id(&self) -> &str {
        &self.initial_dialog_id
    }

    pub fn dialogs(&self) -> &Arc<DialogSet> {
        &self.dialogs
    }

    fn inner_stack(dc: &DialogContext) -> DialogResult<Vec<DialogInstance>> {
        match dc
            .active_dialog()
            .and_then(|active| active.state.get(DIALOG_STACK))
        {
            Some(stack) => Ok(serde_json::from_value(stack.clone())?),
            None => Ok(Vec::new()),
        }
    }

    /// Stores the inner stack back on the container's instance, then decides
    /// whether the container itself is done.
    async fn settle(
        &self,
        dc: &mut DialogContext,
        inner: DialogContext,
        outcome: DialogResult<DialogTurnResult>,
    ) -> DialogResult<DialogTurnResult> {
        let stack = serde_json::to_value(inner.into_stack())?;
        if let Some(active) = dc.active_dialog_mut() {
            active.state.insert(DIALOG_STACK.into(), stack);
        }
        dc.flush().await?;

        let outcome = outcome?;
        match outcome.status {
            DialogTurnStatus::Waiting => Ok(outcome),
            DialogTurnStatus::Complete => {
                debug!(initial = %self.initial_dialog_id, "container completed");
                dc.end_dialog(outcome.result).await
            }
            DialogTurnStatus::Cancelled | DialogTurnStatus::Empty => dc.end_dialog(None).await,
        }
    }
}

#[async_trait]
impl Dialog for DialogContainer {
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let mut inner = self.dialogs.detached_context(dc.context(), Vec::new());
        let outcome = inner.begin_dialog(&self.initial_dialog_id, args).await;
        self.settle(dc, inner, outcome).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        let stack = Self::inner_stack(dc)?;
        let mut inner = self.dialogs.detached_context(dc.context(), stack);
        let outcome = inner.continue_dialog().await;
        self.settle(dc, inner, outcome).await
    }

    /// Only reachable if something outside the container pushed a dialog on
    /// top of it; keep waiting on the nested stack.
    async fn resume_dialog(
        &self,
        _dc: &mut DialogContext,
        _result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        Ok(DialogTurnResult::waiting())
    }
}
