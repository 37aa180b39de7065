use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::DialogContext;
use crate::error::DialogResult;

/// One entry on a dialog stack. The last entry is the active dialog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    pub id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl DialogInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogTurnStatus {
    /// No dialog handled the turn.
    Empty,
    /// A dialog is active and expects more input.
    Waiting,
    /// The stack emptied; `result` carries the last dialog's result.
    Complete,
    /// The stack was cleared by a cancel.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn empty() -> Self {
        Self {
            status: DialogTurnStatus::Empty,
            result: None,
        }
    }

    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: DialogTurnStatus::Cancelled,
            result: None,
        }
    }
}

/// A step in a conversation that can span turns.
///
/// Dialogs keep no per-conversation state of their own: anything that must
/// survive a turn goes into the active [`DialogInstance::state`], which the
/// context persists with the stack.
#[async_trait]
pub trait Dialog: Send + Sync {
    /// Called right after the instance is pushed onto the stack.
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult>;

    /// Called when a new turn reaches this dialog while it is active.
    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(None).await
    }

    /// Called when a child dialog ended and this dialog is active again.
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(result).await
    }
}
