use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::trace;

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogTurnResult};
use crate::error::DialogResult;

const STEP_INDEX: &str = "stepIndex";
const OPTIONS: &str = "options";
const VALUES: &str = "values";

pub type WaterfallStepFn = Arc<
    dyn for<'a> Fn(WaterfallStep<'a>) -> BoxFuture<'a, DialogResult<DialogTurnResult>>
        + Send
        + Sync,
>;

/// Dialog made of ordered steps.
///
/// Each step runs in its own turn unless it calls [`WaterfallStep::next`].
/// The result handed to a step is the previous step's `next` value, the
/// text of the user's reply, or the result of a child dialog.
#[derive(Clone, Default)]
pub struct Waterfall {
    steps: Vec<WaterfallStepFn>,
}

impl Waterfall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step<F>(mut self, step: F) -> Self
    where
        F: for<'a> Fn(WaterfallStep<'a>) -> BoxFuture<'a, DialogResult<DialogTurnResult>>
            + Send
            + Sync
            + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    async fn run_step(
        &self,
        dc: &mut DialogContext,
        index: usize,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let Some(step) = self.steps.get(index) else {
            trace!(steps = self.steps.len(), "waterfall finished");
            return dc.end_dialog(None).await;
        };
        if let Some(active) = dc.active_dialog_mut() {
            active.state.insert(STEP_INDEX.into(), Value::from(index));
        }
        dc.flush().await?;
        trace!(step = index, "running waterfall step");
        step(WaterfallStep { dc, index, result }).await
    }
}

#[async_trait]
impl Dialog for Waterfall {
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        if let Some(active) = dc.active_dialog_mut() {
            active
                .state
                .insert(OPTIONS.into(), args.clone().unwrap_or(Value::Null));
            active
                .state
                .insert(VALUES.into(), Value::Object(Map::new()));
        }
        self.run_step(dc, 0, args).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        let activity = dc.context().activity();
        if !activity.is_message() {
            return Ok(DialogTurnResult::waiting());
        }
        let reply = activity.text.clone().map(Value::String);
        self.resume_dialog(dc, reply).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let cursor = dc
            .active_dialog()
            .and_then(|active| active.state.get(STEP_INDEX))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        self.run_step(dc, cursor + 1, result).await
    }
}

impl std::fmt::Debug for Waterfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waterfall")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// What a waterfall step receives. Derefs to the [`DialogContext`], so steps
/// can begin child dialogs or end the waterfall directly.
pub struct WaterfallStep<'a> {
    dc: &'a mut DialogContext,
    index: usize,
    result: Option<Value>,
}

impl<'a> WaterfallStep<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    /// Args the waterfall was begun with.
    pub fn options(&self) -> Option<&Value> {
        self.dc
            .active_dialog()
            .and_then(|active| active.state.get(OPTIONS))
            .filter(|options| !options.is_null())
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.dc
            .active_dialog()
            .and_then(|active| active.state.get(VALUES))
            .and_then(|values| values.get(key))
    }

    /// Stores a value that later steps can read back.
    pub async fn set_value(&mut self, key: impl Into<String>, value: Value) -> DialogResult<()> {
        if let Some(active) = self.dc.active_dialog_mut() {
            let values = active
                .state
                .entry(VALUES)
                .or_insert_with(|| Value::Object(Map::new()));
            if !values.is_object() {
                *values = Value::Object(Map::new());
            }
            if let Some(values) = values.as_object_mut() {
                values.insert(key.into(), value);
            }
        }
        self.dc.flush().await
    }

    /// Runs the following step in this same turn.
    pub async fn next(self, result: Option<Value>) -> DialogResult<DialogTurnResult> {
        self.dc.resume_active(result).await
    }

    /// Ends the turn and waits for the user's reply.
    pub fn wait(&self) -> DialogResult<DialogTurnResult> {
        Ok(DialogTurnResult::waiting())
    }
}

impl Deref for WaterfallStep<'_> {
    type Target = DialogContext;

    fn deref(&self) -> &Self::Target {
        self.dc
    }
}

impl DerefMut for WaterfallStep<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dc
    }
}
