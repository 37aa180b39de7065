use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogTurnResult};
use crate::error::DialogResult;

type BeginFn = Arc<
    dyn for<'a> Fn(&'a mut DialogContext, Option<Value>) -> BoxFuture<'a, DialogResult<DialogTurnResult>>
        + Send
        + Sync,
>;
type ContinueFn = Arc<
    dyn for<'a> Fn(&'a mut DialogContext) -> BoxFuture<'a, DialogResult<DialogTurnResult>>
        + Send
        + Sync,
>;

/// Dialog built from closures instead of a dedicated type.
///
/// Without an `on_continue` handler the dialog ends on the next turn, and it
/// always ends with the child's result when resumed.
#[derive(Clone)]
pub struct DialogHandler {
    on_begin: BeginFn,
    on_continue: Option<ContinueFn>,
}

impl DialogHandler {
    pub fn new<F>(on_begin: F) -> Self
    where
        F: for<'a> Fn(&'a mut DialogContext, Option<Value>) -> BoxFuture<'a, DialogResult<DialogTurnResult>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            on_begin: Arc::new(on_begin),
            on_continue: None,
        }
    }

    pub fn on_continue<F>(mut self, on_continue: F) -> Self
    where
        F: for<'a> Fn(&'a mut DialogContext) -> BoxFuture<'a, DialogResult<DialogTurnResult>>
            + Send
            + Sync
            + 'static,
    {
        self.on_continue = Some(Arc::new(on_continue));
        self
    }
}

#[async_trait]
impl Dialog for DialogHandler {
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        (self.on_begin)(dc, args).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        match &self.on_continue {
            Some(on_continue) => on_continue(dc).await,
            None => dc.end_dialog(None).await,
        }
    }
}

impl std::fmt::Debug for DialogHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogHandler")
            .field("on_continue", &self.on_continue.is_some())
            .finish()
    }
}
