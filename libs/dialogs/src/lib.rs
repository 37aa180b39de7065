//! Dialog stack engine.
//!
//! A [`DialogSet`] registers dialogs by id. Each turn the host loads the
//! conversation's stack into a [`DialogContext`] and routes the activity to
//! the active dialog. Dialogs begin children, end with a result that resumes
//! their parent, or get cancelled wholesale.
//!
//! ```ignore
//! let mut set = DialogSet::new();
//! set.add("greet", Waterfall::new()
//!     .step(|step| Box::pin(async move {
//!         step.context().send_activity(Activity::message("What's your name?")).await?;
//!         step.wait()
//!     }))
//!     .step(|mut step| Box::pin(async move {
//!         let name = step.take_result();
//!         step.end_dialog(name).await
//!     })))?;
//! ```
mod container;
mod context;
mod dialog;
mod error;
mod handler;
mod remote;
mod set;
mod waterfall;

pub use container::DialogContainer;
pub use context::DialogContext;
pub use dialog::{Dialog, DialogInstance, DialogTurnResult, DialogTurnStatus};
pub use error::{DialogError, DialogResult};
pub use handler::DialogHandler;
pub use remote::{RemoteDialog, RemoteDialogSettings, RemoteTarget, TargetFn};
pub use set::DialogSet;
pub use waterfall::{Waterfall, WaterfallStep, WaterfallStepFn};
