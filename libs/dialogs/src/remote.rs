use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use serde_json::Value;
use toybox_core::{Activity, TurnContext};
use tracing::{debug, instrument};

use crate::context::DialogContext;
use crate::dialog::{Dialog, DialogTurnResult};
use crate::error::{DialogError, DialogResult};

const MAX_ERROR_BODY: usize = 512;

pub type TargetFn = Arc<dyn Fn(&TurnContext) -> DialogResult<Url> + Send + Sync>;

/// Where a [`RemoteDialog`] posts its activities.
#[derive(Clone)]
pub enum RemoteTarget {
    Static(Url),
    /// Resolved again on every turn.
    Computed(TargetFn),
}

impl RemoteTarget {
    pub fn resolve(&self, ctx: &TurnContext) -> DialogResult<Url> {
        match self {
            Self::Static(url) => Ok(url.clone()),
            Self::Computed(resolve) => resolve(ctx),
        }
    }
}

impl std::fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(url) => f.debug_tuple("Static").field(&url.as_str()).finish(),
            Self::Computed(_) => f.write_str("Computed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteDialogSettings {
    pub client: Client,
    /// Name of the event posted when the dialog begins.
    pub begin_event_name: String,
}

impl Default for RemoteDialogSettings {
    fn default() -> Self {
        Self {
            client: Client::new(),
            begin_event_name: "dialogBegin".into(),
        }
    }
}

/// Relays the conversation to another bot over HTTP.
///
/// Every turn is posted to the target as a JSON activity; the response body is
/// a JSON array of activities. Replies are forwarded to the user as they are.
/// An `endOfConversation` in the response ends this dialog with its `value`
/// and is never forwarded. Requests are not retried.
#[derive(Debug, Clone)]
pub struct RemoteDialog {
    target: RemoteTarget,
    settings: RemoteDialogSettings,
}

impl RemoteDialog {
    pub fn new(target: RemoteTarget) -> Self {
        Self {
            target,
            settings: RemoteDialogSettings::default(),
        }
    }

    pub fn from_url(url: &str) -> DialogResult<Self> {
        let url = Url::parse(url).map_err(|err| DialogError::InvalidTarget(format!("{url}: {err}")))?;
        Ok(Self::new(RemoteTarget::Static(url)))
    }

    pub fn computed<F>(resolve: F) -> Self
    where
        F: Fn(&TurnContext) -> DialogResult<Url> + Send + Sync + 'static,
    {
        Self::new(RemoteTarget::Computed(Arc::new(resolve)))
    }

    pub fn with_settings(mut self, settings: RemoteDialogSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    fn begin_event(&self, incoming: &Activity, args: Option<Value>) -> Activity {
        let mut event = Activity::event(self.settings.begin_event_name.clone(), args);
        event.channel_id = incoming.channel_id.clone();
        event.conversation = incoming.conversation.clone();
        event.from = incoming.from.clone();
        event.recipient = incoming.recipient.clone();
        event.timestamp = incoming.timestamp.clone();
        event.id = incoming.id.clone();
        event
    }

    #[instrument(name = "dialogs.remote.relay", skip_all, fields(kind = %activity.kind))]
    async fn relay(
        &self,
        dc: &mut DialogContext,
        mut activity: Activity,
    ) -> DialogResult<DialogTurnResult> {
        let url = self.target.resolve(dc.context())?;
        activity.service_url = None;

        let replies = self.post(url, &activity).await?;

        let mut end: Option<Option<Value>> = None;
        let mut outbound = Vec::with_capacity(replies.len());
        for reply in replies {
            if reply.is_end_of_conversation() {
                if end.is_none() {
                    end = Some(reply.value);
                }
            } else {
                outbound.push(reply);
            }
        }

        if !outbound.is_empty() {
            debug!(count = outbound.len(), "forwarding remote replies");
            dc.context().send_activities(outbound).await?;
        }

        match end {
            Some(result) => {
                debug!("remote dialog ended");
                dc.end_dialog(result).await
            }
            None => Ok(DialogTurnResult::waiting()),
        }
    }

    async fn post(&self, url: Url, activity: &Activity) -> DialogResult<Vec<Activity>> {
        let started = Instant::now();
        let response = self
            .settings
            .client
            .post(url)
            .json(activity)
            .send()
            .await
            .map_err(|err| {
                counter!("remote_dialog_errors_total", "kind" => "transport").increment(1);
                DialogError::Http(err)
            })?;

        let status = response.status();
        histogram!(
            "remote_dialog_roundtrip_seconds",
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".into());
            counter!(
                "remote_dialog_errors_total",
                "kind" => "remote",
                "status" => status.as_str().to_string()
            )
            .increment(1);
            return Err(DialogError::Transport {
                status,
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            counter!("remote_dialog_errors_total", "kind" => "decode").increment(1);
            DialogError::Serialization(err)
        })
    }
}

#[async_trait]
impl Dialog for RemoteDialog {
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        args: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let event = self.begin_event(dc.context().activity(), args);
        self.relay(dc, event).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> DialogResult<DialogTurnResult> {
        let incoming = dc.context().activity().clone();
        self.relay(dc, incoming).await
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
