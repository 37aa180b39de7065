use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known activity type names.
pub mod activity_types {
    pub const MESSAGE: &str = "message";
    pub const EVENT: &str = "event";
    pub const END_OF_CONVERSATION: &str = "endOfConversation";
    pub const TYPING: &str = "typing";
    pub const CONVERSATION_UPDATE: &str = "conversationUpdate";
}

/// Participant reference (`from` / `recipient`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            is_group: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub value: Value,
}

impl CardAction {
    /// Button that posts its title back into the conversation.
    pub fn im_back(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            kind: "imBack".into(),
            value: Value::String(title.clone()),
            title,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedActions {
    #[serde(default)]
    pub actions: Vec<CardAction>,
}

/// Bot Framework shaped activity. Unknown fields are kept in `extra` so that
/// relaying an activity does not drop channel specific data.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<SuggestedActions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// ```
    /// use toybox_core::Activity;
    ///
    /// let activity = Activity::message("hello");
    /// assert!(activity.is_message());
    /// assert_eq!(activity.text.as_deref(), Some("hello"));
    /// ```
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(activity_types::MESSAGE)
        }
    }

    pub fn event(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value,
            ..Self::new(activity_types::EVENT)
        }
    }

    pub fn end_of_conversation(value: Option<Value>) -> Self {
        Self {
            value,
            ..Self::new(activity_types::END_OF_CONVERSATION)
        }
    }

    pub fn with_suggested_actions<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_actions = Some(SuggestedActions {
            actions: titles.into_iter().map(CardAction::im_back).collect(),
        });
        self
    }

    pub fn is_type(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }

    pub fn is_message(&self) -> bool {
        self.is_type(activity_types::MESSAGE)
    }

    pub fn is_end_of_conversation(&self) -> bool {
        self.is_type(activity_types::END_OF_CONVERSATION)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn from_id(&self) -> Option<&str> {
        self.from
            .as_ref()
            .map(|f| f.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Copies addressing from `incoming` so this activity answers it: same
    /// channel, conversation and service url, with `from`/`recipient` swapped.
    /// Fields that are already set are left alone.
    pub fn reply_to(mut self, incoming: &Activity) -> Self {
        if self.channel_id.is_none() {
            self.channel_id = incoming.channel_id.clone();
        }
        if self.service_url.is_none() {
            self.service_url = incoming.service_url.clone();
        }
        if self.conversation.is_none() {
            self.conversation = incoming.conversation.clone();
        }
        if self.from.is_none() {
            self.from = incoming.recipient.clone();
        }
        if self.recipient.is_none() {
            self.recipient = incoming.from.clone();
        }
        if self.reply_to_id.is_none() {
            self.reply_to_id = incoming.id.clone();
        }
        self
    }
}

/// Identifier handed back by the channel for a delivered activity.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceResponse {
    pub id: String,
}
