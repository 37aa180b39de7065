use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use toybox_core::TurnContext;

use crate::recognizer::tokenize;

pub type ChoiceHandler =
    Arc<dyn Fn(TurnContext, MenuSelection) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A recognized choice, handed to the choice's handler.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuSelection {
    pub menu: String,
    pub choice: String,
    pub score: f64,
    /// Data passed to `show_menu`, when the match came from the shown menu.
    pub data: Option<Value>,
}

#[derive(Clone)]
pub struct MenuChoice {
    pub value: String,
    pub synonyms: Vec<String>,
    handler: ChoiceHandler,
}

impl MenuChoice {
    pub fn new<F>(value: impl Into<String>, handler: F) -> Self
    where
        F: Fn(TurnContext, MenuSelection) -> BoxFuture<'static, anyhow::Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            value: value.into(),
            synonyms: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }

    pub(crate) fn handler(&self) -> &ChoiceHandler {
        &self.handler
    }

    /// Token lists for the value followed by each synonym.
    pub(crate) fn phrases(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        std::iter::once(&self.value)
            .chain(self.synonyms.iter())
            .map(|phrase| tokenize(phrase))
    }
}

impl std::fmt::Debug for MenuChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuChoice")
            .field("value", &self.value)
            .field("synonyms", &self.synonyms)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MenuSettings {
    /// Default menus are matched on every turn, shown or not.
    pub is_default: bool,
    /// Hide the shown menu once it has been visible this long.
    pub hide_after: Option<Duration>,
    /// Hide the shown menu after this many user turns.
    pub hide_after_turns: Option<u32>,
    /// Hide the shown menu on the turn after one of its choices was picked.
    pub hide_after_click: bool,
    /// Text sent with the suggested actions. Defaults to the menu name.
    pub prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Menu {
    pub name: String,
    pub choices: Vec<MenuChoice>,
    pub settings: MenuSettings,
}

impl Menu {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            choices: Vec::new(),
            settings: MenuSettings::default(),
        }
    }

    pub fn choice(mut self, choice: MenuChoice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn with_settings(mut self, settings: MenuSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn prompt(&self) -> &str {
        self.settings.prompt.as_deref().unwrap_or(&self.name)
    }
}
