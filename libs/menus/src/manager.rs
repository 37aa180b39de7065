use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toybox_core::{Activity, TurnContext};
use toybox_memory::MemoryFragment;
use tracing::{debug, instrument};

use crate::error::{MenuError, MenuResult};
use crate::menu::{Menu, MenuChoice, MenuSelection};
use crate::recognizer::{score, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub struct MenuManagerSettings {
    /// Matches scoring below this are ignored.
    pub min_score: f64,
}

impl Default for MenuManagerSettings {
    fn default() -> Self {
        Self { min_score: 0.5 }
    }
}

impl MenuManagerSettings {
    fn validate(&self) -> MenuResult<()> {
        if !(self.min_score > 0.0 && self.min_score <= 1.0) {
            return Err(MenuError::InvalidSettings(format!(
                "min_score must be in (0, 1], got {}",
                self.min_score
            )));
        }
        Ok(())
    }
}

/// Per-conversation menu state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shown: Option<ShownMenu>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShownMenu {
    pub name: String,
    /// Unix ms at which the menu was shown.
    pub timestamp: i64,
    /// User turns seen since the menu was shown.
    pub turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub clicked: bool,
}

/// Registry of menus plus the logic that shows, hides and matches them.
///
/// At most one menu is shown per conversation. On each message turn the shown
/// menu and every default menu compete for the utterance; the best match
/// above `min_score` runs its choice handler.
pub struct MenuManager {
    menus: Vec<Menu>,
    state: MemoryFragment,
    settings: MenuManagerSettings,
}

struct Candidate<'m> {
    menu: &'m Menu,
    choice: &'m MenuChoice,
    score: f64,
}

impl MenuManager {
    /// `state` is the fragment the per-conversation [`MenuState`] lives in.
    pub fn new(state: MemoryFragment) -> Self {
        Self {
            menus: Vec::new(),
            state,
            settings: MenuManagerSettings::default(),
        }
    }

    pub fn with_settings(state: MemoryFragment, settings: MenuManagerSettings) -> MenuResult<Self> {
        settings.validate()?;
        Ok(Self {
            menus: Vec::new(),
            state,
            settings,
        })
    }

    pub fn add_menu(&mut self, menu: Menu) -> MenuResult<&mut Self> {
        if self.menu(&menu.name).is_some() {
            return Err(MenuError::DuplicateMenu(menu.name));
        }
        self.menus.push(menu);
        Ok(self)
    }

    pub fn menu(&self, name: &str) -> Option<&Menu> {
        self.menus.iter().find(|menu| menu.name == name)
    }

    pub async fn state(&self, ctx: &TurnContext) -> MenuResult<MenuState> {
        Ok(self.state.get_as(ctx).await?.unwrap_or_default())
    }

    /// Marks `name` as the shown menu and sends it as suggested actions.
    #[instrument(name = "menus.show", skip(self, ctx, data))]
    pub async fn show_menu(
        &self,
        ctx: &TurnContext,
        name: &str,
        data: Option<Value>,
    ) -> MenuResult<()> {
        let menu = self
            .menu(name)
            .ok_or_else(|| MenuError::UnknownMenu(name.to_string()))?;
        let state = MenuState {
            shown: Some(ShownMenu {
                name: menu.name.clone(),
                timestamp: ctx.now_unix_ms(),
                turns: 0,
                data,
                clicked: false,
            }),
        };
        self.state.set_as(ctx, &state).await?;

        let rendered = Activity::message(menu.prompt())
            .with_suggested_actions(menu.choices.iter().map(|choice| choice.value.clone()));
        ctx.send_activity(rendered)
            .await
            .map_err(MenuError::Delivery)?;
        debug!(choices = menu.choices.len(), "menu shown");
        Ok(())
    }

    pub async fn hide_menu(&self, ctx: &TurnContext) -> MenuResult<()> {
        let mut state = self.state(ctx).await?;
        if state.shown.take().is_some() {
            self.state.set_as(ctx, &state).await?;
            debug!("menu hidden");
        }
        Ok(())
    }

    /// Matches the turn's utterance against the active menus.
    ///
    /// Runs the matching choice's handler and returns the selection, or calls
    /// `next` when nothing matched. Non-message turns go straight to `next`.
    #[instrument(name = "menus.recognize", skip_all)]
    pub async fn recognize_utterance<F, Fut>(
        &self,
        ctx: &TurnContext,
        next: F,
    ) -> MenuResult<Option<MenuSelection>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let activity = ctx.activity();
        let utterance = match activity.text.as_deref() {
            Some(text) if activity.is_message() => tokenize(text),
            _ => {
                next().await.map_err(MenuError::Handler)?;
                return Ok(None);
            }
        };

        let mut state = self.state(ctx).await?;
        self.apply_auto_hide(ctx, &mut state);

        let best = self.best_match(state.shown.as_ref(), &utterance);
        let Some(best) = best else {
            self.state.set_as(ctx, &state).await?;
            debug!("no menu matched");
            next().await.map_err(MenuError::Handler)?;
            return Ok(None);
        };

        let mut data = None;
        if let Some(shown) = state.shown.as_mut() {
            if shown.name == best.menu.name {
                data = shown.data.clone();
                if best.menu.settings.hide_after_click {
                    shown.clicked = true;
                }
            }
        }
        self.state.set_as(ctx, &state).await?;

        let selection = MenuSelection {
            menu: best.menu.name.clone(),
            choice: best.choice.value.clone(),
            score: best.score,
            data,
        };
        debug!(
            menu = %selection.menu,
            choice = %selection.choice,
            score = selection.score,
            "menu choice selected"
        );
        (best.choice.handler())(ctx.clone(), selection.clone())
            .await
            .map_err(MenuError::Handler)?;
        Ok(Some(selection))
    }

    /// Counts the turn against the shown menu and hides it when one of its
    /// limits has been reached.
    fn apply_auto_hide(&self, ctx: &TurnContext, state: &mut MenuState) {
        let Some(shown) = state.shown.as_mut() else {
            return;
        };
        shown.turns = shown.turns.saturating_add(1);
        let hide = match self.menu(&shown.name) {
            None => true,
            Some(menu) => {
                let elapsed_ms = ctx.now_unix_ms().saturating_sub(shown.timestamp);
                let settings = &menu.settings;
                shown.clicked
                    || settings
                        .hide_after
                        .is_some_and(|after| elapsed_ms as i128 > after.as_millis() as i128)
                    || settings
                        .hide_after_turns
                        .is_some_and(|limit| shown.turns > limit)
            }
        };
        if hide {
            debug!(menu = %shown.name, turns = shown.turns, "menu auto-hidden");
            state.shown = None;
        }
    }

    /// The shown menu first, then default menus in registration order. The
    /// first candidate wins a tie.
    fn best_match<'m>(
        &'m self,
        shown: Option<&ShownMenu>,
        utterance: &[String],
    ) -> Option<Candidate<'m>> {
        let shown_menu = shown.and_then(|shown| self.menu(&shown.name));
        let defaults = self
            .menus
            .iter()
            .filter(|menu| menu.settings.is_default)
            .filter(|menu| shown_menu.is_none_or(|shown| shown.name != menu.name));

        let mut best: Option<Candidate<'m>> = None;
        for menu in shown_menu.into_iter().chain(defaults) {
            for choice in &menu.choices {
                let score = choice
                    .phrases()
                    .map(|phrase| score(&phrase, utterance))
                    .fold(0.0, f64::max);
                if score < self.settings.min_score {
                    continue;
                }
                if best.as_ref().is_none_or(|current| score > current.score) {
                    best = Some(Candidate {
                        menu,
                        choice,
                        score,
                    });
                }
            }
        }
        best
    }
}

impl std::fmt::Debug for MenuManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.menus.iter().map(|menu| menu.name.as_str()).collect();
        f.debug_struct("MenuManager")
            .field("menus", &names)
            .field("settings", &self.settings)
            .finish()
    }
}
