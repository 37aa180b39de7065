//! Suggested-action menus.
//!
//! A [`MenuManager`] shows one menu at a time per conversation and matches
//! user utterances against the shown menu and any default menus. Matching is
//! token overlap, so "Red, please" can still pick a choice named "red".
mod error;
mod manager;
mod menu;
mod recognizer;

pub use error::{MenuError, MenuResult};
pub use manager::{MenuManager, MenuManagerSettings, MenuState, ShownMenu};
pub use menu::{ChoiceHandler, Menu, MenuChoice, MenuSelection, MenuSettings};
pub use recognizer::{score, tokenize};
