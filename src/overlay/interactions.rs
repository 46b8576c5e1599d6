//! Interaction state and its transition table

use crate::storage::{Snapshot, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Favorite, archived and hidden identities, in insertion order.
///
/// Hidden is exclusive with the other two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionState {
    pub favorites: Vec<String>,
    pub archived: Vec<String>,
    pub hidden: Vec<String>,
}

impl Snapshot for InteractionState {}

/// One user action on one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Like,
    Unlike,
    Archive,
    Unarchive,
    Restore,
    Hide,
    Unhide,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(Action::Like),
            "unlike" => Ok(Action::Unlike),
            "archive" => Ok(Action::Archive),
            "unarchive" => Ok(Action::Unarchive),
            "restore" => Ok(Action::Restore),
            "hide" => Ok(Action::Hide),
            "unhide" => Ok(Action::Unhide),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

fn add(set: &mut Vec<String>, id: &str) {
    if !set.iter().any(|x| x == id) {
        set.push(id.to_string());
    }
}

fn remove(set: &mut Vec<String>, id: &str) {
    set.retain(|x| x != id);
}

impl InteractionState {
    /// Apply one action. An empty identity is a no-op.
    pub fn apply(&mut self, action: Action, identity: &str) {
        let id = identity.trim();
        if id.is_empty() {
            return;
        }
        match action {
            Action::Like => {
                add(&mut self.favorites, id);
                remove(&mut self.hidden, id);
            }
            Action::Unlike => remove(&mut self.favorites, id),
            Action::Archive => {
                remove(&mut self.favorites, id);
                add(&mut self.archived, id);
                remove(&mut self.hidden, id);
            }
            Action::Unarchive => remove(&mut self.archived, id),
            Action::Restore => {
                add(&mut self.favorites, id);
                remove(&mut self.archived, id);
                remove(&mut self.hidden, id);
            }
            Action::Hide => {
                remove(&mut self.favorites, id);
                remove(&mut self.archived, id);
                add(&mut self.hidden, id);
            }
            Action::Unhide => remove(&mut self.hidden, id),
        }
    }

    /// Apply an action by name; unknown names are a no-op.
    pub fn apply_named(&mut self, action: &str, identity: &str) {
        match action.parse::<Action>() {
            Ok(action) => self.apply(action, identity),
            Err(e) => debug!(error = %e, "ignoring interaction"),
        }
    }

    pub fn is_hidden(&self, identity: &str) -> bool {
        self.hidden.iter().any(|x| x == identity)
    }

    pub fn is_favorite(&self, identity: &str) -> bool {
        self.favorites.iter().any(|x| x == identity)
    }

    pub fn is_archived(&self, identity: &str) -> bool {
        self.archived.iter().any(|x| x == identity)
    }
}

/// Load the state at `path`, apply one named action, persist, and return the full state.
pub fn record_interaction(path: &Path, action: &str, identity: &str) -> StorageResult<InteractionState> {
    let mut state = InteractionState::load_or_default(path);
    state.apply_named(action, identity);
    state.save(path)?;
    info!(action, identity, "interaction recorded");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(f: &[&str], a: &[&str], h: &[&str]) -> InteractionState {
        let v = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        InteractionState {
            favorites: v(f),
            archived: v(a),
            hidden: v(h),
        }
    }

    #[test]
    fn hide_clears_favorite() {
        let mut s = state(&["A"], &[], &[]);
        s.apply(Action::Hide, "A");
        assert_eq!(s, state(&[], &[], &["A"]));
    }

    #[test]
    fn restore_moves_hidden_to_favorites() {
        let mut s = state(&[], &[], &["A"]);
        s.apply(Action::Restore, "A");
        assert_eq!(s, state(&["A"], &[], &[]));
    }

    #[test]
    fn archive_clears_favorite_and_hidden() {
        let mut s = state(&["A"], &[], &["A"]);
        s.apply(Action::Archive, "A");
        assert_eq!(s, state(&[], &["A"], &[]));
    }

    #[test]
    fn like_twice_keeps_one_entry() {
        let mut s = InteractionState::default();
        s.apply(Action::Like, "A");
        s.apply(Action::Like, "A");
        assert_eq!(s.favorites, vec!["A"]);
    }

    #[test]
    fn single_set_removals() {
        let mut s = state(&["A"], &["B"], &["C"]);
        s.apply(Action::Unlike, "A");
        s.apply(Action::Unarchive, "B");
        s.apply(Action::Unhide, "C");
        assert_eq!(s, InteractionState::default());
    }

    #[test]
    fn unknown_action_and_empty_id_are_noops() {
        let mut s = state(&["A"], &[], &[]);
        s.apply_named("explode", "A");
        s.apply_named("hide", "  ");
        assert_eq!(s, state(&["A"], &[], &[]));
    }

    #[test]
    fn hidden_is_exclusive_after_any_sequence() {
        let actions = [
            Action::Like,
            Action::Archive,
            Action::Hide,
            Action::Restore,
            Action::Hide,
            Action::Like,
            Action::Unhide,
        ];
        let mut s = InteractionState::default();
        for action in actions {
            s.apply(action, "X");
            let hidden = s.is_hidden("X");
            assert!(!(hidden && (s.is_favorite("X") || s.is_archived("X"))), "{:?}", action);
        }
    }

    #[test]
    fn legacy_file_without_archived_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interactions.json");
        std::fs::write(&path, r#"{"favorites": ["A"], "hidden": ["B"]}"#).unwrap();

        let s = record_interaction(&path, "like", "B").unwrap();
        assert_eq!(s, state(&["A", "B"], &[], &[]));
        assert_eq!(InteractionState::load_or_default(&path), s);
    }
}
