pub(crate) mod reconciler;

use crate::api::{ApiClient, EnvConfig};
use crate::channel::ChannelClient;
use crate::editor::EditBuffer;
use crate::models::{BroadcastMessage, Note};
use crate::storage::guest_username;
use leptos::prelude::*;

/// Authoritative in-memory list of known notes plus the active-note
/// pointer. Mutated only through `apply`, driven by gateway responses
/// and reconciler decisions; nothing else writes to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CollectionState {
    /// Insertion order, ids unique.
    pub notes: Vec<Note>,
    pub active_note_id: Option<String>,
}

pub(crate) enum CollectionAction {
    Loaded(Vec<Note>),
    Created(Note),
    /// Full replacement of title+content for an existing id.
    Updated(Note),
    Removed(String),
    Activated(Option<String>),
}

impl CollectionState {
    pub fn apply(&mut self, action: CollectionAction) {
        match action {
            CollectionAction::Loaded(notes) => {
                self.notes = notes;
                // Invariant: the active id must resolve to a note.
                if let Some(active) = &self.active_note_id {
                    if self.position(active).is_none() {
                        self.active_note_id = None;
                    }
                }
            }
            CollectionAction::Created(note) => {
                // Idempotent against an echo of our own creation.
                if self.position(&note.id).is_none() {
                    self.notes.push(note);
                }
            }
            CollectionAction::Updated(note) => {
                if let Some(idx) = self.position(&note.id) {
                    self.notes[idx] = note;
                }
            }
            CollectionAction::Removed(note_id) => {
                self.notes.retain(|n| n.id != note_id);
                if self.active_note_id.as_deref() == Some(note_id.as_str()) {
                    self.active_note_id = None;
                }
            }
            CollectionAction::Activated(note_id) => {
                self.active_note_id = note_id.filter(|id| self.position(id).is_some());
            }
        }
    }

    pub fn get(&self, note_id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    #[allow(dead_code)]
    pub fn active_note(&self) -> Option<&Note> {
        self.active_note_id.as_deref().and_then(|id| self.get(id))
    }

    fn position(&self, note_id: &str) -> Option<usize> {
        self.notes.iter().position(|n| n.id == note_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum NoticeKind {
    Success,
    Error,
}

/// Transient user-visible outcome of the most recent action; replaced
/// by the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StatusNotice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Shared session context: the one place holding collection, buffer,
/// presence, and the long-lived channel. Provided via Leptos context to
/// the editor, the sidebar, and the sync wiring.
#[derive(Clone)]
pub(crate) struct AppState {
    pub collection: RwSignal<CollectionState>,

    /// The open note's working copy. None when no note is open. Shared
    /// so the reconciler can honor dirty-buffer precedence.
    pub buffer: RwSignal<Option<EditBuffer>>,

    pub online_users: RwSignal<Vec<String>>,
    pub status: RwSignal<Option<StatusNotice>>,
    pub notes_loading: RwSignal<bool>,

    /// Guest display name, resolved once at startup.
    pub username: String,

    /// Stateless gateway: one call, one round trip.
    pub api_client: ApiClient,

    /// Explicitly owned connection with init/teardown lifecycle; no
    /// ambient singleton.
    pub channel: ChannelClient,
}

impl AppState {
    pub fn new() -> Self {
        let env = EnvConfig::new();
        let username = guest_username();
        let channel = ChannelClient::new(&username, &env.ws_url);

        Self {
            collection: RwSignal::new(CollectionState::default()),
            buffer: RwSignal::new(None),
            online_users: RwSignal::new(vec![]),
            status: RwSignal::new(None),
            notes_loading: RwSignal::new(false),
            username,
            api_client: ApiClient::new(env.api_url),
            channel,
        }
    }

    pub fn apply(&self, action: CollectionAction) {
        self.collection.update(|c| c.apply(action));
    }

    /// Runs an inbound broadcast message through the reconciler against
    /// the current collection + buffer, then publishes both back to the
    /// signals. Reads are untracked; this is event wiring, not a
    /// reactive computation.
    pub fn apply_remote(&self, msg: BroadcastMessage) -> reconciler::ReconcileEffect {
        let mut collection = self.collection.get_untracked();
        let mut buffer = self.buffer.get_untracked();
        let effect = reconciler::apply_remote(&mut collection, &mut buffer, msg);
        self.collection.set(collection);
        self.buffer.set(buffer);
        effect
    }

    pub fn notify_success(&self, message: impl Into<String>) {
        self.status.set(Some(StatusNotice {
            kind: NoticeKind::Success,
            message: message.into(),
        }));
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        self.status.set(Some(StatusNotice {
            kind: NoticeKind::Error,
            message: message.into(),
        }));
    }

    pub fn user_joined(&self, user: String) {
        self.online_users.update(|users| {
            if !users.contains(&user) {
                users.push(user);
            }
        });
    }

    pub fn user_left(&self, user: &str) {
        self.online_users.update(|users| users.retain(|u| u != user));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> CollectionState {
        let mut state = CollectionState::default();
        state.apply(CollectionAction::Loaded(vec![
            Note::new("n1", "T1", "C1"),
            Note::new("n2", "T2", "C2"),
        ]));
        state
    }

    #[test]
    fn test_loaded_replaces_list_and_keeps_resolvable_active() {
        let mut state = seeded();
        state.apply(CollectionAction::Activated(Some("n2".to_string())));

        state.apply(CollectionAction::Loaded(vec![Note::new("n2", "T2", "C2")]));
        assert_eq!(state.active_note_id.as_deref(), Some("n2"));

        state.apply(CollectionAction::Loaded(vec![Note::new("n3", "T3", "C3")]));
        assert_eq!(state.active_note_id, None);
    }

    #[test]
    fn test_created_is_idempotent_by_id() {
        let mut state = seeded();
        state.apply(CollectionAction::Created(Note::new("n1", "dup", "dup")));
        assert_eq!(state.notes.len(), 2);
        assert_eq!(state.get("n1").unwrap().title, "T1");

        state.apply(CollectionAction::Created(Note::new("n3", "T3", "C3")));
        assert_eq!(state.notes.len(), 3);
        assert_eq!(state.notes[2].id, "n3");
    }

    #[test]
    fn test_updated_replaces_payload_in_place() {
        let mut state = seeded();
        state.apply(CollectionAction::Updated(Note::new("n1", "T1b", "C1b")));

        assert_eq!(state.notes[0], Note::new("n1", "T1b", "C1b"));
        assert_eq!(state.notes.len(), 2);
    }

    #[test]
    fn test_updated_unknown_id_is_noop() {
        let mut state = seeded();
        let before = state.clone();
        state.apply(CollectionAction::Updated(Note::new("nx", "T", "C")));
        assert_eq!(state, before);
    }

    #[test]
    fn test_removed_clears_matching_active_pointer() {
        let mut state = seeded();
        state.apply(CollectionAction::Activated(Some("n1".to_string())));

        state.apply(CollectionAction::Removed("n1".to_string()));
        assert_eq!(state.notes.len(), 1);
        assert_eq!(state.active_note_id, None);

        // Removing a non-active note leaves the pointer alone.
        state.apply(CollectionAction::Activated(Some("n2".to_string())));
        state.apply(CollectionAction::Removed("nx".to_string()));
        assert_eq!(state.active_note_id.as_deref(), Some("n2"));
    }

    #[test]
    fn test_activated_requires_known_id() {
        let mut state = seeded();
        state.apply(CollectionAction::Activated(Some("nx".to_string())));
        assert_eq!(state.active_note_id, None);

        state.apply(CollectionAction::Activated(Some("n1".to_string())));
        assert_eq!(state.active_note_id.as_deref(), Some("n1"));

        state.apply(CollectionAction::Activated(None));
        assert_eq!(state.active_note_id, None);
    }
}
