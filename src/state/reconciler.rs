//! Applies inbound broadcast messages to local view state without
//! clobbering an actively-edited note's unsaved buffer.
//!
//! Per-note states, seen from this client: Unopened (no buffer),
//! OpenClean (buffer matches the stored copy), OpenDirty (buffer has
//! unsaved local edits). A remote update always lands in the stored
//! copy; whether it also lands in the buffer depends on that state.

use super::{CollectionAction, CollectionState};
use crate::editor::EditBuffer;
use crate::models::BroadcastMessage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReconcileEffect {
    /// Collection changed; no open buffer was involved.
    Applied,
    /// The open, clean buffer was replaced with the remote value.
    BufferRefreshed,
    /// The open buffer had unsaved edits and was left untouched; only
    /// the stored copy changed. Local autosave will re-announce and
    /// become the converged value.
    BufferPreserved,
    /// The active note was deleted remotely; pointer and buffer are
    /// gone and the user should be told.
    ActiveNoteDeleted,
    /// Unknown/already-deleted id, duplicate create, or a presence
    /// message. Never an error.
    Ignored,
}

pub(crate) fn apply_remote(
    collection: &mut CollectionState,
    buffer: &mut Option<EditBuffer>,
    msg: BroadcastMessage,
) -> ReconcileEffect {
    match msg {
        BroadcastMessage::NoteCreate { note } => {
            if collection.get(&note.id).is_some() {
                return ReconcileEffect::Ignored;
            }
            collection.apply(CollectionAction::Created(note));
            ReconcileEffect::Applied
        }

        BroadcastMessage::NoteUpdate { note } => {
            if collection.get(&note.id).is_none() {
                return ReconcileEffect::Ignored;
            }
            collection.apply(CollectionAction::Updated(note.clone()));

            match buffer {
                Some(buf) if buf.note_id == note.id => {
                    if buf.dirty {
                        // Local unsaved edits take precedence until our
                        // own autosave completes and re-announces.
                        ReconcileEffect::BufferPreserved
                    } else {
                        *buf = EditBuffer::open(&note);
                        ReconcileEffect::BufferRefreshed
                    }
                }
                _ => ReconcileEffect::Applied,
            }
        }

        BroadcastMessage::NoteDelete { note_id } => {
            if collection.get(&note_id).is_none() {
                return ReconcileEffect::Ignored;
            }

            let was_open = buffer
                .as_ref()
                .map(|b| b.note_id == note_id)
                .unwrap_or(false);
            let was_active = collection.active_note_id.as_deref() == Some(note_id.as_str());

            collection.apply(CollectionAction::Removed(note_id));
            if was_open {
                *buffer = None;
            }

            if was_open || was_active {
                ReconcileEffect::ActiveNoteDeleted
            } else {
                ReconcileEffect::Applied
            }
        }

        // Presence shares the channel but never touches note state; it
        // is routed to its own handler.
        BroadcastMessage::UserJoined { .. } | BroadcastMessage::UserLeft { .. } => {
            ReconcileEffect::Ignored
        }
    }
}
