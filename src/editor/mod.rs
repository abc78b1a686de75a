use crate::models::{BroadcastMessage, Note};
use crate::state::{AppState, CollectionAction};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

/// Debounce quiet window: a burst of keystrokes persists exactly once,
/// timed from the last keystroke.
pub(crate) const AUTOSAVE_QUIET_MS: i32 = 2000;

/// Working copy of the open note, decoupled from CollectionState so
/// keystrokes never mutate the shared list directly. Exists only while
/// a note is open; discarded unconditionally on switch or close.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EditBuffer {
    pub note_id: String,
    pub title: String,
    pub content: String,
    /// True from the first keystroke until the pending save resolves.
    pub dirty: bool,
}

impl EditBuffer {
    pub fn open(note: &Note) -> Self {
        Self {
            note_id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            dirty: false,
        }
    }

    pub fn edit_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.dirty = true;
    }

    pub fn edit_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.dirty = true;
    }
}

/// Clear `dirty` only if the buffer still holds exactly the snapshot
/// that was persisted. A keystroke that landed while the write was in
/// flight keeps the buffer dirty, so the next save carries it.
pub(crate) fn confirm_saved(
    buffer: &mut Option<EditBuffer>,
    note_id: &str,
    title: &str,
    content: &str,
) {
    if let Some(buf) = buffer {
        if buf.note_id == note_id && buf.title == title && buf.content == content {
            buf.dirty = false;
        }
    }
}

/// Coalesces rapid local edits into one persisted write per quiet
/// window, then announces the persisted value on the broadcast channel.
///
/// One pending-timer slot per note id. Switching notes or tearing down
/// the editor cancels the pending timer without flushing; the unsaved
/// window is lost by design (explicit Update covers the impatient
/// path).
#[derive(Clone)]
pub(crate) struct AutosaveController {
    app: AppState,
    quiet_ms: i32,
    timers: Arc<Mutex<HashMap<String, i32>>>,
}

impl AutosaveController {
    pub fn new(app: AppState) -> Self {
        Self {
            app,
            quiet_ms: AUTOSAVE_QUIET_MS,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Called after every keystroke, once the buffer holds the new
    /// value. (Re-)arms the note's timer from now.
    pub fn note_edited(&self, note_id: &str) {
        if note_id.trim().is_empty() {
            return;
        }
        let Some(win) = web_sys::window() else {
            return;
        };

        if let Ok(mut map) = self.timers.lock() {
            if let Some(tid) = map.remove(note_id) {
                let _ = win.clear_timeout_with_handle(tid);
            }
        }

        let s2 = self.clone();
        let id2 = note_id.to_string();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            s2.flush(id2);
        });

        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                self.quiet_ms,
            )
            .unwrap_or(0);

        if let Ok(mut map) = self.timers.lock() {
            map.insert(note_id.to_string(), tid);
        }
    }

    /// Pure local operation, no network side effect. Used when the note
    /// is switched/closed and when an explicit Update or Delete bypasses
    /// the debounce (so the explicit write never races a stale timer).
    pub fn cancel(&self, note_id: &str) {
        let Some(win) = web_sys::window() else {
            return;
        };
        if let Ok(mut map) = self.timers.lock() {
            if let Some(tid) = map.remove(note_id) {
                let _ = win.clear_timeout_with_handle(tid);
            }
        }
    }

    pub fn cancel_all(&self) {
        let Some(win) = web_sys::window() else {
            return;
        };
        if let Ok(mut map) = self.timers.lock() {
            for (_, tid) in map.drain() {
                let _ = win.clear_timeout_with_handle(tid);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.timers.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn flush(&self, note_id: String) {
        // The timer fired; its slot is spent.
        if let Ok(mut map) = self.timers.lock() {
            map.remove(&note_id);
        }

        // Source of truth is the buffer as of now, not as of the
        // keystroke that armed the timer.
        let Some(buf) = self.app.buffer.get_untracked() else {
            return;
        };
        if buf.note_id != note_id || !buf.dirty {
            return;
        }

        let title = buf.title.clone();
        let content = buf.content.clone();
        let app = self.app.clone();

        spawn_local(async move {
            match app.api_client.update_note(&note_id, &title, &content).await {
                Ok(()) => {
                    let note = Note::new(note_id.clone(), title.clone(), content.clone());
                    app.apply(CollectionAction::Updated(note.clone()));
                    app.buffer
                        .update(|b| confirm_saved(b, &note_id, &title, &content));
                    // Convergence hint for other clients; best-effort.
                    app.channel.send(&BroadcastMessage::NoteUpdate { note });
                    app.notify_success("Auto-saved");
                }
                Err(e) => {
                    // Buffer stays dirty; continued user activity (next
                    // keystroke or explicit Update) retries with the
                    // latest content, not this failed snapshot.
                    app.notify_error(format!("Auto-save failed: {e}"));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Note {
        Note::new("n1", "T", "C")
    }

    #[test]
    fn test_open_buffer_starts_clean() {
        let buf = EditBuffer::open(&note());
        assert_eq!(buf.note_id, "n1");
        assert_eq!(buf.title, "T");
        assert_eq!(buf.content, "C");
        assert!(!buf.dirty);
    }

    #[test]
    fn test_edits_mark_dirty_and_overwrite_in_order() {
        let mut buf = EditBuffer::open(&note());

        buf.edit_content("C1");
        assert!(buf.dirty);

        buf.edit_content("C2");
        buf.edit_title("T2");
        assert_eq!(buf.content, "C2");
        assert_eq!(buf.title, "T2");
    }

    #[test]
    fn test_confirm_saved_clears_dirty_on_exact_match() {
        let mut buffer = Some(EditBuffer::open(&note()));
        buffer.as_mut().unwrap().edit_content("C2");

        confirm_saved(&mut buffer, "n1", "T", "C2");
        assert!(!buffer.unwrap().dirty);
    }

    #[test]
    fn test_confirm_saved_keeps_dirty_if_user_typed_in_flight() {
        let mut buffer = Some(EditBuffer::open(&note()));
        buffer.as_mut().unwrap().edit_content("C2");
        // Save of "C2" went out; meanwhile the user typed more.
        buffer.as_mut().unwrap().edit_content("C3");

        confirm_saved(&mut buffer, "n1", "T", "C2");
        let buf = buffer.unwrap();
        assert!(buf.dirty);
        assert_eq!(buf.content, "C3");
    }

    #[test]
    fn test_confirm_saved_ignores_other_note() {
        // A save completing for note A must not touch a buffer that has
        // since been opened on note B.
        let mut buffer = Some(EditBuffer::open(&Note::new("n2", "X", "Y")));
        buffer.as_mut().unwrap().edit_content("Y2");

        confirm_saved(&mut buffer, "n1", "T", "C2");
        assert!(buffer.unwrap().dirty);
    }

    #[test]
    fn test_confirm_saved_with_no_buffer_is_noop() {
        let mut buffer: Option<EditBuffer> = None;
        confirm_saved(&mut buffer, "n1", "T", "C");
        assert!(buffer.is_none());
    }
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::state::AppState;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    // A burst of keystrokes must collapse into one pending timer per
    // note: each edit clears the previous timer before re-arming, so
    // at most one save can fire per quiet window.
    #[wasm_bindgen_test]
    fn test_rapid_edits_keep_a_single_pending_timer_per_note() {
        let controller = AutosaveController::new(AppState::new());

        controller.note_edited("n1");
        controller.note_edited("n1");
        controller.note_edited("n1");
        assert_eq!(controller.pending_count(), 1);

        controller.note_edited("n2");
        assert_eq!(controller.pending_count(), 2);

        controller.cancel("n1");
        assert_eq!(controller.pending_count(), 1);

        controller.cancel_all();
        assert_eq!(controller.pending_count(), 0);
    }

    #[wasm_bindgen_test]
    fn test_cancel_of_unknown_note_is_noop() {
        let controller = AutosaveController::new(AppState::new());

        controller.note_edited("n1");
        controller.cancel("nx");
        assert_eq!(controller.pending_count(), 1);

        controller.cancel_all();
    }
}
