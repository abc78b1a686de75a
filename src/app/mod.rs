use crate::editor::AutosaveController;
use crate::models::BroadcastMessage;
use crate::pages::NotesPage;
use crate::state::reconciler::ReconcileEffect;
use crate::state::{AppContext, AppState};
use leptos::ev;
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// Free-tier backends idle out; ping often enough to stay warm.
const KEEPALIVE_INTERVAL_MS: i32 = 14_000;

/// Points every broadcast variant at its consumer: note traffic goes
/// through the reconciler, presence traffic updates the avatar row.
fn register_sync_handlers(state: &AppState, autosave: &AutosaveController) {
    let router = state.channel.router();

    let s = state.clone();
    router.on_note_create(move |note| {
        s.apply_remote(BroadcastMessage::NoteCreate { note });
    });

    let s = state.clone();
    router.on_note_update(move |note| {
        s.apply_remote(BroadcastMessage::NoteUpdate { note });
    });

    let s = state.clone();
    let auto = autosave.clone();
    router.on_note_delete(move |note_id| {
        let effect = s.apply_remote(BroadcastMessage::NoteDelete {
            note_id: note_id.clone(),
        });
        if effect == ReconcileEffect::ActiveNoteDeleted {
            // Any pending autosave for it would write to a dead id.
            auto.cancel(&note_id);
            s.notify_error("The note you were editing was deleted by another user");
        }
    });

    let s = state.clone();
    router.on_user_joined(move |user| s.user_joined(user));

    let s = state.clone();
    router.on_user_left(move |user| s.user_left(&user));
}

/// Renders nothing; pings the gateway health endpoint on an interval so
/// the hosting platform does not put the backend to sleep mid-session.
#[component]
fn KeepBackendAlive() -> impl IntoView {
    let app = expect_context::<AppContext>().0;

    let Some(win) = web_sys::window() else {
        return;
    };

    let api = app.api_client.clone();
    let cb = Closure::<dyn FnMut()>::new(move || {
        let api = api.clone();
        spawn_local(async move {
            match api.ping_health().await {
                Ok(body) => log!("keep-alive ping ok: {body}"),
                Err(e) => warn!("keep-alive ping failed: {e}"),
            }
        });
    });

    let tid = win
        .set_interval_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            KEEPALIVE_INTERVAL_MS,
        )
        .unwrap_or(0);
    // The closure must outlive the interval; the interval itself is
    // cleared on unmount.
    cb.forget();

    on_cleanup(move || {
        if let Some(win) = web_sys::window() {
            win.clear_interval_with_handle(tid);
        }
    });
}

#[component]
pub fn App() -> impl IntoView {
    let state = AppState::new();
    let autosave = AutosaveController::new(state.clone());

    register_sync_handlers(&state, &autosave);
    state.channel.connect();

    // Reconnection is app policy, not the channel client's: when the
    // browser regains connectivity, dial again (no-op if still open).
    let chan = state.channel.clone();
    let online_handle = window_event_listener(ev::online, move |_ev: web_sys::Event| {
        chan.connect();
    });

    let chan = state.channel.clone();
    let auto = autosave.clone();
    on_cleanup(move || {
        online_handle.remove();
        auto.cancel_all();
        chan.disconnect();
    });

    provide_context(AppContext(state));
    provide_context(autosave);

    view! {
        <Router>
            <KeepBackendAlive />
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("") view=NotesPage />
            </Routes>
        </Router>
    }
}
