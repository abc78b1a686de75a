use crate::models::{BroadcastMessage, Note};
use leptos::logging::{error, log, warn};
use leptos::prelude::*;
use std::sync::{Arc, Mutex};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

type Handler<T> = Mutex<Option<Box<dyn Fn(T) + Send + Sync>>>;

/// Typed dispatch table for inbound broadcast frames: one registration
/// slot per message variant, so the reconciler and the presence
/// indicator each own their concern. Registering a handler for a
/// variant replaces the previous one for that variant only.
#[derive(Default)]
pub(crate) struct MessageRouter {
    note_create: Handler<Note>,
    note_update: Handler<Note>,
    note_delete: Handler<String>,
    user_joined: Handler<String>,
    user_left: Handler<String>,
}

impl MessageRouter {
    pub fn on_note_create(&self, f: impl Fn(Note) + Send + Sync + 'static) {
        Self::install(&self.note_create, f);
    }

    pub fn on_note_update(&self, f: impl Fn(Note) + Send + Sync + 'static) {
        Self::install(&self.note_update, f);
    }

    pub fn on_note_delete(&self, f: impl Fn(String) + Send + Sync + 'static) {
        Self::install(&self.note_delete, f);
    }

    pub fn on_user_joined(&self, f: impl Fn(String) + Send + Sync + 'static) {
        Self::install(&self.user_joined, f);
    }

    pub fn on_user_left(&self, f: impl Fn(String) + Send + Sync + 'static) {
        Self::install(&self.user_left, f);
    }

    /// A frame for a variant with no registered handler is dropped.
    pub fn route(&self, msg: BroadcastMessage) {
        match msg {
            BroadcastMessage::NoteCreate { note } => Self::call(&self.note_create, note),
            BroadcastMessage::NoteUpdate { note } => Self::call(&self.note_update, note),
            BroadcastMessage::NoteDelete { note_id } => Self::call(&self.note_delete, note_id),
            BroadcastMessage::UserJoined { user } => Self::call(&self.user_joined, user),
            BroadcastMessage::UserLeft { user } => Self::call(&self.user_left, user),
        }
    }

    fn install<T>(slot: &Handler<T>, f: impl Fn(T) + Send + Sync + 'static) {
        if let Ok(mut guard) = slot.lock() {
            *guard = Some(Box::new(f));
        }
    }

    fn call<T>(slot: &Handler<T>, payload: T) {
        if let Ok(guard) = slot.lock() {
            if let Some(f) = guard.as_ref() {
                f(payload);
            }
        }
    }
}

struct ChannelState {
    socket: Option<WebSocket>,
    // Keep JS callbacks alive for the lifetime of the socket.
    _onopen: Option<Closure<dyn FnMut()>>,
    _onmessage: Option<Closure<dyn FnMut(MessageEvent)>>,
    _onerror: Option<Closure<dyn FnMut(ErrorEvent)>>,
    _onclose: Option<Closure<dyn FnMut(CloseEvent)>>,
}

impl ChannelState {
    fn empty() -> Self {
        Self {
            socket: None,
            _onopen: None,
            _onmessage: None,
            _onerror: None,
            _onclose: None,
        }
    }
}

/// One logical connection to the broadcast relay, identified by the
/// relay URL plus the display name as a query parameter.
///
/// Owned by `AppState` and injected through context; there is no
/// module-level instance. The socket and its JS callbacks are not
/// thread-safe, so they live in a local-storage slot while the client
/// handle itself stays context-friendly. Delivery is best-effort:
/// `send` on a closed channel logs and drops the message, and
/// reconnection is the owning app's policy, not this client's.
#[derive(Clone)]
pub(crate) struct ChannelClient {
    username: String,
    url: String,
    state: StoredValue<ChannelState, LocalStorage>,
    router: Arc<MessageRouter>,
}

impl ChannelClient {
    pub fn new(username: &str, ws_url: &str) -> Self {
        let url = format!("{}?username={}", ws_url, urlencoding::encode(username));

        Self {
            username: username.to_string(),
            url,
            state: StoredValue::new_local(ChannelState::empty()),
            router: Arc::new(MessageRouter::default()),
        }
    }

    pub fn router(&self) -> Arc<MessageRouter> {
        Arc::clone(&self.router)
    }

    #[cfg(test)]
    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.state.with_value(|st| {
            st.socket
                .as_ref()
                .map(|s| s.ready_state() == WebSocket::OPEN)
                .unwrap_or(false)
        })
    }

    /// Idempotent: a call while connecting or connected is a no-op.
    pub fn connect(&self) {
        let busy = self.state.with_value(|st| {
            st.socket
                .as_ref()
                .map(|s| {
                    let rs = s.ready_state();
                    rs == WebSocket::CONNECTING || rs == WebSocket::OPEN
                })
                .unwrap_or(false)
        });
        if busy {
            return;
        }

        let sock = match WebSocket::new(&self.url) {
            Ok(s) => s,
            Err(e) => {
                error!("broadcast channel connect failed: {e:?}");
                return;
            }
        };

        let username = self.username.clone();
        let onopen = Closure::<dyn FnMut()>::new(move || {
            log!("broadcast channel connected as {username}");
        });
        sock.set_onopen(Some(onopen.as_ref().unchecked_ref()));

        let router = Arc::clone(&self.router);
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
            let Some(raw) = ev.data().as_string() else {
                return;
            };
            match BroadcastMessage::decode(&raw) {
                Some(msg) => router.route(msg),
                None => warn!("dropping undecodable broadcast frame: {raw}"),
            }
        });
        sock.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        let onerror = Closure::<dyn FnMut(ErrorEvent)>::new(move |ev: ErrorEvent| {
            error!("broadcast channel error: {}", ev.message());
        });
        sock.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        // Unexpected closure is logged, never retried here.
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |ev: CloseEvent| {
            log!("broadcast channel closed (code {})", ev.code());
        });
        sock.set_onclose(Some(onclose.as_ref().unchecked_ref()));

        self.state.update_value(|st| {
            st.socket = Some(sock);
            st._onopen = Some(onopen);
            st._onmessage = Some(onmessage);
            st._onerror = Some(onerror);
            st._onclose = Some(onclose);
        });
    }

    /// At-most-once, fire-and-forget. The durable write has already
    /// succeeded or failed on its own; a lost announcement only delays
    /// convergence on other clients.
    pub fn send(&self, msg: &BroadcastMessage) {
        let sock = self.state.with_value(|st| st.socket.clone());
        let open = sock
            .as_ref()
            .map(|s| s.ready_state() == WebSocket::OPEN)
            .unwrap_or(false);

        if !open {
            warn!("cannot send broadcast message: channel is not open");
            return;
        }

        let Some(raw) = msg.encode() else {
            return;
        };

        if let Some(sock) = sock {
            if let Err(e) = sock.send_with_str(&raw) {
                warn!("broadcast send failed: {e:?}");
            }
        }
    }

    pub fn disconnect(&self) {
        self.state.update_value(|st| {
            if let Some(sock) = st.socket.take() {
                // Detach callbacks first so a late event cannot fire
                // into closures we are about to drop.
                sock.set_onopen(None);
                sock.set_onmessage(None);
                sock.set_onerror(None);
                sock.set_onclose(None);
                let _ = sock.close();
            }
            *st = ChannelState::empty();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_router_dispatches_by_variant() {
        let router = MessageRouter::default();

        let updates: Arc<Mutex<Vec<Note>>> = Arc::new(Mutex::new(vec![]));
        let deletes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![]));

        let u = Arc::clone(&updates);
        router.on_note_update(move |n| u.lock().unwrap().push(n));
        let d = Arc::clone(&deletes);
        router.on_note_delete(move |id| d.lock().unwrap().push(id));

        router.route(BroadcastMessage::NoteUpdate {
            note: Note::new("n1", "T", "C"),
        });
        router.route(BroadcastMessage::NoteDelete {
            note_id: "n2".to_string(),
        });
        // No handler registered for this variant: dropped, not an error.
        router.route(BroadcastMessage::UserJoined {
            user: "Guest-1".to_string(),
        });

        assert_eq!(updates.lock().unwrap().len(), 1);
        assert_eq!(updates.lock().unwrap()[0].id, "n1");
        assert_eq!(deletes.lock().unwrap().as_slice(), ["n2".to_string()]);
    }

    #[test]
    fn test_router_registration_replaces_per_variant_only() {
        let router = MessageRouter::default();

        let hits: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(vec![]));

        let h = Arc::clone(&hits);
        router.on_user_joined(move |_| h.lock().unwrap().push("first"));
        let h = Arc::clone(&hits);
        router.on_user_joined(move |_| h.lock().unwrap().push("second"));
        let h = Arc::clone(&hits);
        router.on_user_left(move |_| h.lock().unwrap().push("left"));

        router.route(BroadcastMessage::UserJoined {
            user: "u".to_string(),
        });
        router.route(BroadcastMessage::UserLeft {
            user: "u".to_string(),
        });

        assert_eq!(hits.lock().unwrap().as_slice(), ["second", "left"]);
    }

    #[test]
    fn test_channel_url_encodes_username() {
        let client = ChannelClient::new("Guest 1&co", "ws://localhost:8000/ws");
        assert_eq!(
            client.url(),
            "ws://localhost:8000/ws?username=Guest%201%26co"
        );
        // Never dialed, so the channel reports closed.
        assert!(!client.is_open());
    }

    #[test]
    fn test_router_handles_are_shared_across_clones() {
        let client = ChannelClient::new("Guest-1", "ws://localhost:8000/ws");
        let cloned = client.clone();

        let hits: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        client.router().on_user_joined(move |_| *h.lock().unwrap() += 1);

        cloned.router().route(BroadcastMessage::UserJoined {
            user: "u".to_string(),
        });
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
