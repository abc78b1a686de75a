use leptos::logging::warn;

pub(crate) const USERNAME_KEY: &str = "collabnotes_username";

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub(crate) fn load_string(key: &str) -> Option<String> {
    local_storage().and_then(|s| s.get_item(key).ok().flatten())
}

pub(crate) fn save_string(key: &str, value: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(key, value);
    }
}

#[allow(dead_code)]
pub(crate) fn remove_key(key: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(key);
    }
}

/// The per-browser guest display name: generated once, persisted, and
/// reused across sessions. Opaque to the rest of the system.
pub(crate) fn guest_username() -> String {
    if let Some(stored) = load_string(USERNAME_KEY) {
        if !stored.trim().is_empty() {
            return stored;
        }
    }

    let name = format_guest_name(random_guest_suffix());
    save_string(USERNAME_KEY, &name);
    name
}

fn random_guest_suffix() -> u16 {
    let mut buf = [0u8; 2];
    if let Err(e) = getrandom::getrandom(&mut buf) {
        warn!("getrandom failed, falling back to 0: {e}");
        return 0;
    }
    u16::from_le_bytes(buf) % 1000
}

fn format_guest_name(suffix: u16) -> String {
    format!("Guest-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_guest_name() {
        assert_eq!(format_guest_name(0), "Guest-0");
        assert_eq!(format_guest_name(999), "Guest-999");
    }

    #[test]
    fn test_random_guest_suffix_in_range() {
        for _ in 0..50 {
            assert!(random_guest_suffix() < 1000);
        }
    }
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_guest_username_persists_across_calls() {
        remove_key(USERNAME_KEY);

        let first = guest_username();
        assert!(first.starts_with("Guest-"));

        let second = guest_username();
        assert_eq!(first, second);

        remove_key(USERNAME_KEY);
    }

    #[wasm_bindgen_test]
    fn test_string_storage_round_trip() {
        save_string("collabnotes_test_key", "v1");
        assert_eq!(load_string("collabnotes_test_key").as_deref(), Some("v1"));
        remove_key("collabnotes_test_key");
        assert!(load_string("collabnotes_test_key").is_none());
    }
}
