use serde::{Deserialize, Serialize};

/// A note as stored by the backend. `id` is server-assigned and is the
/// sole identity; title/content are mutable payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Note {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Messages pushed over the broadcast channel.
///
/// Wire contract (shared with the backend relay): a JSON object tagged
/// by `type`, e.g. `{"type":"note_update","note":{...}}`. Every note
/// message carries the full replacement value, never a delta, so the
/// channel tolerates reordering.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum BroadcastMessage {
    NoteCreate {
        note: Note,
    },
    NoteUpdate {
        note: Note,
    },
    NoteDelete {
        #[serde(rename = "noteId")]
        note_id: String,
    },
    UserJoined {
        user: String,
    },
    UserLeft {
        user: String,
    },
}

impl BroadcastMessage {
    /// Decode an inbound frame. Returns None on anything we do not
    /// understand; unknown frames are dropped by the router, not raised.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_update_wire_contract() {
        let msg = BroadcastMessage::NoteUpdate {
            note: Note::new("n1", "T2", "C2"),
        };
        let v = serde_json::to_value(&msg).expect("should serialize");
        assert_eq!(v["type"], "note_update");
        assert_eq!(v["note"]["id"], "n1");
        assert_eq!(v["note"]["title"], "T2");
        assert_eq!(v["note"]["content"], "C2");
    }

    #[test]
    fn test_note_delete_uses_camel_case_note_id() {
        let msg = BroadcastMessage::NoteDelete {
            note_id: "n1".to_string(),
        };
        let v = serde_json::to_value(&msg).expect("should serialize");
        assert_eq!(v["type"], "note_delete");
        assert_eq!(v["noteId"], "n1");
    }

    #[test]
    fn test_decode_presence_messages() {
        let joined = BroadcastMessage::decode(r#"{"type":"user_joined","user":"Guest-7"}"#)
            .expect("should decode");
        assert_eq!(
            joined,
            BroadcastMessage::UserJoined {
                user: "Guest-7".to_string()
            }
        );

        let left = BroadcastMessage::decode(r#"{"type":"user_left","user":"Guest-7"}"#)
            .expect("should decode");
        assert_eq!(
            left,
            BroadcastMessage::UserLeft {
                user: "Guest-7".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_garbage() {
        assert!(BroadcastMessage::decode(r#"{"type":"cursor_moved","x":1}"#).is_none());
        assert!(BroadcastMessage::decode("not json").is_none());
        assert!(BroadcastMessage::decode(r#"{"type":"note_update"}"#).is_none());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let msg = BroadcastMessage::NoteCreate {
            note: Note::new("n9", "title", "content"),
        };
        let raw = msg.encode().expect("should encode");
        assert_eq!(BroadcastMessage::decode(&raw), Some(msg));
    }
}
