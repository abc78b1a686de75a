use crate::models::Note;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ApiErrorKind {
    /// Rejected before any network call (empty title/content).
    Validation,
    /// The referenced note id no longer exists.
    NotFound,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn not_found(note_id: &str) -> Self {
        Self {
            kind: ApiErrorKind::NotFound,
            message: format!("Note {note_id} does not exist"),
        }
    }

    fn http(message: String) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message,
        }
    }

    fn validation(message: &str) -> Self {
        Self {
            kind: ApiErrorKind::Validation,
            message: message.to_string(),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Caller-side validation for note creation. The gateway itself never
/// rejects payloads; UI actions call this before any round trip.
pub(crate) fn validate_note_fields(title: &str, content: &str) -> ApiResult<()> {
    if title.trim().is_empty() {
        return Err(ApiError::validation("Title must not be empty"));
    }
    if content.trim().is_empty() {
        return Err(ApiError::validation("Content must not be empty"));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub(crate) struct EnvConfig {
    pub api_url: String,
    pub ws_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let mut cfg = Self {
            api_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws".to_string(),
        };

        // Deployment injects `window.ENV = { API_URL, WS_URL }`.
        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"API_URL".into()) {
                        if let Some(url) = api_url.as_string() {
                            cfg.api_url = url.trim_end_matches('/').to_string();
                        }
                    }
                    if let Ok(ws_url) = js_sys::Reflect::get(&env, &"WS_URL".into()) {
                        if let Some(url) = ws_url.as_string() {
                            cfg.ws_url = url.trim_end_matches('/').to_string();
                        }
                    }
                }
            }
        }

        cfg
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

// The backend exposes the notes collection as five GraphQL operations.
const GET_NOTES: &str = "query { notes { id title content } }";
const GET_NOTE_BY_ID: &str =
    "query GetNoteById($noteId: String!) { noteById(noteId: $noteId) { id title content } }";
const ADD_NOTE: &str = "mutation AddNote($title: String!, $content: String!) { addNote(title: $title, content: $content) { id title content } }";
const UPDATE_NOTE: &str = "mutation UpdateNote($noteId: String!, $title: String!, $content: String!) { updateNote(noteId: $noteId, title: $title, content: $content) }";
const DELETE_NOTE: &str = "mutation DeleteNote($noteId: String!) { deleteNote(noteId: $noteId) }";

pub(crate) fn graphql_body(query: &str, variables: Value) -> Value {
    json!({ "query": query, "variables": variables })
}

/// Unwrap a GraphQL response envelope. A non-empty `errors` array wins
/// over any partial `data`.
pub(crate) fn extract_data(resp: Value) -> ApiResult<Value> {
    if let Some(errors) = resp.get("errors").and_then(|v| v.as_array()) {
        if !errors.is_empty() {
            let message = errors[0]
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("GraphQL request failed")
                .to_string();
            return Err(ApiError::http(message));
        }
    }

    match resp.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(ApiError::parse("GraphQL response is missing data")),
    }
}

pub(crate) fn note_from_value(v: &Value) -> Option<Note> {
    let get_s = |k: &str| v.get(k).and_then(|x| x.as_str()).map(|s| s.to_string());

    let id = get_s("id")?;
    if id.trim().is_empty() {
        return None;
    }

    Some(Note {
        id,
        title: get_s("title").unwrap_or_default(),
        content: get_s("content").unwrap_or_default(),
    })
}

pub(crate) fn parse_note_list(data: &Value) -> Vec<Note> {
    data.get("notes")
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter_map(note_from_value).collect())
        .unwrap_or_default()
}

/// Stateless request/response wrapper around the notes collection.
/// One call is one round trip; callers own caching via CollectionState.
#[derive(Clone)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }

    async fn request_graphql(&self, query: &str, variables: Value) -> ApiResult<Value> {
        let client = reqwest::Client::new();
        let url = format!("{}/graphql", self.base_url);

        let res = client
            .post(url)
            .json(&graphql_body(query, variables))
            .send()
            .await
            .map_err(ApiError::network)?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::http(format!("Request failed ({status}): {body}")));
        }

        let resp: Value = res.json().await.map_err(ApiError::parse)?;
        extract_data(resp)
    }

    pub async fn list_notes(&self) -> ApiResult<Vec<Note>> {
        let data = self.request_graphql(GET_NOTES, json!({})).await?;
        Ok(parse_note_list(&data))
    }

    pub async fn get_note(&self, note_id: &str) -> ApiResult<Note> {
        let data = self
            .request_graphql(GET_NOTE_BY_ID, json!({ "noteId": note_id }))
            .await?;

        match data.get("noteById") {
            Some(v) if !v.is_null() => {
                note_from_value(v).ok_or_else(|| ApiError::parse("Malformed note in response"))
            }
            _ => Err(ApiError::not_found(note_id)),
        }
    }

    /// The server assigns the id; title/content are echoed back.
    pub async fn create_note(&self, title: &str, content: &str) -> ApiResult<Note> {
        let data = self
            .request_graphql(ADD_NOTE, json!({ "title": title, "content": content }))
            .await?;

        data.get("addNote")
            .and_then(note_from_value)
            .ok_or_else(|| ApiError::parse("Create succeeded but response is missing the note"))
    }

    pub async fn update_note(&self, note_id: &str, title: &str, content: &str) -> ApiResult<()> {
        let data = self
            .request_graphql(
                UPDATE_NOTE,
                json!({ "noteId": note_id, "title": title, "content": content }),
            )
            .await?;

        match data.get("updateNote").and_then(|v| v.as_bool()) {
            Some(true) => Ok(()),
            Some(false) => Err(ApiError::not_found(note_id)),
            None => Err(ApiError::parse("updateNote did not return a flag")),
        }
    }

    pub async fn delete_note(&self, note_id: &str) -> ApiResult<()> {
        let data = self
            .request_graphql(DELETE_NOTE, json!({ "noteId": note_id }))
            .await?;

        match data.get("deleteNote").and_then(|v| v.as_bool()) {
            Some(true) => Ok(()),
            Some(false) => Err(ApiError::not_found(note_id)),
            None => Err(ApiError::parse("deleteNote did not return a flag")),
        }
    }

    /// Liveness probe against the backing service; keeps free-tier
    /// hosting from idling out. Independent of the sync engine.
    pub async fn ping_health(&self) -> ApiResult<Value> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url);

        let res = client.get(url).send().await.map_err(ApiError::network)?;
        res.json().await.map_err(ApiError::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_body_shape() {
        let body = graphql_body(GET_NOTE_BY_ID, json!({ "noteId": "n1" }));
        assert_eq!(body["query"], GET_NOTE_BY_ID);
        assert_eq!(body["variables"]["noteId"], "n1");
    }

    #[test]
    fn test_extract_data_prefers_errors() {
        let resp = json!({
            "data": { "notes": [] },
            "errors": [{ "message": "boom" }]
        });
        let err = extract_data(resp).expect_err("errors array should fail the call");
        assert_eq!(err.kind, ApiErrorKind::Http);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_extract_data_missing_data_is_parse_error() {
        let err = extract_data(json!({})).expect_err("no data should fail");
        assert_eq!(err.kind, ApiErrorKind::Parse);
    }

    #[test]
    fn test_parse_note_list_skips_malformed_entries() {
        let data = json!({
            "notes": [
                { "id": "n1", "title": "T", "content": "C" },
                { "title": "no id" },
                { "id": "", "title": "blank id", "content": "x" },
                { "id": "n2", "title": "T2", "content": "C2" }
            ]
        });

        let notes = parse_note_list(&data);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], Note::new("n1", "T", "C"));
        assert_eq!(notes[1].id, "n2");
    }

    #[test]
    fn test_parse_note_list_tolerates_missing_field() {
        assert!(parse_note_list(&json!({})).is_empty());
    }

    #[test]
    fn test_validate_note_fields_rejects_blank_input() {
        let err = validate_note_fields("  ", "body").expect_err("blank title");
        assert_eq!(err.kind, ApiErrorKind::Validation);

        let err = validate_note_fields("title", "\n\t").expect_err("blank content");
        assert_eq!(err.kind, ApiErrorKind::Validation);

        assert!(validate_note_fields("title", "body").is_ok());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ApiErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ApiErrorKind::Validation.to_string(), "validation");
    }
}
