use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request payload for `POST /api/update-content`.
///
/// Both fields are optional at the wire level so the server can answer a
/// missing field with its own validation envelope instead of a bare
/// deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContentRequest {
    pub section: Option<String>,
    /// Field key to value. List sections carry their blocks under `items`.
    pub content: Option<Map<String, Value>>,
}
