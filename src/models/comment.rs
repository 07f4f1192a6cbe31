// Comment model - the persisted record, its write payload and moderation result

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Author recorded when the caller does not name one.
pub const ANONYMOUS_AUTHOR: &str = "anonymous";

/// Status reported by a successful moderation call.
pub const SOFT_DELETED_STATUS: &str = "soft-deleted";

/// Strongly-typed comment id, rendered as a decimal string on the wire so
/// clients never lose precision on 64-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentId(i64);

impl CommentId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Parse an externally supplied id. Only the canonical rendering is
    /// accepted, so `"+42"` or `"042"` never alias comment `42`.
    pub fn parse(raw: &str) -> Option<Self> {
        let id: i64 = raw.parse().ok()?;
        if id <= 0 || id.to_string() != raw {
            return None;
        }
        Some(Self(id))
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Moderation state of a comment. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentState {
    #[default]
    Active,
    Removed,
}

impl CommentState {
    /// Storage may hold records written without the flag; those are active.
    pub fn from_removed_flag(removed: Option<bool>) -> Self {
        match removed {
            Some(true) => CommentState::Removed,
            _ => CommentState::Active,
        }
    }

    pub fn is_removed(self) -> bool {
        self == CommentState::Removed
    }
}

fn serialize_state<S: Serializer>(state: &CommentState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(state.is_removed())
}

/// Public shape: `{id, url, author, text, removed, parentId?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub url: String,
    pub author: String,
    pub text: String,
    #[serde(rename = "removed", serialize_with = "serialize_state")]
    pub state: CommentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip)]
    pub created_at: i64,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Body of `POST /api/comments`. Every field is optional at the wire level so
/// missing values surface as validation errors rather than parse failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCommentRequest {
    pub url: Option<String>,
    pub text: Option<String>,
    #[serde(alias = "user", default, deserialize_with = "scalar_as_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub parent_id: Option<String>,
}

/// Accept a string, number or boolean and keep its textual form; `null`
/// reads as absent.
fn scalar_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

/// A validated comment ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub url: String,
    pub author: String,
    pub text: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationOutcome {
    pub status: &'static str,
    pub id: CommentId,
}

impl ModerationOutcome {
    pub fn soft_deleted(id: CommentId) -> Self {
        Self {
            status: SOFT_DELETED_STATUS,
            id,
        }
    }
}
