use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_FROM_NAME: &str = "Someone";

/// Body of a created `hireRequests` document.
///
/// Only the fields the notifier reads are modelled; anything else on the
/// document is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HireRequest {
    #[serde(default, deserialize_with = "non_empty")]
    pub to_user_id: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub from_name: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub from_company: Option<String>,
}

impl HireRequest {
    /// Sender display name, `"Someone"` when absent or blank.
    pub fn sender_name(&self) -> &str {
        present(&self.from_name).unwrap_or(DEFAULT_FROM_NAME)
    }

    /// Sender company, empty when absent.
    pub fn sender_company(&self) -> &str {
        present(&self.from_company).unwrap_or_default()
    }

    pub fn recipient(&self) -> Option<&str> {
        present(&self.to_user_id)
    }
}

/// One document-creation occurrence, as handed to the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct HireRequestEvent {
    pub request_id: String,
    /// `None` when the document was gone before the event was processed.
    pub data: Option<HireRequest>,
}

impl HireRequestEvent {
    pub fn new(request_id: impl Into<String>, data: Option<HireRequest>) -> Self {
        Self {
            request_id: request_id.into(),
            data,
        }
    }
}

/// Partial view of a `users` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "non_empty")]
    pub fcm_token: Option<String>,
}

impl UserProfile {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            fcm_token: Some(token.into()),
        }
    }

    pub fn push_token(&self) -> Option<&str> {
        present(&self.fcm_token)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    Other(IgnoredAny),
}

// Absent, null and "" all decode to None. Numbers and booleans keep their
// text; objects, arrays and other BSON types decode to None instead of
// failing the whole document.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => Some(s),
        Some(Loose::Integer(n)) => Some(n.to_string()),
        Some(Loose::Float(n)) => Some(n.to_string()),
        Some(Loose::Flag(b)) => Some(b.to_string()),
        Some(Loose::Other(_)) | None => None,
    };
    Ok(text.filter(|s| !s.is_empty()))
}
