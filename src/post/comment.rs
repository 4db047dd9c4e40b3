use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::author::{non_blank, summarize, AuthorRef, UserSummary};

pub const MISSING_COMMENT: &str = "Comment details not found";
pub const MISSING_CONTENT: &str = "No content available";

/// A comment that is always safe to render.
///
/// Deserialization goes through [`RawComment`], so a comment that arrives as
/// a bare id or with holes in it comes out complete.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(from = "RawComment", rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub author: UserSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RawComment {
    Id(String),
    Fields(CommentFields),
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentFields {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        match raw {
            RawComment::Id(id) => Comment {
                id,
                content: MISSING_COMMENT.to_string(),
                author: UserSummary::placeholder(None),
                created_at: Utc::now(),
            },
            RawComment::Fields(fields) => Comment {
                id: fields.id.unwrap_or_else(temporary_id),
                content: non_blank(&fields.content)
                    .unwrap_or(MISSING_CONTENT)
                    .to_string(),
                author: summarize(fields.author.as_ref()),
                created_at: fields.created_at.unwrap_or_else(Utc::now),
            },
        }
    }
}

fn temporary_id() -> String {
    format!("temp-{}", Uuid::new_v4())
}

/// Reads every entry it can and skips the rest.
pub fn from_entries(entries: Vec<Value>) -> Vec<Comment> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Comment>(entry) {
            Ok(comment) => Some(comment),
            Err(e) => {
                warn!("Skipping unreadable comment: {}", e);
                None
            }
        })
        .collect()
}

/// For comment lists embedded in a post. Anything but an array is empty.
pub(crate) fn lenient<'de, D>(deserializer: D) -> Result<Vec<Comment>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => Ok(from_entries(entries)),
        _ => Ok(vec![]),
    }
}
