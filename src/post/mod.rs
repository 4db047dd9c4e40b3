pub mod author;
pub mod comment;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use author::{AuthorRef, UserSummary};
pub use comment::Comment;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub likes: LikeSet,
    #[serde(default, deserialize_with = "comment::lenient")]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn author_summary(&self) -> UserSummary {
        author::summarize(self.author.as_ref())
    }

    /// The image reference, if there is a usable one.
    pub fn image(&self) -> Option<&str> {
        author::non_blank(&self.image_url)
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.contains(user_id)
    }
}

/// User ids that liked a post. Insertion order is kept, duplicates never are.
///
/// Reads ids or populated users; `null` and unreadable entries are dropped.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "Option<Value>", into = "Vec<String>")]
pub struct LikeSet(Vec<String>);

impl LikeSet {
    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|id| id == user_id)
    }

    /// Returns `false` when the id was already present.
    pub fn insert(&mut self, user_id: &str) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.0.push(user_id.to_string());
        true
    }

    pub fn remove(&mut self, user_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|id| id != user_id);
        before != self.0.len()
    }

    /// Flips membership and returns whether the user now likes the post.
    pub fn toggle(&mut self, user_id: &str) -> bool {
        if self.remove(user_id) {
            false
        } else {
            self.insert(user_id)
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for LikeSet {
    fn from(ids: Vec<String>) -> Self {
        let mut set = LikeSet::default();
        for id in ids {
            set.insert(&id);
        }
        set
    }
}

impl From<Option<Value>> for LikeSet {
    fn from(value: Option<Value>) -> Self {
        let Some(Value::Array(entries)) = value else {
            return LikeSet::default();
        };
        let ids = entries.into_iter().filter_map(|entry| match entry {
            Value::String(id) => Some(id),
            Value::Object(mut user) => match user.remove("_id") {
                Some(Value::String(id)) => Some(id),
                _ => None,
            },
            _ => None,
        });
        LikeSet::from(ids.collect::<Vec<_>>())
    }
}

impl From<LikeSet> for Vec<String> {
    fn from(set: LikeSet) -> Self {
        set.0
    }
}

/// An image attached to a create or update request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostPayload {
    pub content: Option<String>,
    pub image: Option<ImageUpload>,
}

impl PostPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageUpload) -> Self {
        self.image = Some(image);
        self
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}
