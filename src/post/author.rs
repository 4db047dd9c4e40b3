use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown User";
pub const UNKNOWN_USERNAME: &str = "unknown";
pub const DEFAULT_PHOTO: &str = "/assets/user_image.png";

/// A display-ready author. Always has a name, username and photo.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub name: String,
    pub username: String,
    pub photo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl UserSummary {
    pub fn placeholder(id: Option<String>) -> Self {
        Self {
            id,
            name: UNKNOWN_NAME.to_string(),
            username: UNKNOWN_USERNAME.to_string(),
            photo: DEFAULT_PHOTO.to_string(),
            bio: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name == UNKNOWN_NAME && self.username == UNKNOWN_USERNAME
    }
}

/// Author fields as the server sends them; any of them may be missing.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorFields {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl AuthorFields {
    /// Fields present in `newer` win.
    pub fn overlay(self, newer: AuthorFields) -> AuthorFields {
        AuthorFields {
            id: newer.id.or(self.id),
            name: newer.name.or(self.name),
            username: newer.username.or(self.username),
            photo: newer.photo.or(self.photo),
            profile_picture: newer.profile_picture.or(self.profile_picture),
            bio: newer.bio.or(self.bio),
        }
    }
}

impl From<UserSummary> for AuthorFields {
    fn from(user: UserSummary) -> Self {
        AuthorFields {
            id: user.id,
            name: Some(user.name),
            username: Some(user.username),
            photo: Some(user.photo),
            profile_picture: None,
            bio: user.bio,
        }
    }
}

/// An author that is either populated or only referenced by id.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AuthorRef {
    Unresolved(String),
    Resolved(AuthorFields),
}

impl AuthorRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            AuthorRef::Unresolved(id) => Some(id),
            AuthorRef::Resolved(fields) => fields.id.as_deref(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        match self {
            AuthorRef::Unresolved(id) => UserSummary::placeholder(Some(id.clone())),
            AuthorRef::Resolved(fields) => {
                let name = non_blank(&fields.name)
                    .or_else(|| non_blank(&fields.username))
                    .unwrap_or(UNKNOWN_NAME);
                let username = non_blank(&fields.username).unwrap_or(UNKNOWN_USERNAME);
                let photo = non_blank(&fields.photo)
                    .or_else(|| non_blank(&fields.profile_picture))
                    .unwrap_or(DEFAULT_PHOTO);
                UserSummary {
                    id: fields.id.clone(),
                    name: name.to_string(),
                    username: username.to_string(),
                    photo: photo.to_string(),
                    bio: non_blank(&fields.bio).map(str::to_string),
                }
            }
        }
    }
}

impl From<UserSummary> for AuthorRef {
    fn from(user: UserSummary) -> Self {
        AuthorRef::Resolved(user.into())
    }
}

/// Normalizes an optional author reference; a missing author is a placeholder.
pub fn summarize(author: Option<&AuthorRef>) -> UserSummary {
    author
        .map(AuthorRef::summary)
        .unwrap_or_else(|| UserSummary::placeholder(None))
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
