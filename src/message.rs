use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::post::AuthorRef;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: AuthorRef,
    pub recipient: AuthorRef,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// The latest message of a conversation, populated or not.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageRef {
    Id(String),
    Message(Box<Message>),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<AuthorRef>,
    #[serde(default)]
    pub last_message: Option<MessageRef>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn includes(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id() == Some(user_id))
    }

    pub fn last_text(&self) -> Option<&str> {
        match self.last_message.as_ref()? {
            MessageRef::Message(message) => Some(&message.text),
            MessageRef::Id(_) => None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub message: Message,
    pub conversation: Conversation,
}
