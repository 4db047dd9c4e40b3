use std::sync::Arc;

use log::{debug, error};
use tokio::sync::Mutex;

use crate::{
    api::MessageApi,
    message::{Conversation, Message},
    notify::Notifier,
};

#[derive(Debug, Default)]
struct InboxState {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    unread: u64,
}

/// Conversations and the open message thread. Messages are append-only.
pub struct Inbox<A> {
    api: A,
    notifier: Arc<Notifier>,
    state: Mutex<InboxState>,
}

impl<A: MessageApi> Inbox<A> {
    pub fn new(api: A, notifier: Arc<Notifier>) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(InboxState::default()),
        }
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().await.conversations.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    pub async fn unread(&self) -> u64 {
        self.state.lock().await.unread
    }

    pub async fn fetch_conversations(&self) -> bool {
        match self.api.list_conversations().await {
            Ok(conversations) => {
                debug!("Fetched {} conversations", conversations.len());
                self.state.lock().await.conversations = conversations;
                true
            }
            Err(e) => {
                error!("Error fetching conversations: {}", e);
                false
            }
        }
    }

    /// Loads the thread with `user_id`, replacing the previous one.
    pub async fn fetch_messages(&self, user_id: &str) -> bool {
        match self.api.list_messages(user_id).await {
            Ok(messages) => {
                self.state.lock().await.messages = messages;
                true
            }
            Err(e) => {
                error!("Error fetching messages: {}", e);
                self.notifier.error("Failed to load messages");
                false
            }
        }
    }

    /// Sends a message, then moves its conversation up to date.
    pub async fn send_message(&self, recipient: &str, text: &str) -> bool {
        let sent = match self.api.send_message(recipient, text).await {
            Ok(sent) => sent,
            Err(e) => {
                error!("Send error: {}", e);
                let message = match e.status() {
                    Some(_) => e.user_message(),
                    None => "Failed to send message. Please try again.".to_string(),
                };
                self.notifier.error(message);
                return false;
            }
        };

        let mut state = self.state.lock().await;
        state.messages.push(sent.message);
        let existing = state
            .conversations
            .iter()
            .position(|conversation| conversation.includes(recipient));
        match existing {
            Some(index) => state.conversations[index] = sent.conversation,
            None => state.conversations.insert(0, sent.conversation),
        }
        true
    }

    pub async fn fetch_unread_count(&self) -> bool {
        match self.api.unread_count().await {
            Ok(unread) => {
                self.state.lock().await.unread = unread;
                true
            }
            Err(e) => {
                error!("Error fetching unread count: {}", e);
                false
            }
        }
    }
}
