use std::{collections::HashMap, io, sync::Arc};

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::{Mutex, Semaphore};

use crate::{
    api::{MessageApi, PostApi, SessionApi},
    error::{ApiError, Result},
    message::{Conversation, Message, MessageRef, SentMessage},
    post::{
        author::AuthorFields, comment, AuthorRef, Comment, ImageUpload, Post, PostPayload,
        UserSummary,
    },
    session::ProfileUpdate,
};

pub const VIEWER: &str = "u1";
/// The one user id the fake backend does not know.
pub const GHOST: &str = "ghost";

pub fn user(id: &str) -> UserSummary {
    UserSummary {
        id: Some(id.to_string()),
        name: format!("User {}", id),
        username: id.to_string(),
        photo: format!("https://cdn.test/{}.png", id),
        bio: None,
    }
}

pub fn post(id: &str) -> Post {
    Post {
        id: id.to_string(),
        author: Some(user("author").into()),
        content: Some(format!("post {}", id)),
        image_url: None,
        likes: Default::default(),
        comments: vec![],
        created_at: None,
    }
}

#[derive(Default)]
struct Backend {
    posts: Vec<Post>,
    comments: HashMap<String, Vec<Value>>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    unread: u64,
    offline: bool,
    rejection: Option<String>,
    create_response: Option<Value>,
    listing_gate: Option<Arc<Semaphore>>,
    like_gate: Option<Arc<Semaphore>>,
    comment_gate: Option<Arc<Semaphore>>,
    like_calls: usize,
    comment_loads: usize,
    next_id: usize,
}

impl Backend {
    fn check(&self) -> Result<()> {
        if self.offline {
            let e = io::Error::new(io::ErrorKind::ConnectionRefused, "backend offline");
            return Err(reqwest_middleware::Error::middleware(e).into());
        }
        if let Some(message) = &self.rejection {
            return Err(rejected(StatusCode::BAD_REQUEST, message));
        }
        Ok(())
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn find(&mut self, id: &str) -> Result<&mut Post> {
        self.posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "Post not found"))
    }
}

fn rejected(status: StatusCode, message: &str) -> ApiError {
    ApiError::Rejected {
        status,
        message: Some(message.to_string()),
    }
}

async fn pass(gate: Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeBackend(Arc<Mutex<Backend>>);

impl FakeBackend {
    pub fn with_posts(posts: Vec<Post>) -> Self {
        let backend = Self::default();
        backend.0.try_lock().expect("fresh backend").posts = posts;
        backend
    }

    pub async fn set_posts(&self, posts: Vec<Post>) {
        self.0.lock().await.posts = posts;
    }

    pub async fn set_comments(&self, post_id: &str, comments: Value) {
        let entries = match comments {
            Value::Array(entries) => entries,
            other => vec![other],
        };
        self.0
            .lock()
            .await
            .comments
            .insert(post_id.to_string(), entries);
    }

    pub async fn set_conversations(&self, conversations: Value) {
        self.0.lock().await.conversations = serde_json::from_value(conversations).unwrap();
    }

    pub async fn set_unread(&self, unread: u64) {
        self.0.lock().await.unread = unread;
    }

    pub async fn go_offline(&self) {
        self.0.lock().await.offline = true;
    }

    pub async fn go_online(&self) {
        let mut backend = self.0.lock().await;
        backend.offline = false;
        backend.rejection = None;
    }

    /// Every following request fails with `message` until [`Self::go_online`].
    pub async fn reject(&self, message: &str) {
        self.0.lock().await.rejection = Some(message.to_string());
    }

    pub async fn respond_to_create(&self, post: Value) {
        self.0.lock().await.create_response = Some(post);
    }

    /// Listings wait for a permit on the returned semaphore.
    pub async fn hold_listings(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.0.lock().await.listing_gate = Some(gate.clone());
        gate
    }

    pub async fn hold_likes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.0.lock().await.like_gate = Some(gate.clone());
        gate
    }

    pub async fn hold_comments(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.0.lock().await.comment_gate = Some(gate.clone());
        gate
    }

    pub async fn like_calls(&self) -> usize {
        self.0.lock().await.like_calls
    }

    pub async fn comment_loads(&self) -> usize {
        self.0.lock().await.comment_loads
    }

    pub async fn server_post(&self, id: &str) -> Option<Post> {
        let backend = self.0.lock().await;
        backend.posts.iter().find(|post| post.id == id).cloned()
    }

    async fn listing(&self, query: Option<&str>) -> Result<Vec<Post>> {
        let (posts, gate) = {
            let backend = self.0.lock().await;
            backend.check()?;
            let posts = backend
                .posts
                .iter()
                .filter(|post| match query {
                    Some(query) => post
                        .content
                        .as_deref()
                        .is_some_and(|content| content.contains(query)),
                    None => true,
                })
                .cloned()
                .collect();
            (posts, backend.listing_gate.clone())
        };
        pass(gate).await;
        Ok(posts)
    }
}

impl PostApi for FakeBackend {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        self.listing(None).await
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        self.listing(Some(query)).await
    }

    async fn create_post(&self, payload: PostPayload) -> Result<Post> {
        let mut backend = self.0.lock().await;
        backend.check()?;
        let post = match backend.create_response.take() {
            Some(value) => serde_json::from_value(value)?,
            None => Post {
                id: backend.next_id("p-new-"),
                author: Some(AuthorRef::Unresolved(VIEWER.to_string())),
                content: payload.content,
                image_url: payload.image.map(|image| format!("/uploads/{}", image.file_name)),
                likes: Default::default(),
                comments: vec![],
                created_at: Some(Utc::now()),
            },
        };
        backend.posts.insert(0, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: &str, payload: PostPayload) -> Result<Post> {
        let mut backend = self.0.lock().await;
        backend.check()?;
        let post = backend.find(id)?;
        if payload.content.is_some() {
            post.content = payload.content;
        }
        if let Some(image) = payload.image {
            post.image_url = Some(format!("/uploads/{}", image.file_name));
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        let mut backend = self.0.lock().await;
        backend.check()?;
        backend.find(id)?;
        backend.posts.retain(|post| post.id != id);
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> Result<Post> {
        let mut backend = self.0.lock().await;
        backend.check()?;
        let post = backend.find(id)?;
        if post.image().is_none() {
            return Err(rejected(
                StatusCode::BAD_REQUEST,
                "Post does not have an image to delete",
            ));
        }
        post.image_url = None;
        Ok(post.clone())
    }

    async fn toggle_like(&self, id: &str) -> Result<()> {
        let gate = {
            let mut backend = self.0.lock().await;
            backend.like_calls += 1;
            backend.like_gate.clone()
        };
        pass(gate).await;

        let mut backend = self.0.lock().await;
        backend.check()?;
        backend.find(id)?.likes.toggle(VIEWER);
        Ok(())
    }

    async fn add_comment(&self, id: &str, content: &str) -> Result<Comment> {
        let mut backend = self.0.lock().await;
        backend.check()?;
        if content.trim().is_empty() {
            return Err(rejected(StatusCode::BAD_REQUEST, "Comment content is required"));
        }
        backend.find(id)?;
        let comment_id = backend.next_id("c-");
        backend.comments.entry(id.to_string()).or_default().push(json!({
            "_id": comment_id,
            "content": content,
            "author": VIEWER,
        }));
        // Like the real backend, the author is not populated here.
        Ok(serde_json::from_value(json!({
            "_id": comment_id,
            "content": content,
            "createdAt": Utc::now(),
        }))?)
    }

    async fn list_comments(&self, id: &str) -> Result<Vec<Comment>> {
        let (entries, gate) = {
            let mut backend = self.0.lock().await;
            backend.comment_loads += 1;
            backend.check()?;
            let entries = backend.comments.get(id).cloned().unwrap_or_default();
            (entries, backend.comment_gate.clone())
        };
        pass(gate).await;
        Ok(comment::from_entries(entries))
    }
}

impl MessageApi for FakeBackend {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let backend = self.0.lock().await;
        backend.check()?;
        Ok(backend.conversations.clone())
    }

    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        let backend = self.0.lock().await;
        backend.check()?;
        Ok(backend
            .messages
            .iter()
            .filter(|m| m.sender.id() == Some(user_id) || m.recipient.id() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<SentMessage> {
        let mut backend = self.0.lock().await;
        backend.check()?;
        let message = Message {
            id: backend.next_id("m-"),
            sender: AuthorRef::Unresolved(VIEWER.to_string()),
            recipient: AuthorRef::Unresolved(recipient.to_string()),
            text: text.to_string(),
            read: false,
            created_at: Some(Utc::now()),
        };
        backend.messages.push(message.clone());

        let index = backend
            .conversations
            .iter()
            .position(|conversation| conversation.includes(recipient));
        let conversation = match index {
            Some(index) => &mut backend.conversations[index],
            None => {
                let conversation = Conversation {
                    id: backend.next_id("conv-"),
                    participants: vec![
                        AuthorRef::Unresolved(VIEWER.to_string()),
                        AuthorRef::Unresolved(recipient.to_string()),
                    ],
                    last_message: None,
                    updated_at: None,
                };
                backend.conversations.insert(0, conversation);
                &mut backend.conversations[0]
            }
        };
        conversation.last_message = Some(MessageRef::Message(Box::new(message.clone())));
        conversation.updated_at = message.created_at;

        Ok(SentMessage {
            message,
            conversation: conversation.clone(),
        })
    }

    async fn unread_count(&self) -> Result<u64> {
        let backend = self.0.lock().await;
        backend.check()?;
        Ok(backend.unread)
    }
}

impl SessionApi for FakeBackend {
    async fn check_auth(&self) -> Result<bool> {
        let backend = self.0.lock().await;
        Ok(!backend.offline && backend.rejection.is_none())
    }

    async fn user_data(&self) -> Result<UserSummary> {
        self.0.lock().await.check()?;
        Ok(user(VIEWER))
    }

    async fn user_by_id(&self, id: &str) -> Result<UserSummary> {
        self.0.lock().await.check()?;
        if id == GHOST {
            return Err(rejected(StatusCode::NOT_FOUND, "User not found"));
        }
        Ok(user(id))
    }

    async fn update_bio(&self, user_id: &str, bio: &str) -> Result<AuthorFields> {
        self.0.lock().await.check()?;
        Ok(AuthorFields {
            id: Some(user_id.to_string()),
            bio: Some(bio.to_string()),
            ..Default::default()
        })
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<AuthorFields> {
        self.0.lock().await.check()?;
        Ok(AuthorFields {
            id: Some(user_id.to_string()),
            name: update.name.clone(),
            username: update.username.clone(),
            bio: update.bio.clone(),
            ..Default::default()
        })
    }

    async fn update_photo(&self, _user_id: &str, photo: ImageUpload) -> Result<String> {
        self.0.lock().await.check()?;
        Ok(format!("/uploads/{}", photo.file_name))
    }
}
