pub mod social;

use std::{future::Future, sync::Arc};

use log::{debug, log_enabled, trace};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{
    error::{ApiError, Result},
    message::{Conversation, Message, SentMessage},
    post::{author::AuthorFields, Comment, ImageUpload, Post, PostPayload, UserSummary},
    session::ProfileUpdate,
};

pub use social::SocialClient;

/// Remote post operations the store depends on.
pub trait PostApi {
    fn list_posts(&self) -> impl Future<Output = Result<Vec<Post>>> + Send;
    fn search_posts(&self, query: &str) -> impl Future<Output = Result<Vec<Post>>> + Send;
    fn create_post(&self, payload: PostPayload) -> impl Future<Output = Result<Post>> + Send;
    fn update_post(
        &self,
        id: &str,
        payload: PostPayload,
    ) -> impl Future<Output = Result<Post>> + Send;
    fn delete_post(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
    fn delete_image(&self, id: &str) -> impl Future<Output = Result<Post>> + Send;
    fn toggle_like(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
    fn add_comment(&self, id: &str, content: &str) -> impl Future<Output = Result<Comment>> + Send;
    fn list_comments(&self, id: &str) -> impl Future<Output = Result<Vec<Comment>>> + Send;
}

pub trait MessageApi {
    fn list_conversations(&self) -> impl Future<Output = Result<Vec<Conversation>>> + Send;
    fn list_messages(&self, user_id: &str) -> impl Future<Output = Result<Vec<Message>>> + Send;
    fn send_message(
        &self,
        recipient: &str,
        text: &str,
    ) -> impl Future<Output = Result<SentMessage>> + Send;
    fn unread_count(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// The signed-in user and other users' profiles.
pub trait SessionApi {
    fn check_auth(&self) -> impl Future<Output = Result<bool>> + Send;
    fn user_data(&self) -> impl Future<Output = Result<UserSummary>> + Send;
    fn user_by_id(&self, id: &str) -> impl Future<Output = Result<UserSummary>> + Send;
    /// Returns the user as the server stored it.
    fn update_bio(
        &self,
        user_id: &str,
        bio: &str,
    ) -> impl Future<Output = Result<AuthorFields>> + Send;
    fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<AuthorFields>> + Send;
    /// Returns the new photo url.
    fn update_photo(
        &self,
        user_id: &str,
        photo: ImageUpload,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Shared HTTP plumbing: concurrency limit, optional retry for reads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    reader: ClientWithMiddleware,
    writer: ClientWithMiddleware,
    semaphore: Arc<Semaphore>,
}

impl HttpClient {
    pub fn new(limit: usize, retries: u32) -> Self {
        let client = Client::new();
        let mut reader = ClientBuilder::new(client.clone());
        if retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(retries);
            reader = reader.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }
        Self {
            reader: reader.build(),
            writer: ClientBuilder::new(client).build(),
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Client for idempotent reads. Mutations go through [`HttpClient::writer`].
    pub fn reader(&self) -> &ClientWithMiddleware {
        &self.reader
    }

    pub fn writer(&self) -> &ClientWithMiddleware {
        &self.writer
    }

    async fn permit(&self) -> Option<SemaphorePermit<'_>> {
        // never closed
        self.semaphore.acquire().await.ok()
    }

    /// Sends a request and returns the decoded body of a successful response.
    ///
    /// Non-2xx statuses and `{ "success": false }` bodies both turn into
    /// [`ApiError::Rejected`] carrying the server's message.
    pub async fn send(&self, label: &str, request: RequestBuilder) -> Result<Value> {
        let _permit = self.permit().await;
        debug!("{}", label);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        if log_enabled!(log::Level::Trace) {
            trace!("{} {}", status, serde_json::to_string_pretty(&body)?);
        }

        if !status.is_success() || body.get("success") == Some(&Value::Bool(false)) {
            return Err(ApiError::Rejected {
                status,
                message: server_message(&body),
            });
        }
        Ok(body)
    }
}

/// The `error` or `message` text of a response body, in that order.
pub fn server_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .find(|message| !message.trim().is_empty())
        .map(str::to_string)
        .or_else(|| body.as_str().map(str::to_string))
}

/// Moves `field` out of a response body and decodes it.
pub fn take<T: DeserializeOwned>(body: &mut Value, field: &'static str) -> Result<T> {
    match body.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Err(ApiError::MissingField(field)),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}
