use log::debug;
use reqwest::{header, multipart};
use reqwest_middleware::RequestBuilder;
use serde_json::{json, Value};
use url::Url;

use super::{take, HttpClient, MessageApi, PostApi, SessionApi};
use crate::{
    config::Config,
    error::Result,
    message::{Conversation, Message, SentMessage},
    post::{
        author::AuthorFields, comment, AuthorRef, Comment, ImageUpload, Post, PostPayload,
        UserSummary,
    },
    session::ProfileUpdate,
};

/// Client for the feed backend. Every request carries the session cookie.
#[derive(Debug, Clone)]
pub struct SocialClient {
    inner: HttpClient,
    base: Url,
    session: String,
}

impl SocialClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(config.backend_url())?;
        Ok(Self::with_options(
            base,
            config.session(),
            config.limit(),
            config.retries(),
        ))
    }

    pub fn with_options(base: Url, session: String, limit: usize, retries: u32) -> Self {
        Self {
            inner: HttpClient::new(limit, retries),
            base,
            session,
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn wrap_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::COOKIE, &self.session)
            .header(header::ACCEPT, "application/json")
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.url(path)?;
        let request = self.wrap_request(self.inner.reader().get(url));
        self.inner.send(&format!("GET {}", path), request).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path)?;
        let request = self.wrap_request(self.inner.writer().post(url).json(body));
        self.inner.send(&format!("POST {}", path), request).await
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path)?;
        let request = self.wrap_request(self.inner.writer().put(url).json(body));
        self.inner.send(&format!("PUT {}", path), request).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        let url = self.url(path)?;
        let request = self.wrap_request(self.inner.writer().delete(url));
        self.inner.send(&format!("DELETE {}", path), request).await
    }

    fn form(payload: PostPayload) -> Result<multipart::Form> {
        let mut form = multipart::Form::new();
        if let Some(content) = payload.content {
            form = form.text("content", content);
        }
        if let Some(image) = payload.image {
            form = form.part("image", Self::upload_part(image)?);
        }
        Ok(form)
    }

    fn upload_part(image: ImageUpload) -> Result<multipart::Part> {
        Ok(multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime)?)
    }
}

impl PostApi for SocialClient {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let body = self.get("/api/posts").await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let path = format!("/api/posts/search?q={}", urlencoding::encode(query));
        let body = self.get(&path).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn create_post(&self, payload: PostPayload) -> Result<Post> {
        let url = self.url("/api/posts")?;
        let request = self.wrap_request(self.inner.writer().post(url).multipart(Self::form(payload)?));
        let mut body = self.inner.send("POST /api/posts", request).await?;
        take(&mut body, "post")
    }

    async fn update_post(&self, id: &str, payload: PostPayload) -> Result<Post> {
        let path = format!("/api/posts/{}", id);
        let url = self.url(&path)?;
        let request = if payload.has_image() {
            self.inner.writer().put(url).multipart(Self::form(payload)?)
        } else {
            self.inner
                .writer()
                .put(url)
                .json(&json!({ "content": payload.content }))
        };
        let request = self.wrap_request(request);
        let mut body = self.inner.send(&format!("PUT {}", path), request).await?;
        take(&mut body, "post")
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/posts/{}", id)).await?;
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> Result<Post> {
        let mut body = self
            .delete(&format!("/api/posts/{}/delete-image", id))
            .await?;
        take(&mut body, "post")
    }

    async fn toggle_like(&self, id: &str) -> Result<()> {
        // The body describes the updated post but is not merged back.
        self.post_json(&format!("/api/posts/{}/like", id), &json!({}))
            .await?;
        Ok(())
    }

    async fn add_comment(&self, id: &str, content: &str) -> Result<Comment> {
        let mut body = self
            .post_json(
                &format!("/api/posts/{}/comments", id),
                &json!({ "content": content }),
            )
            .await?;
        take(&mut body, "comment")
    }

    async fn list_comments(&self, id: &str) -> Result<Vec<Comment>> {
        let mut body = self.get(&format!("/api/posts/{}/user-comments", id)).await?;
        let Some(Value::Array(entries)) = body.get_mut("comments").map(Value::take) else {
            return Ok(vec![]);
        };

        let comments = comment::from_entries(entries);
        debug!("Read {} comments of post {}", comments.len(), id);
        Ok(comments)
    }
}

impl MessageApi for SocialClient {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut body = self.get("/api/messages/conversations").await?;
        take(&mut body, "data")
    }

    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        let mut body = self.get(&format!("/api/messages/{}", user_id)).await?;
        take(&mut body, "data")
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<SentMessage> {
        let mut body = self
            .post_json(
                "/api/messages",
                &json!({ "recipient": recipient, "text": text }),
            )
            .await?;
        take(&mut body, "data")
    }

    async fn unread_count(&self) -> Result<u64> {
        let mut body = self.get("/api/messages/unread/count").await?;
        let mut data: Value = take(&mut body, "data")?;
        take(&mut data, "unreadCount")
    }
}

impl SessionApi for SocialClient {
    async fn check_auth(&self) -> Result<bool> {
        let body = self.get("/api/user-auth").await?;
        Ok(body.get("success").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn user_data(&self) -> Result<UserSummary> {
        let mut body = self.get("/api/user/data").await?;
        let mut data: Value = take(&mut body, "userData")?;
        let user: AuthorRef = take(&mut data, "user")?;
        Ok(user.summary())
    }

    async fn user_by_id(&self, id: &str) -> Result<UserSummary> {
        let mut body = self.get(&format!("/api/user-details/{}", id)).await?;
        let mut data: Value = take(&mut body, "userData")?;
        // `userData` is either the user or `{ user }`.
        let user = if data.get("user").is_some_and(Value::is_object) {
            data["user"].take()
        } else {
            data
        };
        Ok(serde_json::from_value::<AuthorRef>(user)?.summary())
    }

    async fn update_bio(&self, user_id: &str, bio: &str) -> Result<AuthorFields> {
        let mut body = self
            .put_json(&format!("/api/user/{}", user_id), &json!({ "bio": bio }))
            .await?;
        take(&mut body, "user")
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<AuthorFields> {
        let mut body = self
            .put_json(&format!("/api/users/edit/{}", user_id), &serde_json::to_value(update)?)
            .await?;
        take(&mut body, "user")
    }

    async fn update_photo(&self, user_id: &str, photo: ImageUpload) -> Result<String> {
        let path = format!("/api/users/edit/{}/photo", user_id);
        let url = self.url(&path)?;
        let form = multipart::Form::new().part("photo", Self::upload_part(photo)?);
        let request = self.wrap_request(self.inner.writer().put(url).multipart(form));
        let mut body = self.inner.send(&format!("PUT {}", path), request).await?;
        take(&mut body, "photoUrl")
    }
}
