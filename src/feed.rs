use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{
    api::PostApi,
    post::{author::DEFAULT_PHOTO, Comment, Post, UserSummary},
    store::PostStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing to do, or the same action is already in flight.
    Ignored,
    /// The action needs a signed-in user.
    LoginRequired,
    Failed(String),
}

#[derive(Debug, Default, Clone)]
struct Overlay {
    comments_visible: bool,
    liking: bool,
    loading_comments: bool,
    comments: Vec<Comment>,
    liked: Option<bool>,
}

#[derive(Debug, Default)]
struct ViewState {
    overlays: HashMap<String, Overlay>,
    active_input: Option<String>,
    draft: String,
    submitting: bool,
    user: Option<UserSummary>,
}

impl ViewState {
    fn overlay(&mut self, id: &str) -> &mut Overlay {
        self.overlays.entry(id.to_string()).or_default()
    }

    fn user_id(&self) -> Option<String> {
        self.user.as_ref()?.id.clone()
    }
}

/// One post as it should be displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCard {
    pub id: String,
    pub author: UserSummary,
    pub content: Option<String>,
    pub image: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: usize,
    pub liked: bool,
    pub liking: bool,
    pub loading_comments: bool,
    pub comments: Vec<Comment>,
    pub comment_count: usize,
    pub comments_visible: bool,
    pub input_open: bool,
}

pub struct FeedView<A> {
    store: Arc<PostStore<A>>,
    state: Mutex<ViewState>,
}

impl<A: PostApi> FeedView<A> {
    pub fn new(store: Arc<PostStore<A>>) -> Self {
        Self {
            store,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn store(&self) -> &Arc<PostStore<A>> {
        &self.store
    }

    pub async fn set_user(&self, user: Option<UserSummary>) {
        self.state.lock().await.user = user;
    }

    pub async fn set_comment_text(&self, text: impl Into<String>) {
        self.state.lock().await.draft = text.into();
    }

    pub async fn comment_text(&self) -> String {
        self.state.lock().await.draft.clone()
    }

    pub async fn active_input(&self) -> Option<String> {
        self.state.lock().await.active_input.clone()
    }

    /// Flips the current user's like right away, then tells the server.
    ///
    /// If the server call fails the flip is undone, unless something else
    /// has changed the user's membership in the meantime.
    pub async fn toggle_like(&self, id: &str) -> Outcome {
        let (user_id, liked) = {
            let mut state = self.state.lock().await;
            let Some(user_id) = state.user_id() else {
                return Outcome::LoginRequired;
            };
            if state.overlay(id).liking {
                debug!("Like on {} already in flight", id);
                return Outcome::Ignored;
            }
            let Some(mut post) = self.store.post(id).await else {
                return Outcome::Ignored;
            };
            let liked = post.likes.toggle(&user_id);
            let overlay = state.overlay(id);
            overlay.liking = true;
            overlay.liked = Some(liked);
            self.store.replace(post).await;
            (user_id, liked)
        };

        let sent = self.store.toggle_like(id).await;

        if !sent {
            if let Some(mut post) = self.store.post(id).await {
                if post.is_liked_by(&user_id) == liked {
                    post.likes.toggle(&user_id);
                    self.store.replace(post).await;
                }
            }
        }

        let mut state = self.state.lock().await;
        let overlay = state.overlay(id);
        overlay.liking = false;
        overlay.liked = None;
        if sent {
            Outcome::Applied
        } else {
            Outcome::Failed("Failed to like post".to_string())
        }
    }

    /// Opens or closes the comment input of a post.
    pub async fn toggle_comment_input(&self, id: &str) -> Outcome {
        let needs_load = {
            let mut state = self.state.lock().await;
            if state.user.is_none() {
                return Outcome::LoginRequired;
            }
            state.draft.clear();
            if state.active_input.as_deref() == Some(id) {
                state.active_input = None;
                return Outcome::Applied;
            }
            state.active_input = Some(id.to_string());
            let overlay = state.overlay(id);
            overlay.comments_visible = true;
            overlay.comments.is_empty()
        };

        if needs_load {
            let cached = self
                .store
                .post(id)
                .await
                .is_some_and(|post| !post.comments.is_empty());
            if !cached {
                self.load_comments(id).await;
            }
        }
        Outcome::Applied
    }

    /// Shows or hides the comments of a post, reloading them when shown.
    pub async fn toggle_comments(&self, id: &str) -> Outcome {
        let now_visible = {
            let mut state = self.state.lock().await;
            let overlay = state.overlay(id);
            overlay.comments_visible = !overlay.comments_visible;
            overlay.comments_visible
        };
        if now_visible {
            self.load_comments(id).await;
        }
        Outcome::Applied
    }

    /// Fetches the comments of a post into the local cache and the store.
    pub async fn load_comments(&self, id: &str) -> Outcome {
        {
            let mut state = self.state.lock().await;
            let overlay = state.overlay(id);
            if overlay.loading_comments {
                return Outcome::Ignored;
            }
            overlay.loading_comments = true;
        }

        let comments = self.store.fetch_comments(id).await;

        if let Some(mut post) = self.store.post(id).await {
            post.comments = comments.clone();
            self.store.replace(post).await;
        }

        let mut state = self.state.lock().await;
        let overlay = state.overlay(id);
        overlay.comments = comments;
        overlay.loading_comments = false;
        Outcome::Applied
    }

    /// Sends the draft as a comment on `id`.
    pub async fn submit_comment(&self, id: &str) -> Outcome {
        let (text, user) = {
            let mut state = self.state.lock().await;
            if state.draft.trim().is_empty() || state.submitting {
                return Outcome::Ignored;
            }
            state.submitting = true;
            (state.draft.clone(), state.user.clone())
        };

        let result = self.store.add_comment(id, &text).await;

        let comment = match result {
            Ok(comment) => comment,
            Err(e) => {
                let message = e.user_message();
                self.store.notifier().error(message.clone());
                self.state.lock().await.submitting = false;
                return Outcome::Failed(message);
            }
        };
        let comment = Self::complete_comment(comment, &text, user.as_ref());

        let merged = {
            let state = self.state.lock().await;
            state
                .overlays
                .get(id)
                .map(|overlay| overlay.comments.clone())
                .unwrap_or_default()
        };
        let mut merged = if merged.is_empty() {
            self.store
                .post(id)
                .await
                .map(|post| post.comments)
                .unwrap_or_default()
        } else {
            merged
        };
        merged.push(comment);

        if let Some(mut post) = self.store.post(id).await {
            post.comments = merged.clone();
            self.store.replace(post).await;
        } else {
            warn!("Commented post {} is no longer listed", id);
        }

        {
            let mut state = self.state.lock().await;
            state.overlay(id).comments = merged;
            state.draft.clear();
            state.active_input = None;
            state.submitting = false;
        }
        self.store.notifier().success("Comment added successfully!");
        Outcome::Applied
    }

    /// Fills what the server left out of a new comment with what we know.
    fn complete_comment(mut comment: Comment, text: &str, user: Option<&UserSummary>) -> Comment {
        if comment.content.trim().is_empty() {
            comment.content = text.to_string();
        }
        if comment.author.is_placeholder() {
            if let Some(user) = user {
                comment.author = UserSummary {
                    id: user.id.clone(),
                    name: non_empty(&user.name, "You"),
                    username: non_empty(&user.username, "you"),
                    photo: non_empty(&user.photo, DEFAULT_PHOTO),
                    bio: None,
                };
            }
        }
        comment
    }

    /// The comments to show for a post: the local cache once it has any,
    /// the store's copy otherwise.
    pub async fn comments_for(&self, id: &str) -> Vec<Comment> {
        let local = {
            let state = self.state.lock().await;
            state
                .overlays
                .get(id)
                .map(|overlay| overlay.comments.clone())
                .unwrap_or_default()
        };
        if !local.is_empty() {
            return local;
        }
        self.store
            .post(id)
            .await
            .map(|post| post.comments)
            .unwrap_or_default()
    }

    /// Merges the store's posts with the view's overlays.
    pub async fn render(&self) -> Vec<PostCard> {
        let posts = self.store.posts().await;
        let state = self.state.lock().await;
        posts
            .into_iter()
            .map(|post| Self::card(&state, post))
            .collect()
    }

    fn card(state: &ViewState, post: Post) -> PostCard {
        let overlay = state.overlays.get(&post.id).cloned().unwrap_or_default();
        let liked = overlay.liked.unwrap_or_else(|| {
            state
                .user_id()
                .is_some_and(|user_id| post.is_liked_by(&user_id))
        });
        let comments = if overlay.comments.is_empty() {
            post.comments.clone()
        } else {
            overlay.comments
        };

        PostCard {
            author: post.author_summary(),
            image: post.image().map(str::to_string),
            like_count: post.likes.len(),
            liked,
            liking: overlay.liking,
            loading_comments: overlay.loading_comments,
            comment_count: comments.len(),
            comments,
            comments_visible: overlay.comments_visible,
            input_open: state.active_input.as_deref() == Some(post.id.as_str()),
            created_at: post.created_at,
            content: post.content,
            id: post.id,
        }
    }
}

fn non_empty(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        notify::{Level, Notifier},
        post::author::UNKNOWN_NAME,
        test::{post, user, FakeBackend, VIEWER},
    };

    async fn view(backend: FakeBackend) -> FeedView<FakeBackend> {
        let store = Arc::new(PostStore::new(backend, Arc::new(Notifier::new())));
        store.load().await;
        let view = FeedView::new(store);
        view.set_user(Some(user(VIEWER))).await;
        view
    }

    async fn card(view: &FeedView<FakeBackend>, id: &str) -> PostCard {
        view.render()
            .await
            .into_iter()
            .find(|card| card.id == id)
            .unwrap()
    }

    #[tokio::test]
    async fn like_shows_before_the_server_answers() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        let gate = backend.hold_likes().await;
        let view = view(backend.clone()).await;

        let like = view.toggle_like("p1");
        tokio::pin!(like);
        assert!(futures::poll!(&mut like).is_pending());

        let pending = card(&view, "p1").await;
        assert!(pending.liked);
        assert!(pending.liking);
        assert_eq!(pending.like_count, 1);

        gate.add_permits(1);
        assert_eq!(like.await, Outcome::Applied);
        let done = card(&view, "p1").await;
        assert!(done.liked);
        assert!(!done.liking);
        assert!(backend.server_post("p1").await.unwrap().likes.contains(VIEWER));
    }

    #[tokio::test]
    async fn like_again_unlikes() {
        let view = view(FakeBackend::with_posts(vec![post("p1")])).await;
        view.toggle_like("p1").await;
        view.toggle_like("p1").await;

        let card = card(&view, "p1").await;
        assert!(!card.liked);
        assert_eq!(card.like_count, 0);
    }

    #[tokio::test]
    async fn second_like_while_in_flight_is_ignored() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        let gate = backend.hold_likes().await;
        let view = view(backend.clone()).await;

        let first = view.toggle_like("p1");
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());

        assert_eq!(view.toggle_like("p1").await, Outcome::Ignored);

        gate.add_permits(1);
        assert_eq!(first.await, Outcome::Applied);
        assert_eq!(backend.like_calls().await, 1);
        assert_eq!(card(&view, "p1").await.like_count, 1);
    }

    #[tokio::test]
    async fn failed_like_is_reverted() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        let gate = backend.hold_likes().await;
        let view = view(backend.clone()).await;

        let like = view.toggle_like("p1");
        tokio::pin!(like);
        assert!(futures::poll!(&mut like).is_pending());
        assert_eq!(
            view.store().post("p1").await.unwrap().likes.iter().collect::<Vec<_>>(),
            vec![VIEWER]
        );

        backend.go_offline().await;
        gate.add_permits(1);
        assert!(matches!(like.await, Outcome::Failed(_)));

        let card = card(&view, "p1").await;
        assert!(!card.liked);
        assert_eq!(card.like_count, 0);
        let notices = view.store().notifier().drain();
        assert_eq!(notices.last().unwrap().level, Level::Error);
    }

    #[tokio::test]
    async fn like_requires_user() {
        let view = view(FakeBackend::with_posts(vec![post("p1")])).await;
        view.set_user(None).await;
        assert_eq!(view.toggle_like("p1").await, Outcome::LoginRequired);
        assert_eq!(view.toggle_comment_input("p1").await, Outcome::LoginRequired);
    }

    #[tokio::test]
    async fn opening_input_loads_comments_once() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        backend
            .set_comments("p1", json!([{ "_id": "c1", "content": "first", "author": "u2" }]))
            .await;
        let view = view(backend.clone()).await;

        assert_eq!(view.toggle_comment_input("p1").await, Outcome::Applied);
        let opened = card(&view, "p1").await;
        assert!(opened.input_open);
        assert!(opened.comments_visible);
        assert_eq!(opened.comment_count, 1);
        assert_eq!(backend.comment_loads().await, 1);

        // Closing and reopening reuses the cache.
        view.toggle_comment_input("p1").await;
        assert!(!card(&view, "p1").await.input_open);
        view.toggle_comment_input("p1").await;
        assert_eq!(backend.comment_loads().await, 1);
    }

    #[tokio::test]
    async fn showing_comments_always_reloads() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        backend
            .set_comments("p1", json!([{ "_id": "c1", "content": "first" }]))
            .await;
        let view = view(backend.clone()).await;

        view.toggle_comments("p1").await;
        assert_eq!(card(&view, "p1").await.comment_count, 1);

        view.toggle_comments("p1").await;
        assert!(!card(&view, "p1").await.comments_visible);

        backend
            .set_comments(
                "p1",
                json!([{ "_id": "c1", "content": "first" }, { "_id": "c2", "content": "second" }]),
            )
            .await;
        view.toggle_comments("p1").await;
        assert_eq!(backend.comment_loads().await, 2);
        let card = card(&view, "p1").await;
        assert_eq!(card.comment_count, 2);
        assert_eq!(
            view.store().post("p1").await.unwrap().comments.len(),
            2,
            "loaded comments are pushed back to the store"
        );
    }

    #[tokio::test]
    async fn comment_load_in_flight_is_not_repeated() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        let gate = backend.hold_comments().await;
        let view = view(backend.clone()).await;

        let first = view.load_comments("p1");
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());
        assert!(card(&view, "p1").await.loading_comments);
        assert_eq!(view.load_comments("p1").await, Outcome::Ignored);

        gate.add_permits(1);
        assert_eq!(first.await, Outcome::Applied);
        assert_eq!(backend.comment_loads().await, 1);
    }

    #[tokio::test]
    async fn submit_appends_exactly_one_comment() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        backend
            .set_comments("p1", json!([{ "_id": "c1", "content": "first", "author": "u2" }]))
            .await;
        let view = view(backend).await;
        view.toggle_comment_input("p1").await;
        let before = card(&view, "p1").await.comment_count;

        view.set_comment_text("hello").await;
        assert_eq!(view.submit_comment("p1").await, Outcome::Applied);

        let card = card(&view, "p1").await;
        assert_eq!(card.comment_count, before + 1);
        let added = card.comments.last().unwrap();
        assert_eq!(added.content, "hello");
        // The server left the author out; the current user fills in.
        assert_eq!(added.author.name, user(VIEWER).name);
        assert!(!card.input_open);
        assert_eq!(view.comment_text().await, "");
        assert_eq!(view.store().post("p1").await.unwrap().comments.len(), before + 1);
    }

    #[tokio::test]
    async fn blank_comment_is_ignored() {
        let view = view(FakeBackend::with_posts(vec![post("p1")])).await;
        view.set_comment_text("   ").await;
        assert_eq!(view.submit_comment("p1").await, Outcome::Ignored);
    }

    #[tokio::test]
    async fn failed_comment_keeps_panel_open() {
        let backend = FakeBackend::with_posts(vec![post("p1")]);
        let view = view(backend.clone()).await;
        view.toggle_comment_input("p1").await;
        view.set_comment_text("hello").await;

        backend.reject("You are commenting too fast").await;
        assert_eq!(
            view.submit_comment("p1").await,
            Outcome::Failed("You are commenting too fast".to_string())
        );
        assert_eq!(view.active_input().await.as_deref(), Some("p1"));
        assert_eq!(view.comment_text().await, "hello");
        let notices = view.store().notifier().drain();
        assert_eq!(notices.last().unwrap().message, "You are commenting too fast");

        backend.go_online().await;
        assert_eq!(view.submit_comment("p1").await, Outcome::Applied);
    }

    #[tokio::test]
    async fn store_comments_are_used_until_loaded() {
        let mut seeded = post("p1");
        seeded.comments = serde_json::from_value(json!(["c1", "c2"])).unwrap();
        let view = view(FakeBackend::with_posts(vec![seeded])).await;

        let comments = view.comments_for("p1").await;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author.name, UNKNOWN_NAME);
    }

    #[tokio::test]
    async fn render_drops_blank_image_and_fills_author() {
        let mut bare = post("p1");
        bare.author = None;
        bare.image_url = Some(String::new());
        let view = view(FakeBackend::with_posts(vec![bare])).await;

        let card = card(&view, "p1").await;
        assert_eq!(card.image, None);
        assert_eq!(card.author.name, UNKNOWN_NAME);
    }
}
