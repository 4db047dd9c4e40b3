use std::{collections::HashMap, sync::Arc};

use log::{debug, error, info};
use tokio::sync::Mutex;

use crate::{
    api::PostApi,
    error::ApiError,
    notify::Notifier,
    post::{Comment, Post, PostPayload},
};

#[derive(Debug, Default)]
struct StoreState {
    posts: Vec<Post>,
    /// Bumped on every local write.
    version: u64,
    /// Version of the last local write per post id.
    written: HashMap<String, u64>,
    /// Version at which a post was deleted locally.
    removed: HashMap<String, u64>,
    /// Identifies the newest listing request.
    listing: u64,
    loading: bool,
    searching: bool,
}

impl StoreState {
    fn touch(&mut self, id: &str) {
        self.version += 1;
        self.written.insert(id.to_string(), self.version);
        self.removed.remove(id);
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.posts.iter().position(|post| post.id == id)
    }

    /// Replaces the post with the same id, or puts it in front.
    fn upsert(&mut self, post: Post) {
        self.touch(&post.id);
        match self.position(&post.id) {
            Some(index) => self.posts[index] = post,
            None => self.posts.insert(0, post),
        }
    }

    /// Tombstones `id` even when it is not listed yet, so that a listing in
    /// flight cannot bring it back.
    fn remove(&mut self, id: &str) -> Option<Post> {
        self.version += 1;
        self.written.remove(id);
        self.removed.insert(id.to_string(), self.version);
        let index = self.position(id)?;
        Some(self.posts.remove(index))
    }

    /// Installs a server listing that was requested at version `since`.
    ///
    /// Posts written locally after `since` keep their local copy; those the
    /// server does not know about yet stay in front. Posts deleted locally
    /// after `since` stay deleted.
    fn apply_listing(&mut self, since: u64, listed: Vec<Post>) {
        let newer = |stamps: &HashMap<String, u64>, id: &str| {
            stamps.get(id).is_some_and(|version| *version > since)
        };

        let listed_ids: Vec<String> = listed.iter().map(|post| post.id.clone()).collect();
        let mut merged: Vec<Post> = self
            .posts
            .iter()
            .filter(|post| newer(&self.written, &post.id) && !listed_ids.contains(&post.id))
            .cloned()
            .collect();

        for post in listed {
            if newer(&self.removed, &post.id) || merged.iter().any(|p| p.id == post.id) {
                continue;
            }
            if newer(&self.written, &post.id) {
                if let Some(index) = self.position(&post.id) {
                    merged.push(self.posts[index].clone());
                    continue;
                }
            }
            merged.push(post);
        }

        if merged.len() != listed_ids.len() {
            debug!(
                "Listing merged with local writes ({} listed, {} kept)",
                listed_ids.len(),
                merged.len()
            );
        }
        self.posts = merged;
        self.written.clear();
        self.removed.clear();
    }
}

#[derive(Clone, Copy)]
enum Listing<'a> {
    All,
    Search(&'a str),
}

/// The single source of truth for posts, shared by every view.
pub struct PostStore<A> {
    api: A,
    notifier: Arc<Notifier>,
    state: Mutex<StoreState>,
}

impl<A: PostApi> PostStore<A> {
    pub fn new(api: A, notifier: Arc<Notifier>) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.state.lock().await.posts.clone()
    }

    pub async fn post(&self, id: &str) -> Option<Post> {
        let state = self.state.lock().await;
        state.position(id).map(|index| state.posts[index].clone())
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn is_searching(&self) -> bool {
        self.state.lock().await.searching
    }

    /// Fetches every post and replaces the collection.
    pub async fn load(&self) -> bool {
        self.list(Listing::All).await
    }

    /// Replaces the collection with the posts matching `query`.
    pub async fn search(&self, query: &str) -> bool {
        self.list(Listing::Search(query)).await
    }

    async fn list(&self, listing: Listing<'_>) -> bool {
        let (ticket, since) = {
            let mut state = self.state.lock().await;
            state.listing += 1;
            match listing {
                Listing::All => state.loading = true,
                Listing::Search(_) => state.searching = true,
            }
            (state.listing, state.version)
        };

        let (result, failure) = match listing {
            Listing::All => (self.api.list_posts().await, "Failed to fetch posts"),
            Listing::Search(query) => (self.api.search_posts(query).await, "Failed to search posts"),
        };

        let mut state = self.state.lock().await;
        let current = state.listing == ticket;
        if current {
            state.loading = false;
            state.searching = false;
        }

        match result {
            Ok(posts) if current => {
                info!("Loaded {} posts", posts.len());
                state.apply_listing(since, posts);
                true
            }
            Ok(_) => {
                debug!("Discarding listing #{}, superseded by #{}", ticket, state.listing);
                true
            }
            Err(e) => {
                drop(state);
                error!("{}: {}", failure, e);
                self.notifier.error(failure);
                false
            }
        }
    }

    /// Creates a post and puts the server's copy in front.
    pub async fn create(&self, payload: PostPayload) -> bool {
        match self.api.create_post(payload).await {
            Ok(post) => {
                info!("Created post {}", post.id);
                self.state.lock().await.upsert(post);
                true
            }
            Err(e) => {
                self.notifier.failure("Failed to create post", &e);
                false
            }
        }
    }

    pub async fn update(&self, id: &str, payload: PostPayload) -> bool {
        match self.api.update_post(id, payload).await {
            Ok(post) => {
                {
                    let mut state = self.state.lock().await;
                    match state.position(id) {
                        Some(index) => {
                            state.touch(id);
                            state.posts[index] = post;
                        }
                        None => debug!("Updated post {} is no longer listed", id),
                    }
                }
                self.notifier.success("Post updated successfully");
                true
            }
            Err(e) => {
                self.notifier.failure("Failed to update post", &e);
                false
            }
        }
    }

    /// Deletes a post. The local copy goes only once the server agrees.
    pub async fn delete(&self, id: &str) -> bool {
        match self.api.delete_post(id).await {
            Ok(()) => {
                self.state.lock().await.remove(id);
                self.notifier.success("Post deleted successfully");
                true
            }
            Err(e) => {
                self.notifier.failure("Failed to delete post", &e);
                false
            }
        }
    }

    pub async fn delete_image(&self, id: &str) -> bool {
        match self.api.delete_image(id).await {
            Ok(post) => {
                self.state.lock().await.upsert(post);
                self.notifier.success("Image removed successfully");
                true
            }
            Err(e) => {
                let status = e.status().map(|status| status.as_u16());
                if matches!(status, Some(400 | 404)) {
                    debug!("Post {} has no image to remove", id);
                } else {
                    self.notifier.failure("Failed to remove image", &e);
                }
                false
            }
        }
    }

    /// Sends the like toggle. The server's view of the like-set is not merged.
    pub async fn toggle_like(&self, id: &str) -> bool {
        match self.api.toggle_like(id).await {
            Ok(()) => true,
            Err(e) => {
                self.notifier.failure("Failed to like post", &e);
                false
            }
        }
    }

    /// Posts a comment. The caller decides where the comment goes and how to
    /// present a failure.
    pub async fn add_comment(&self, id: &str, text: &str) -> Result<Comment, ApiError> {
        self.api.add_comment(id, text).await.map_err(|e| {
            error!("Add comment error: {}", e);
            e
        })
    }

    /// Never fails; an unreachable or unhappy server yields no comments.
    pub async fn fetch_comments(&self, id: &str) -> Vec<Comment> {
        match self.api.list_comments(id).await {
            Ok(comments) => {
                debug!("Fetched {} comments for post {}", comments.len(), id);
                comments
            }
            Err(e) => {
                error!("Fetch comments error for post {}: {}", id, e);
                vec![]
            }
        }
    }

    /// Upserts a post by id. This is the only way a view writes to the store.
    pub async fn replace(&self, post: Post) {
        self.state.lock().await.upsert(post);
    }
}
