use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    api::SessionApi,
    notify::Notifier,
    post::{author::AuthorFields, AuthorRef, ImageUpload, UserSummary},
};

/// Profile fields to change. `None` leaves a field as it is.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.username.is_none() && self.bio.is_none()
    }
}

/// Who is signed in, as far as the backend says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<UserSummary>,
}

impl Session {
    pub async fn load(api: &impl SessionApi) -> Self {
        match api.check_auth().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Not logged in");
                return Self::default();
            }
            Err(e) => {
                warn!("Not logged in: {}", e);
                return Self::default();
            }
        }

        match api.user_data().await {
            Ok(user) => Self { user: Some(user) },
            Err(e) => {
                warn!("Failed to fetch user data: {}", e);
                Self::default()
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Looks up any user's profile. A failure is reported and yields `None`.
    pub async fn fetch_user(
        api: &impl SessionApi,
        notifier: &Notifier,
        id: &str,
    ) -> Option<UserSummary> {
        match api.user_by_id(id).await {
            Ok(user) => Some(user),
            Err(e) => {
                notifier.failure("Failed to fetch user data", &e);
                None
            }
        }
    }

    /// Fetches the profile behind a bare author id. Populated authors, and
    /// ids the backend cannot resolve, are summarized as they are.
    pub async fn resolve(
        api: &impl SessionApi,
        notifier: &Notifier,
        author: &AuthorRef,
    ) -> UserSummary {
        match author {
            AuthorRef::Unresolved(id) => Self::fetch_user(api, notifier, id)
                .await
                .unwrap_or_else(|| author.summary()),
            resolved => resolved.summary(),
        }
    }

    pub async fn update_bio(
        &mut self,
        api: &impl SessionApi,
        notifier: &Notifier,
        bio: &str,
    ) -> bool {
        let Some(id) = self.user_id(notifier) else {
            return false;
        };
        match api.update_bio(&id, bio).await {
            Ok(stored) => {
                let bio = stored.bio.unwrap_or_else(|| bio.to_string());
                self.merge(AuthorFields {
                    bio: Some(bio),
                    ..Default::default()
                });
                notifier.success("Bio updated successfully");
                true
            }
            Err(e) => {
                notifier.failure("Failed to update bio", &e);
                false
            }
        }
    }

    pub async fn update_profile(
        &mut self,
        api: &impl SessionApi,
        notifier: &Notifier,
        update: &ProfileUpdate,
    ) -> bool {
        if update.is_empty() {
            debug!("Nothing to update");
            return false;
        }
        let Some(id) = self.user_id(notifier) else {
            return false;
        };
        match api.update_profile(&id, update).await {
            Ok(stored) => {
                self.merge(stored);
                notifier.success("Profile updated successfully");
                true
            }
            Err(e) => {
                notifier.failure("Failed to update profile", &e);
                false
            }
        }
    }

    pub async fn update_photo(
        &mut self,
        api: &impl SessionApi,
        notifier: &Notifier,
        photo: ImageUpload,
    ) -> bool {
        let Some(id) = self.user_id(notifier) else {
            return false;
        };
        match api.update_photo(&id, photo).await {
            Ok(url) => {
                info!("New profile photo at {}", url);
                self.merge(AuthorFields {
                    photo: Some(url),
                    ..Default::default()
                });
                notifier.success("Profile photo updated successfully");
                true
            }
            Err(e) => {
                notifier.failure("Failed to update profile photo", &e);
                false
            }
        }
    }

    fn user_id(&self, notifier: &Notifier) -> Option<String> {
        let id = self.user.as_ref().and_then(|user| user.id.clone());
        if id.is_none() {
            notifier.error("Please log in to update your profile");
        }
        id
    }

    fn merge(&mut self, stored: AuthorFields) {
        if let Some(user) = self.user.take() {
            let fields = AuthorFields::from(user).overlay(stored);
            self.user = Some(AuthorRef::Resolved(fields).summary());
        }
    }
}
