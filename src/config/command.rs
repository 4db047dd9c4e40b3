use std::path::PathBuf;

use clap::Subcommand;

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Show the feed
    Feed,
    /// Search posts and show the matches
    Search { query: String },
    /// Create a post
    Post {
        #[arg(short, long)]
        content: Option<String>,
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Edit a post
    Edit {
        post: String,
        #[arg(short, long)]
        content: Option<String>,
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Delete a post
    Delete { post: String },
    /// Remove the image of a post
    RemoveImage { post: String },
    /// Like or unlike a post
    Like { post: String },
    /// Show the comments of a post
    Comments { post: String },
    /// Comment on a post
    Comment { post: String, text: String },
    /// List conversations
    Conversations,
    /// Show the messages exchanged with a user
    Messages { user: String },
    /// Send a direct message
    Send { user: String, text: String },
    /// Show the number of unread messages
    Unread,
    /// Show a user's profile
    User { id: String },
    /// Change your bio
    Bio { text: String },
    /// Change your name or username
    Profile {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        bio: Option<String>,
    },
    /// Upload a new profile photo
    Photo { path: PathBuf },
}

impl Command {
    pub fn is_inbox(&self) -> bool {
        matches!(
            self,
            Command::Conversations | Command::Messages { .. } | Command::Send { .. } | Command::Unread
        )
    }

    pub fn is_profile(&self) -> bool {
        matches!(
            self,
            Command::User { .. } | Command::Bio { .. } | Command::Profile { .. } | Command::Photo { .. }
        )
    }
}
