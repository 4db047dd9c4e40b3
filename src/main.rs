use std::{error::Error, path::Path, sync::Arc};

use feedsync::{
    api::SocialClient,
    config::{Command, Config},
    feed::{FeedView, Outcome},
    inbox::Inbox,
    notify::Notifier,
    post::{ImageUpload, PostPayload},
    session::{ProfileUpdate, Session},
    step,
    store::PostStore,
    utils::{display_cards, display_conversations, flush_notices},
};
use log::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    config.init_logger();
    info!("# Feedsync #");
    info!("");

    let client = SocialClient::new(&config)?;
    let notifier = Arc::new(Notifier::new());

    let command = config.command.clone();
    let result = if command.is_inbox() {
        run_inbox(Inbox::new(client, notifier.clone()), command).await
    } else {
        let session = step!("Checking session", Session::load(&client).await);
        match &session.user {
            Some(user) => info!("Signed in as {} (@{})", user.name, user.username),
            None => info!("Not signed in"),
        }
        if command.is_profile() {
            run_profile(&client, &notifier, session, command).await
        } else {
            let store = Arc::new(PostStore::new(client, notifier.clone()));
            let view = FeedView::new(store);
            view.set_user(session.user).await;
            run_feed(&view, command).await
        }
    };

    flush_notices(&notifier);
    result
}

async fn run_feed(view: &FeedView<SocialClient>, command: Command) -> Result<(), Box<dyn Error>> {
    let store = view.store();
    match command {
        Command::Feed => {
            step!("Loading posts", succeeded(store.load().await, "load posts")?);
        }
        Command::Search { query } => {
            step!("Searching posts", succeeded(store.search(&query).await, "search posts")?);
        }
        Command::Post { content, image } => {
            let payload = payload(content, image.as_deref()).await?;
            step!("Creating post", succeeded(store.create(payload).await, "create post")?);
        }
        Command::Edit {
            post,
            content,
            image,
        } => {
            let payload = payload(content, image.as_deref()).await?;
            step!("Updating post", succeeded(store.update(&post, payload).await, "update post")?);
        }
        Command::Delete { post } => {
            step!("Deleting post", succeeded(store.delete(&post).await, "delete post")?);
            return Ok(());
        }
        Command::RemoveImage { post } => {
            step!("Removing image", succeeded(store.delete_image(&post).await, "remove image")?);
        }
        Command::Like { post } => {
            store.load().await;
            step!("Toggling like", outcome(view.toggle_like(&post).await)?);
        }
        Command::Comments { post } => {
            store.load().await;
            step!("Loading comments", outcome(view.toggle_comments(&post).await)?);
        }
        Command::Comment { post, text } => {
            store.load().await;
            outcome(view.toggle_comment_input(&post).await)?;
            view.set_comment_text(text).await;
            step!("Adding comment", outcome(view.submit_comment(&post).await)?);
        }
        _ => unreachable!("handled by the inbox or the profile"),
    }

    display_cards(&view.render().await);
    Ok(())
}

async fn run_inbox(inbox: Inbox<SocialClient>, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Conversations => {
            succeeded(inbox.fetch_conversations().await, "fetch conversations")?;
            display_conversations(&inbox.conversations().await);
        }
        Command::Messages { user } => {
            succeeded(inbox.fetch_messages(&user).await, "fetch messages")?;
            for message in inbox.messages().await {
                let sender = message.sender.summary();
                info!("{}: {}", sender.id.unwrap_or(sender.name), message.text);
            }
        }
        Command::Send { user, text } => {
            succeeded(inbox.send_message(&user, &text).await, "send message")?;
            info!("Sent");
        }
        Command::Unread => {
            succeeded(inbox.fetch_unread_count().await, "fetch unread count")?;
            info!("{} unread", inbox.unread().await);
        }
        _ => unreachable!("handled by the feed"),
    }
    Ok(())
}

async fn run_profile(
    client: &SocialClient,
    notifier: &Notifier,
    mut session: Session,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    let ok = match command {
        Command::User { id } => {
            let user = Session::fetch_user(client, notifier, &id).await;
            if let Some(user) = &user {
                info!("{} (@{}) {}", user.name, user.username, user.photo);
                if let Some(bio) = &user.bio {
                    info!("{}", bio);
                }
            }
            return succeeded(user.is_some(), "fetch user");
        }
        Command::Bio { text } => session.update_bio(client, notifier, &text).await,
        Command::Profile {
            name,
            username,
            bio,
        } => {
            let update = ProfileUpdate {
                name,
                username,
                bio,
            };
            session.update_profile(client, notifier, &update).await
        }
        Command::Photo { path } => {
            let photo = ImageUpload::read(&path).await?;
            session.update_photo(client, notifier, photo).await
        }
        _ => unreachable!("handled by the feed or the inbox"),
    };
    succeeded(ok, "update profile")
}

async fn payload(content: Option<String>, image: Option<&Path>) -> Result<PostPayload, Box<dyn Error>> {
    if content.is_none() && image.is_none() {
        return Err("a post needs content or an image".into());
    }
    let image = match image {
        Some(path) => Some(ImageUpload::read(path).await?),
        None => None,
    };
    Ok(PostPayload { content, image })
}

fn succeeded(ok: bool, action: &str) -> Result<(), Box<dyn Error>> {
    if ok {
        Ok(())
    } else {
        Err(format!("failed to {}", action).into())
    }
}

fn outcome(outcome: Outcome) -> Result<(), Box<dyn Error>> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Ignored => {
            info!("Nothing to do");
            Ok(())
        }
        Outcome::LoginRequired => Err("this needs a valid session (check SESSION)".into()),
        Outcome::Failed(message) => Err(message.into()),
    }
}
