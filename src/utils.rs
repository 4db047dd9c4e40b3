use crate::{feed::PostCard, message::Conversation, notify::Notifier, post::AuthorRef};

#[macro_export]
macro_rules! step {
  ($name:expr, $($tail:tt)*) => {
    {
      log::info!("* {}", $name);
      let now = std::time::Instant::now();
      let value = $($tail)*;
      log::debug!("Done  `{}` ({} ms)", $name, now.elapsed().as_millis());
      value
    }
  };
}

pub fn display_cards(cards: &[PostCard]) {
    if !log::log_enabled!(log::Level::Info) {
        return;
    }
    if cards.is_empty() {
        log::info!("No posts yet");
        return;
    }

    for card in cards {
        let when = card
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        log::info!("+-[ {} ]- {} (@{}) {}", card.id, card.author.name, card.author.username, when);
        if let Some(content) = &card.content {
            for line in content.lines() {
                log::info!("| {}", line);
            }
        }
        if let Some(image) = &card.image {
            log::info!("| [image] {}", image);
        }
        log::info!(
            "| {} {} likes, {} comments",
            if card.liked { "♥" } else { "♡" },
            card.like_count,
            card.comment_count
        );
        if card.comments_visible {
            for comment in &card.comments {
                log::info!("|   {}: {}", comment.author.name, comment.content);
            }
        }
        log::info!("+-------- - -");
    }
}

pub fn display_conversations(conversations: &[Conversation]) {
    for conversation in conversations {
        let participants: Vec<String> = conversation
            .participants
            .iter()
            .map(|participant| match participant {
                AuthorRef::Unresolved(id) => id.clone(),
                resolved => resolved.summary().name,
            })
            .collect();
        log::info!(
            "{} [{}] {}",
            conversation.id,
            participants.join(", "),
            conversation.last_text().unwrap_or("")
        );
    }
}

pub fn flush_notices(notifier: &Notifier) {
    for notice in notifier.drain() {
        log::debug!("notice: {}", notice);
    }
}
