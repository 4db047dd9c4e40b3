use std::{
    collections::VecDeque,
    fmt::{self, Display},
    sync::{Mutex, PoisonError},
};

use log::{error, info, warn};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

/// A short-lived, user-facing message (the equivalent of a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.level {
            Level::Success => write!(f, "[ok] {}", self.message),
            Level::Error => write!(f, "[error] {}", self.message),
        }
    }
}

/// Queue of pending notices. Pushing never blocks the caller on a consumer.
#[derive(Debug, Default)]
pub struct Notifier(Mutex<VecDeque<Notice>>);

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.push(Notice {
            level: Level::Success,
            message,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.push(Notice {
            level: Level::Error,
            message,
        });
    }

    /// Reports a failed request: the server's message if it sent one,
    /// `fallback` otherwise.
    pub fn failure(&self, fallback: &str, e: &ApiError) {
        error!("{}: {}", fallback, e);
        let message = e.server_message().unwrap_or(fallback).to_string();
        self.push(Notice {
            level: Level::Error,
            message,
        });
    }

    /// Takes every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    fn push(&self, notice: Notice) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(notice);
    }
}
