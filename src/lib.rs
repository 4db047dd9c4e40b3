pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod inbox;
pub mod message;
pub mod notify;
pub mod post;
pub mod session;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test;

pub use error::{ApiError, Result};
