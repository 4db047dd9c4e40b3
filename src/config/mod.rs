pub mod command;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use dotenv::dotenv;

pub use command::Command;

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Config {
    /// Your `token` session cookie
    #[clap(env = "SESSION")]
    session: String,
    /// Base url of the backend
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:4000")]
    backend_url: String,
    /// Limit request concurrency
    #[arg(long, default_value = "5")]
    limit: usize,
    /// Retry transient failures of read requests this many times
    #[arg(long, default_value = "0")]
    retries: u32,
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Parse the configuration from the environment and command line arguments
    pub fn parse() -> Self {
        dotenv().ok();
        <Self as Parser>::parse()
    }
    /// Create a logger with the configured verbosity level
    pub fn init_logger(&self) {
        env_logger::Builder::new()
            .filter_level(self.verbose.log_level_filter())
            .format_target(false)
            .format_timestamp(None)
            .init();
    }
    /// Get the session cookie
    pub fn session(&self) -> String {
        if self.session.starts_with("token=") {
            self.session.clone()
        } else {
            format!("token={}", self.session)
        }
    }
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }
    pub const fn limit(&self) -> usize {
        self.limit
    }
    pub const fn retries(&self) -> u32 {
        self.retries
    }
}
