pub mod error;
pub mod types;
pub mod config;
pub mod session;
pub mod provider;
pub mod gateway;
pub mod service;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");
pub const SERVICE_NAME: &str = "chat-mvp";
