pub mod chat;

#[cfg(feature = "http-api")]
pub mod http;

pub use chat::ChatService;
