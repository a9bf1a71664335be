// Core of Playground Saver: continue provider-stored conversations by
// response id.
// - Conversation client and session state
// - Provider boundary and its HTTP implementation
// - Request/response data structures
// - Configuration, history and shared error types

pub mod attachments;
pub use attachments::{ImageRef, mime_for_path};

pub mod client;
pub use client::OpenAiClient;

pub mod config;
pub use config::*;

pub mod conversation;
pub use conversation::*;

pub mod errors;
pub use errors::*;

pub mod history;
pub use history::{HistoryEntry, HistoryLog};

pub mod models;

pub mod provider;
pub use provider::{ResponsesApi, ResponsesApiRef};

pub mod session;
pub use session::SessionState;

pub mod types;
pub use types::*;
