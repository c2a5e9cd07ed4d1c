//! External collaborators wrapped by the memo store
//!
//! Both clients are blocking and are built from explicit configuration
//! values; neither keeps global state.

pub mod fetch;
pub mod inference;

pub use fetch::{resolve_url, Fetcher, HttpFetcher};
pub use inference::{parse_json_reply, ChatModel, OpenAiChatClient};
