mod client;
mod extract;

pub use client::{CompletionClient, CompletionError};
pub use extract::extract_response_text;
