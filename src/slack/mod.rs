mod client;
mod events;

pub use client::{OutboundReply, SlackClient, SlackError};
pub use events::{url_verification_challenge, MessageEvent};
