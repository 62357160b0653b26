//! Realtime payment status hub

mod client;
pub mod protocol;
mod sse;
mod subscriber;

pub use client::{HubClient, HubConnection};
pub use sse::SseDecoder;
pub use subscriber::StatusSubscriber;
