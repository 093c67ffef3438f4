//! microboard - a tiny public message board
//!
//! This library provides a durable, concurrency-safe store for short text
//! messages (1-140 characters) together with the HTTP server and CLI that
//! expose it.

pub mod board;

pub use board::{MessageStore, Message, Stats, SortOrder, StoreError};
