// Message board: store, persistence and the HTTP/CLI surfaces around it
//
// The store owns the message table and its JSON snapshot; everything else
// in this module is a thin layer that turns requests into store calls.

pub mod error;
pub mod message;
pub mod storage;
pub mod store;
pub mod admin;
pub mod http;
pub mod cli;
pub mod commands;

pub use error::{PersistenceError, StoreError, StoreResult, ValidationError};
pub use message::{Message, SortOrder, Stats, MAX_CONTENT_CHARS};
pub use storage::{MessageTable, TableFile};
pub use store::MessageStore;
pub use admin::AdminKey;
pub use http::HttpContext;
pub use cli::{MicroboardCli, MicroboardCommand};
pub use commands::execute_command;
