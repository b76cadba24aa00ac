//! Chat persistence sink — `/api/chats[...]` (spec §6). A small,
//! explicitly-in-scope append-only store distinct from the Vector Store,
//! sharing the same `rusqlite` dependency for consistency with the rest
//! of the persistence layer.

pub mod sqlite;

pub use sqlite::{ChatMessageRecord, ChatStore};
