//! Remote chat connection as seen by the caches

mod connection;
mod memory;
mod types;

pub use connection::{ChangeHandler, RemoteConnection};
pub use memory::MemoryConnection;
pub use types::{Channel, ChannelKind, EntityChange, Guild, RemoteEntity, User};
