pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod lists;
pub mod logging;
pub mod remote;
pub mod secrets;
pub mod slack;

pub use error::{ArchiveBotError, Result};
