//! Layered, push-invalidated caches between the configuration and the
//! formatted lists
//!
//! - `EntityResolver`: configuration IDs -> live remote handles
//! - `NameProjector`: remote handles -> display names and mention forms
//!
//! Reads are lazy; invalidation flows from the configuration store through
//! the resolver to the projector as `CacheEvent`s.

mod names;
mod resolver;
mod slot;
mod stats;

pub use names::{NameFetch, NameProjector, NameRecord, Names, PendingNames, resolve_all};
pub use resolver::{
    AdminHandles, ChannelHandles, EntityResolver, GuildHandles, ResolverId, UserFetch,
};
pub use slot::{CacheEvent, CacheSlot};
pub use stats::CacheStats;
