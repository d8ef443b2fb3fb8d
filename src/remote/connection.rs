use crate::config::Identity;
use crate::error::ResolveError;
use crate::events::Subscription;
use crate::remote::{Channel, EntityChange, Guild, User};
use async_trait::async_trait;
use std::sync::Arc;

pub type ChangeHandler = Box<dyn Fn(&EntityChange) + Send + Sync>;

/// Capability the caches need from a connected chat session.
///
/// Users must be fetched over the network; guilds and channels are
/// enumerable from the session's local registry.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    async fn fetch_user(&self, id: &Identity) -> Result<Arc<User>, ResolveError>;

    fn known_guilds(&self) -> Vec<Arc<Guild>>;

    fn channels_of(&self, guild: &Identity) -> Vec<Arc<Channel>>;

    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription;
}
