//! In-process remote connection
//!
//! Holds users, guilds and channels in memory and notifies subscribers
//! synchronously when an entity is changed. Used for tests and dry runs
//! without a chat session.

use crate::config::Identity;
use crate::error::ResolveError;
use crate::events::{Listeners, Subscription};
use crate::remote::{Channel, ChangeHandler, EntityChange, Guild, RemoteConnection, User};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Default)]
pub struct MemoryConnection {
    users: DashMap<Identity, Arc<User>>,
    guilds: RwLock<IndexMap<Identity, Arc<Guild>>>,
    channels: RwLock<IndexMap<Identity, Arc<Channel>>>,
    failing: DashSet<Identity>,
    listeners: Listeners<EntityChange>,
    fetches: AtomicUsize,
    fetch_delay_ms: AtomicU64,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: impl Into<Identity>, name: impl Into<String>) {
        let id = id.into();
        let user = User {
            id: id.clone(),
            name: name.into(),
        };
        self.users.insert(id, Arc::new(user));
    }

    pub fn add_guild(&self, id: impl Into<Identity>, name: impl Into<String>) {
        let id = id.into();
        let guild = Guild {
            id: id.clone(),
            name: name.into(),
            available: true,
        };
        write(&self.guilds).insert(id, Arc::new(guild));
    }

    pub fn add_channel(&self, channel: Channel) {
        write(&self.channels).insert(channel.id.clone(), Arc::new(channel));
    }

    /// Make fetches of `id` fail with a remote error
    pub fn fail_user(&self, id: impl Into<Identity>) {
        self.failing.insert(id.into());
    }

    pub fn restore_user(&self, id: &Identity) {
        self.failing.remove(id);
    }

    /// Delay every fetch, keeping it in flight across await points
    pub fn set_fetch_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.fetch_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of `fetch_user` calls issued so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn rename_channel(&self, id: &Identity, name: impl Into<String>) {
        let updated = {
            let mut channels = write(&self.channels);
            let Some(channel) = channels.get_mut(id) else {
                return;
            };
            let mut renamed = Channel::clone(channel);
            renamed.name = name.into();
            *channel = Arc::new(renamed);
            channel.clone()
        };
        self.listeners.emit(&EntityChange::ChannelUpdated(updated));
    }

    pub fn rename_guild(&self, id: &Identity, name: impl Into<String>) {
        let name = name.into();
        self.update_guild(id, |guild| guild.name = name);
    }

    pub fn set_guild_available(&self, id: &Identity, available: bool) {
        self.update_guild(id, |guild| guild.available = available);
    }

    fn update_guild(&self, id: &Identity, f: impl FnOnce(&mut Guild)) {
        let updated = {
            let mut guilds = write(&self.guilds);
            let Some(guild) = guilds.get_mut(id) else {
                return;
            };
            let mut changed = Guild::clone(guild);
            f(&mut changed);
            *guild = Arc::new(changed);
            guild.clone()
        };
        self.listeners.emit(&EntityChange::GuildUpdated(updated));
    }
}

#[async_trait]
impl RemoteConnection for MemoryConnection {
    async fn fetch_user(&self, id: &Identity) -> Result<Arc<User>, ResolveError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }

        if self.failing.contains(id) {
            return Err(ResolveError::Remote {
                id: id.to_string(),
                message: "simulated outage".to_string(),
            });
        }

        self.users
            .get(id)
            .map(|user| user.clone())
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))
    }

    fn known_guilds(&self) -> Vec<Arc<Guild>> {
        read(&self.guilds).values().cloned().collect()
    }

    fn channels_of(&self, guild: &Identity) -> Vec<Arc<Channel>> {
        read(&self.channels)
            .values()
            .filter(|channel| channel.guild == *guild)
            .cloned()
            .collect()
    }

    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription {
        self.listeners.subscribe(handler)
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ChannelKind;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_fetch_user() {
        let conn = MemoryConnection::new();
        conn.add_user("U1", "alice");

        let user = conn.fetch_user(&Identity::from("U1")).await.unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(
            conn.fetch_user(&Identity::from("U2")).await,
            Err(ResolveError::NotFound("U2".to_string()))
        );
        assert_eq!(conn.fetch_count(), 2);
    }

    #[test]
    fn test_rename_channel_notifies() {
        let conn = MemoryConnection::new();
        conn.add_guild("G1", "Home");
        conn.add_channel(Channel {
            id: Identity::from("C1"),
            guild: Identity::from("G1"),
            name: "general".to_string(),
            kind: ChannelKind::Text,
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = conn.subscribe_changes(Box::new(move |change| {
            if let EntityChange::ChannelUpdated(channel) = change {
                sink.lock().unwrap().push(channel.name.clone());
            }
        }));

        conn.rename_channel(&Identity::from("C1"), "random");
        assert_eq!(*seen.lock().unwrap(), vec!["random"]);
        assert_eq!(conn.channels_of(&Identity::from("G1"))[0].name, "random");
    }
}
