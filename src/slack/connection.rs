//! Slack workspace as a remote connection
//!
//! A Slack bot token is scoped to one workspace, so the workspace is exposed
//! as the connection's only guild. Guild and channel registries are a local
//! snapshot refreshed from the Web API; changes between snapshots are
//! reported to subscribers like push updates.

use crate::config::{Identity, SlackConfig};
use crate::error::{ResolveError, Result};
use crate::events::{Listeners, Subscription};
use crate::logging::log_error;
use crate::remote::{Channel, ChangeHandler, EntityChange, Guild, RemoteConnection, User};
use crate::slack::SlackClient;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct SlackConnection {
    client: SlackClient,
    registry: Registry,
}

impl SlackConnection {
    /// Connect and take the first registry snapshot
    pub async fn connect(client: SlackClient, workspace: &SlackConfig) -> Result<Self> {
        let guild = Guild {
            id: Identity::from(workspace.team_id.as_str()),
            name: workspace.team_name.clone(),
            available: true,
        };
        let connection = Self {
            client,
            registry: Registry::new(guild),
        };

        connection.refresh().await?;
        Ok(connection)
    }

    pub fn guild(&self) -> Arc<Guild> {
        self.registry.guild()
    }

    /// Re-list the workspace's conversations and report what changed.
    ///
    /// A failed listing marks the workspace unavailable until the next
    /// successful refresh. Returns the number of changed channels.
    pub async fn refresh(&self) -> Result<usize> {
        let guild = self.guild();
        match self.client.list_channels(&guild.id).await {
            Ok(listed) => Ok(self.registry.apply_listing(listed)),
            Err(e) => {
                log_error("list_channels", guild.id.as_str(), &e);
                self.registry.set_available(false);
                Err(e)
            }
        }
    }
}

/// Local snapshot of the workspace guild and its channels
struct Registry {
    guild: RwLock<Arc<Guild>>,
    channels: RwLock<IndexMap<Identity, Arc<Channel>>>,
    listeners: Listeners<EntityChange>,
}

impl Registry {
    fn new(guild: Guild) -> Self {
        Self {
            guild: RwLock::new(Arc::new(guild)),
            channels: RwLock::new(IndexMap::new()),
            listeners: Listeners::new(),
        }
    }

    fn guild(&self) -> Arc<Guild> {
        self.guild
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the channel snapshot, marking the guild available again.
    /// Returns the number of changed channels.
    fn apply_listing(&self, listed: Vec<Channel>) -> usize {
        let listed: IndexMap<Identity, Arc<Channel>> = listed
            .into_iter()
            .map(|channel| (channel.id.clone(), Arc::new(channel)))
            .collect();

        let changed = {
            let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            let changed = changed_channels(&channels, &listed);
            *channels = listed;
            changed
        };

        tracing::info!(
            guild_id = %self.guild().id,
            changed = changed.len(),
            "Workspace channels refreshed"
        );

        self.set_available(true);
        for channel in &changed {
            self.listeners.emit(&EntityChange::ChannelUpdated(channel.clone()));
        }
        changed.len()
    }

    fn set_available(&self, available: bool) {
        let updated = {
            let mut guild = self.guild.write().unwrap_or_else(PoisonError::into_inner);
            if guild.available == available {
                return;
            }
            let mut changed = Guild::clone(&guild);
            changed.available = available;
            *guild = Arc::new(changed);
            guild.clone()
        };

        tracing::warn!(guild_id = %updated.id, available, "Workspace availability changed");
        self.listeners.emit(&EntityChange::GuildUpdated(updated));
    }

    fn channels_of(&self, guild: &Identity) -> Vec<Arc<Channel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|channel| channel.guild == *guild)
            .cloned()
            .collect()
    }
}

/// Channels added, renamed or removed between two snapshots
fn changed_channels(
    before: &IndexMap<Identity, Arc<Channel>>,
    after: &IndexMap<Identity, Arc<Channel>>,
) -> Vec<Arc<Channel>> {
    let updated = after
        .values()
        .filter(|channel| before.get(&channel.id) != Some(*channel));
    let removed = before
        .values()
        .filter(|channel| !after.contains_key(&channel.id));

    updated.chain(removed).cloned().collect()
}

#[async_trait]
impl RemoteConnection for SlackConnection {
    async fn fetch_user(&self, id: &Identity) -> std::result::Result<Arc<User>, ResolveError> {
        self.client
            .get_user_info(id.as_str())
            .await
            .map(Arc::new)
            .map_err(|e| ResolveError::Remote {
                id: id.to_string(),
                message: e.to_string(),
            })
    }

    fn known_guilds(&self) -> Vec<Arc<Guild>> {
        vec![self.guild()]
    }

    fn channels_of(&self, guild: &Identity) -> Vec<Arc<Channel>> {
        self.registry.channels_of(guild)
    }

    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription {
        self.registry.listeners.subscribe(handler)
    }
}
