//! Live remote handles for the configured admins, guilds and channels
//!
//! Each result set is memoized in its own `CacheSlot` and derived lazily on
//! first read:
//! - admins: one fetch per admin ID, stored as a shared in-flight future so
//!   concurrent readers attach to the same request,
//! - guilds / channels: filtered synchronously from the connection's registry.
//!
//! Slots are cleared when the configuration changes or when the connection
//! reports a change to a tracked guild or channel. Every invalidation is
//! re-emitted as a `CacheEvent` for the name layer.

use crate::cache::slot::{CacheEvent, CacheSlot};
use crate::cache::stats::{CacheStats, StatsCounter};
use crate::config::{Category, ConfigEvent, ConfigStore, Identity};
use crate::error::ResolveError;
use crate::events::{Listeners, Subscription};
use crate::logging::{Timer, log_error};
use crate::remote::{Channel, EntityChange, Guild, RemoteConnection, User};
use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

/// In-flight or completed user fetch, shared by every reader
pub type UserFetch = Shared<BoxFuture<'static, Result<Arc<User>, ResolveError>>>;

pub type AdminHandles = Arc<IndexMap<Identity, UserFetch>>;
pub type GuildHandles = Arc<IndexMap<Identity, Arc<Guild>>>;
pub type ChannelHandles = Arc<IndexMap<Identity, Arc<Channel>>>;

/// Stable identity of a resolver (its config + connection pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolverId(Uuid);

pub struct EntityResolver {
    id: ResolverId,
    this: Weak<EntityResolver>,
    config: Arc<ConfigStore>,
    connection: Arc<dyn RemoteConnection>,
    admins: Mutex<CacheSlot<AdminHandles>>,
    guilds: Mutex<CacheSlot<GuildHandles>>,
    channels: Mutex<HashMap<Identity, CacheSlot<ChannelHandles>>>,
    listeners: Listeners<CacheEvent>,
    stats: StatsCounter,
    _subscriptions: Vec<Subscription>,
}

impl EntityResolver {
    pub fn new(config: Arc<ConfigStore>, connection: Arc<dyn RemoteConnection>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let on_config = {
                let this = this.clone();
                config.subscribe(move |event| {
                    if let Some(resolver) = this.upgrade() {
                        resolver.on_config_event(event);
                    }
                })
            };
            let on_remote = {
                let this = this.clone();
                connection.subscribe_changes(Box::new(move |change| {
                    if let Some(resolver) = this.upgrade() {
                        resolver.on_entity_change(change);
                    }
                }))
            };

            let id = ResolverId(Uuid::new_v4());
            tracing::debug!(resolver = ?id, "Entity resolver created");

            Self {
                id,
                this: this.clone(),
                config,
                connection,
                admins: Mutex::new(CacheSlot::new()),
                guilds: Mutex::new(CacheSlot::new()),
                channels: Mutex::new(HashMap::new()),
                listeners: Listeners::new(),
                stats: StatsCounter::default(),
                _subscriptions: vec![on_config, on_remote],
            }
        })
    }

    pub fn id(&self) -> ResolverId {
        self.id
    }

    pub fn subscribe(&self, handler: impl Fn(&CacheEvent) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(handler)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Admin ID -> pending user fetch, in configuration order
    pub fn admins(&self) -> AdminHandles {
        let mut slot = lock(&self.admins);
        if let Some(handles) = slot.get() {
            self.stats.hit();
            tracing::trace!(admins = handles.len(), "Admin handles cache hit");
            return handles;
        }

        self.stats.miss();
        let generation = slot.generation();
        let handles: IndexMap<Identity, UserFetch> = self
            .config
            .admins()
            .into_iter()
            .map(|id| {
                let fetch = self.fetch_user(id.clone(), generation);
                (id, fetch)
            })
            .collect();

        tracing::debug!(
            admins = handles.len(),
            generation = generation,
            "Admin handles cache miss, fetches queued"
        );

        // The slot is claimed before anyone awaits a fetch.
        let handles = Arc::new(handles);
        slot.fill(handles.clone());
        handles
    }

    /// Await every admin; fails if any single fetch fails
    pub async fn resolve_admins(&self) -> Result<IndexMap<Identity, Arc<User>>, ResolveError> {
        let handles = self.admins();
        let users = futures::future::try_join_all(handles.values().cloned()).await?;
        Ok(handles.keys().cloned().zip(users).collect())
    }

    pub fn tracks_guild(&self, guild: &Identity) -> bool {
        self.config.has_guild(guild)
    }

    /// Guilds known to the connection and tracked in the configuration
    pub fn guilds(&self) -> GuildHandles {
        let mut slot = lock(&self.guilds);
        if let Some(guilds) = slot.get() {
            self.stats.hit();
            return guilds;
        }

        self.stats.miss();
        let guilds: IndexMap<Identity, Arc<Guild>> = self
            .connection
            .known_guilds()
            .into_iter()
            .filter(|guild| self.config.has_guild(&guild.id))
            .map(|guild| (guild.id.clone(), guild))
            .collect();

        tracing::debug!(guilds = guilds.len(), "Guild handles derived");
        let guilds = Arc::new(guilds);
        slot.fill(guilds.clone());
        guilds
    }

    /// Text channels of `guild` that are tracked in the configuration
    ///
    /// Untracked guilds get an empty set that is not cached.
    pub fn channels(&self, guild: &Identity) -> ChannelHandles {
        if !self.tracks_guild(guild) {
            self.stats.miss();
            tracing::trace!(guild_id = %guild, "Channel lookup for untracked guild");
            return Arc::new(IndexMap::new());
        }

        let mut slots = lock(&self.channels);
        let slot = slots.entry(guild.clone()).or_default();
        if let Some(channels) = slot.get() {
            self.stats.hit();
            return channels;
        }

        self.stats.miss();
        let channels: IndexMap<Identity, Arc<Channel>> = self
            .connection
            .channels_of(guild)
            .into_iter()
            .filter(|channel| channel.is_text() && self.config.has_channel(guild, &channel.id))
            .map(|channel| (channel.id.clone(), channel))
            .collect();

        tracing::debug!(guild_id = %guild, channels = channels.len(), "Channel handles derived");
        let channels = Arc::new(channels);
        slot.fill(channels.clone());
        channels
    }

    fn fetch_user(&self, id: Identity, generation: u64) -> UserFetch {
        let connection = self.connection.clone();
        let this = self.this.clone();

        async move {
            let timer = Timer::new("fetch_user", id.to_string());
            let result = connection.fetch_user(&id).await;

            if let Some(resolver) = this.upgrade() {
                resolver.stats.fetch();
                match &result {
                    Ok(user) => tracing::info!(
                        admin_id = %id,
                        user = %user.name,
                        duration_ms = timer.elapsed_ms(),
                        "Fetched admin user"
                    ),
                    Err(e) => {
                        resolver.stats.fetch_error();
                        log_error("fetch_user", id.as_str(), e);
                        // Forget the failed fetch so the next read retries it.
                        resolver.invalidate_admins_from(generation);
                    }
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    fn on_config_event(&self, event: &ConfigEvent) {
        let ConfigEvent::Modified { category, action } = event else {
            return;
        };
        tracing::debug!(category = ?category, action = ?action, "Configuration modified");

        match category {
            Category::Admins => self.invalidate_admins(),
            Category::Guilds => {
                self.invalidate_guilds();
                self.invalidate_channels(None);
            }
            Category::Channels => self.invalidate_channels(None),
        }
    }

    fn on_entity_change(&self, change: &EntityChange) {
        match change {
            EntityChange::ChannelUpdated(channel) => {
                let guild_tracked = self.config.has_guild(&channel.guild);
                let guild_available = self
                    .connection
                    .known_guilds()
                    .iter()
                    .any(|guild| guild.id == channel.guild && guild.is_available());

                if guild_tracked && guild_available {
                    tracing::debug!(
                        guild_id = %channel.guild,
                        channel_id = %channel.id,
                        "Tracked channel updated remotely"
                    );
                    self.invalidate_channels(Some(&channel.guild));
                } else {
                    tracing::trace!(channel_id = %channel.id, "Ignoring untracked channel update");
                }
            }
            EntityChange::GuildUpdated(guild) => {
                if guild.is_available() && self.config.has_guild(&guild.id) {
                    tracing::debug!(guild_id = %guild.id, "Tracked guild updated remotely");
                    self.invalidate_guilds();
                } else {
                    tracing::trace!(guild_id = %guild.id, "Ignoring untracked guild update");
                }
            }
        }
    }

    fn invalidate_admins(&self) {
        lock(&self.admins).invalidate();
        self.stats.invalidation();
        self.listeners.emit(&CacheEvent::AdminsModified);
    }

    fn invalidate_admins_from(&self, generation: u64) {
        let cleared = lock(&self.admins).invalidate_if(generation);
        if cleared {
            self.stats.invalidation();
            self.listeners.emit(&CacheEvent::AdminsModified);
        }
    }

    fn invalidate_guilds(&self) {
        lock(&self.guilds).invalidate();
        self.stats.invalidation();
        self.listeners.emit(&CacheEvent::GuildsModified);
    }

    fn invalidate_channels(&self, guild: Option<&Identity>) {
        {
            let mut slots = lock(&self.channels);
            match guild {
                Some(guild) => {
                    slots.remove(guild);
                }
                None => slots.clear(),
            }
        }
        self.stats.invalidation();
        self.listeners.emit(&CacheEvent::ChannelsModified {
            guild: guild.cloned(),
        });
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
