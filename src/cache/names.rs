//! Display names derived from resolved remote handles
//!
//! The name cache belongs to the resolver, not to a projector: every
//! `NameProjector` built over the same `EntityResolver` shares one cache
//! through a registry keyed by `ResolverId`.

use crate::cache::resolver::{EntityResolver, ResolverId, lock};
use crate::cache::slot::{CacheEvent, CacheSlot};
use crate::cache::stats::{CacheStats, StatsCounter};
use crate::config::Identity;
use crate::error::ResolveError;
use crate::events::{Listeners, Subscription};
use crate::remote::RemoteEntity;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, Weak};

/// Display name and mention form of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub display_name: String,
    pub mention_form: String,
}

impl NameRecord {
    pub fn from_entity(entity: &impl RemoteEntity) -> Self {
        Self {
            display_name: entity.short_name().to_string(),
            mention_form: entity.reference_form(),
        }
    }
}

pub type NameFetch = Shared<BoxFuture<'static, Result<NameRecord, ResolveError>>>;

/// ID -> name, resolved
pub type Names = Arc<IndexMap<Identity, NameRecord>>;

/// ID -> name, still awaiting remote fetches
pub type PendingNames = Arc<IndexMap<Identity, NameFetch>>;

static REGISTRY: LazyLock<DashMap<ResolverId, Weak<NameCache>>> = LazyLock::new(DashMap::new);

struct NameCache {
    admins: Mutex<CacheSlot<PendingNames>>,
    guilds: Mutex<CacheSlot<Names>>,
    channels: Mutex<HashMap<Identity, CacheSlot<Names>>>,
    listeners: Listeners<CacheEvent>,
    stats: StatsCounter,
    _subscription: Subscription,
}

impl NameCache {
    fn attach(resolver: &EntityResolver) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let this = this.clone();
            let subscription = resolver.subscribe(move |event| {
                if let Some(cache) = this.upgrade() {
                    cache.on_resolver_event(event);
                }
            });

            Self {
                admins: Mutex::new(CacheSlot::new()),
                guilds: Mutex::new(CacheSlot::new()),
                channels: Mutex::new(HashMap::new()),
                listeners: Listeners::new(),
                stats: StatsCounter::default(),
                _subscription: subscription,
            }
        })
    }

    fn on_resolver_event(&self, event: &CacheEvent) {
        tracing::debug!(event = ?event, "Invalidating name cache");
        match event {
            CacheEvent::AdminsModified => {
                lock(&self.admins).invalidate();
            }
            CacheEvent::GuildsModified => {
                // Guild changes may change which channels belong to the set.
                lock(&self.guilds).invalidate();
                self.invalidate_channels(None);
            }
            CacheEvent::ChannelsModified { guild } => self.invalidate_channels(guild.as_ref()),
        }
        self.stats.invalidation();
        self.listeners.emit(event);
    }

    fn invalidate_channels(&self, guild: Option<&Identity>) {
        let mut slots = lock(&self.channels);
        match guild {
            Some(guild) => {
                slots.remove(guild);
            }
            None => slots.clear(),
        }
    }
}

#[derive(Clone)]
pub struct NameProjector {
    resolver: Arc<EntityResolver>,
    cache: Arc<NameCache>,
}

impl NameProjector {
    /// Projector over `resolver`, sharing the cache of any live projector
    /// over the same resolver
    pub fn new(resolver: Arc<EntityResolver>) -> Self {
        let cache = match REGISTRY.entry(resolver.id()) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(cache) => cache,
                None => {
                    let cache = NameCache::attach(&resolver);
                    entry.insert(Arc::downgrade(&cache));
                    cache
                }
            },
            Entry::Vacant(entry) => {
                let cache = NameCache::attach(&resolver);
                entry.insert(Arc::downgrade(&cache));
                cache
            }
        };

        REGISTRY.retain(|_, cache| cache.strong_count() > 0);
        Self { resolver, cache }
    }

    pub fn subscribe(&self, handler: impl Fn(&CacheEvent) + Send + Sync + 'static) -> Subscription {
        self.cache.listeners.subscribe(handler)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats.snapshot()
    }

    /// Admin ID -> pending name, in configuration order
    pub fn admins(&self) -> PendingNames {
        let mut slot = lock(&self.cache.admins);
        if let Some(names) = slot.get() {
            self.cache.stats.hit();
            return names;
        }

        self.cache.stats.miss();
        let names: IndexMap<Identity, NameFetch> = self
            .resolver
            .admins()
            .iter()
            .map(|(id, fetch)| {
                let fetch = fetch.clone();
                let name = async move {
                    let user = fetch.await?;
                    Ok::<_, ResolveError>(NameRecord::from_entity(user.as_ref()))
                }
                .boxed()
                .shared();
                (id.clone(), name)
            })
            .collect();

        let names = Arc::new(names);
        slot.fill(names.clone());
        names
    }

    /// Await every admin name; one failed lookup fails the whole mapping
    pub async fn get_admins(&self) -> Result<Names, ResolveError> {
        resolve_all(self.admins()).await
    }

    pub fn guilds(&self) -> Names {
        let mut slot = lock(&self.cache.guilds);
        if let Some(names) = slot.get() {
            self.cache.stats.hit();
            return names;
        }

        self.cache.stats.miss();
        let names: IndexMap<Identity, NameRecord> = self
            .resolver
            .guilds()
            .iter()
            .map(|(id, guild)| (id.clone(), NameRecord::from_entity(guild.as_ref())))
            .collect();

        tracing::debug!(guilds = names.len(), "Guild names derived");
        let names = Arc::new(names);
        slot.fill(names.clone());
        names
    }

    /// Channel names of a tracked guild; untracked guilds are not cached
    pub fn channels(&self, guild: &Identity) -> Names {
        if !self.resolver.tracks_guild(guild) {
            self.cache.stats.miss();
            return Arc::new(IndexMap::new());
        }

        let mut slots = lock(&self.cache.channels);
        let slot = slots.entry(guild.clone()).or_default();
        if let Some(names) = slot.get() {
            self.cache.stats.hit();
            return names;
        }

        self.cache.stats.miss();
        let names: IndexMap<Identity, NameRecord> = self
            .resolver
            .channels(guild)
            .iter()
            .map(|(id, channel)| (id.clone(), NameRecord::from_entity(channel.as_ref())))
            .collect();

        tracing::debug!(guild_id = %guild, channels = names.len(), "Channel names derived");
        let names = Arc::new(names);
        slot.fill(names.clone());
        names
    }
}

/// Await every pending name, keeping the mapping's order
pub async fn resolve_all(pending: PendingNames) -> Result<Names, ResolveError> {
    let records = futures::future::try_join_all(pending.values().cloned()).await?;
    Ok(Arc::new(pending.keys().cloned().zip(records).collect()))
}
