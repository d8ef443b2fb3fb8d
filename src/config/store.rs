//! Authoritative, mutable bot configuration
//!
//! `ConfigStore` is the only writer of admins and guild -> channel memberships.
//! Every effective mutation:
//! - bumps the store generation,
//! - issues a background write of the full configuration (not awaited),
//! - emits its specific event and the coalesced `Modified` event synchronously
//!   before the mutator returns.
//!
//! Mutations that change nothing (re-adding an admin, deleting an absent
//! channel) neither write nor emit. Persistence failures are reported as
//! `ConfigEvent::PersistenceFailed` and never roll back memory.

use crate::config::persistence::ConfigPersistence;
use crate::config::{Action, ChannelSet, ConfigData, ConfigEvent, Identity};
use crate::error::{ConfigError, PersistenceError};
use crate::events::{Listeners, Subscription};
use crate::logging::{Timer, log_error};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct State {
    data: ConfigData,
    generation: u64,
}

pub struct ConfigStore {
    state: RwLock<State>,
    persistence: Arc<dyn ConfigPersistence>,
    listeners: Arc<Listeners<ConfigEvent>>,
    /// Generation of the last snapshot successfully written
    last_written: Arc<tokio::sync::Mutex<u64>>,
}

impl ConfigStore {
    /// Load the configuration; failure here is fatal for the process
    pub async fn load(persistence: Arc<dyn ConfigPersistence>) -> Result<Self, ConfigError> {
        let _timer = Timer::new("load_config", persistence.location());
        let data = persistence.read().await?;

        tracing::info!(
            location = %persistence.location(),
            admins = data.admins.len(),
            guilds = data.guild_channels.len(),
            "Configuration loaded"
        );

        Ok(Self::from_data(data, persistence))
    }

    /// Build a store from already-validated data
    pub fn from_data(data: ConfigData, persistence: Arc<dyn ConfigPersistence>) -> Self {
        Self {
            state: RwLock::new(State {
                data,
                generation: 0,
            }),
            persistence,
            listeners: Arc::new(Listeners::new()),
            last_written: Arc::new(tokio::sync::Mutex::new(0)),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&ConfigEvent) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(handler)
    }

    pub fn admins(&self) -> Vec<Identity> {
        self.read().data.admins.iter().cloned().collect()
    }

    pub fn guilds(&self) -> IndexMap<Identity, ChannelSet> {
        self.read().data.guild_channels.clone()
    }

    pub fn channels(&self, guild: &Identity) -> Option<ChannelSet> {
        self.read().data.guild_channels.get(guild).cloned()
    }

    pub fn secrets_locator(&self) -> String {
        self.read().data.secrets_locator.clone()
    }

    pub fn has_admin(&self, admin: &Identity) -> bool {
        self.read().data.admins.contains(admin)
    }

    pub fn has_guild(&self, guild: &Identity) -> bool {
        self.read().data.guild_channels.contains_key(guild)
    }

    pub fn has_channel(&self, guild: &Identity, channel: &Identity) -> bool {
        self.read()
            .data
            .guild_channels
            .get(guild)
            .is_some_and(|channels| channels.contains(channel))
    }

    pub fn snapshot(&self) -> ConfigData {
        self.read().data.clone()
    }

    /// Number of effective mutations since load
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn add_admin(&self, admin: impl Into<Identity>) -> bool {
        let admin = admin.into();
        self.mutate(|data| {
            if data.admins.insert(admin.clone()) {
                vec![ConfigEvent::AdminAdded(admin)]
            } else {
                Vec::new()
            }
        })
    }

    pub fn delete_admin(&self, admin: &Identity) -> bool {
        self.mutate(|data| {
            if data.admins.shift_remove(admin) {
                vec![ConfigEvent::AdminDeleted(admin.clone())]
            } else {
                Vec::new()
            }
        })
    }

    /// Add a guild, replacing any channel set it already had.
    ///
    /// Channels currently tracked under another guild are moved.
    pub fn add_guild<I>(&self, guild: impl Into<Identity>, channels: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
    {
        let guild = guild.into();
        let channels: ChannelSet = channels.into_iter().map(Into::into).collect();

        self.mutate(|data| {
            if data.guild_channels.get(&guild) == Some(&channels) {
                return Vec::new();
            }

            let mut events = detach_channels(data, &guild, &channels);
            if let Some(old) = data.guild_channels.shift_remove(&guild) {
                events.extend(guild_deleted(&guild, old));
            }
            data.guild_channels.insert(guild.clone(), channels.clone());
            events.extend(guild_added(&guild, channels));
            events
        })
    }

    pub fn delete_guild(&self, guild: &Identity) -> bool {
        self.mutate(|data| match data.guild_channels.shift_remove(guild) {
            Some(old) => guild_deleted(guild, old),
            None => Vec::new(),
        })
    }

    /// Add a channel to a guild, creating the guild if it is unknown
    pub fn add_channel(&self, guild: impl Into<Identity>, channel: impl Into<Identity>) -> bool {
        let guild = guild.into();
        let channel = channel.into();

        if !self.has_guild(&guild) {
            return self.add_guild(guild, [channel]);
        }

        self.mutate(|data| {
            if data
                .guild_channels
                .get(&guild)
                .is_some_and(|channels| channels.contains(&channel))
            {
                return Vec::new();
            }

            let mut events = detach_channels(data, &guild, &ChannelSet::from([channel.clone()]));
            data.guild_channels
                .entry(guild.clone())
                .or_default()
                .insert(channel.clone());
            events.push(ConfigEvent::ChannelAdded { guild, channel });
            events
        })
    }

    pub fn delete_channel(&self, guild: &Identity, channel: &Identity) -> bool {
        self.mutate(|data| {
            let removed = data
                .guild_channels
                .get_mut(guild)
                .is_some_and(|channels| channels.shift_remove(channel));
            if removed {
                vec![ConfigEvent::ChannelDeleted {
                    guild: guild.clone(),
                    channel: channel.clone(),
                }]
            } else {
                Vec::new()
            }
        })
    }

    /// Write the current configuration and wait for the result
    pub async fn save(&self) -> Result<(), Arc<PersistenceError>> {
        let (snapshot, generation) = self.snapshot_with_generation();
        write_snapshot(
            self.persistence.clone(),
            self.listeners.clone(),
            self.last_written.clone(),
            snapshot,
            generation,
        )
        .await
    }

    fn mutate(&self, f: impl FnOnce(&mut ConfigData) -> Vec<ConfigEvent>) -> bool {
        let events = {
            let mut state = self.write();
            let events = f(&mut state.data);
            if !events.is_empty() {
                state.generation += 1;
            }
            events
        };

        if events.is_empty() {
            return false;
        }

        self.persist();
        for event in events {
            self.emit(event);
        }
        true
    }

    fn emit(&self, event: ConfigEvent) {
        tracing::debug!(event = event.name(), args = ?event, "Config event emitted");
        self.listeners.emit(&event);

        if let Some((category, action)) = event.coalesced() {
            let modified = ConfigEvent::Modified { category, action };
            tracing::debug!(event = modified.name(), action = ?action, "Config event emitted");
            self.listeners.emit(&modified);
        }
    }

    /// Issue a background write of the current state
    fn persist(&self) {
        let (snapshot, generation) = self.snapshot_with_generation();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                generation = generation,
                "No async runtime available, configuration not persisted"
            );
            return;
        };

        runtime.spawn(write_snapshot(
            self.persistence.clone(),
            self.listeners.clone(),
            self.last_written.clone(),
            snapshot,
            generation,
        ));
    }

    fn snapshot_with_generation(&self) -> (ConfigData, u64) {
        let state = self.read();
        (state.data.clone(), state.generation)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Remove `channels` from every guild other than `target`
fn detach_channels(data: &mut ConfigData, target: &Identity, channels: &ChannelSet) -> Vec<ConfigEvent> {
    let mut events = Vec::new();
    for (guild, tracked) in data.guild_channels.iter_mut() {
        if guild == target {
            continue;
        }
        for channel in channels {
            if tracked.shift_remove(channel) {
                events.push(ConfigEvent::ChannelDeleted {
                    guild: guild.clone(),
                    channel: channel.clone(),
                });
            }
        }
    }
    events
}

fn guild_added(guild: &Identity, channels: ChannelSet) -> Vec<ConfigEvent> {
    guild_events(guild, channels, Action::Added)
}

fn guild_deleted(guild: &Identity, channels: ChannelSet) -> Vec<ConfigEvent> {
    guild_events(guild, channels, Action::Deleted)
}

/// A guild event followed by one channel event per channel it carried
fn guild_events(guild: &Identity, channels: ChannelSet, action: Action) -> Vec<ConfigEvent> {
    let channels: Vec<Identity> = channels.into_iter().collect();
    let per_channel = channels.iter().map(|channel| match action {
        Action::Added => ConfigEvent::ChannelAdded {
            guild: guild.clone(),
            channel: channel.clone(),
        },
        Action::Deleted => ConfigEvent::ChannelDeleted {
            guild: guild.clone(),
            channel: channel.clone(),
        },
    });

    let head = match action {
        Action::Added => ConfigEvent::GuildAdded {
            guild: guild.clone(),
            channels: channels.clone(),
        },
        Action::Deleted => ConfigEvent::GuildDeleted {
            guild: guild.clone(),
            channels: channels.clone(),
        },
    };

    std::iter::once(head).chain(per_channel).collect()
}

async fn write_snapshot(
    persistence: Arc<dyn ConfigPersistence>,
    listeners: Arc<Listeners<ConfigEvent>>,
    last_written: Arc<tokio::sync::Mutex<u64>>,
    snapshot: ConfigData,
    generation: u64,
) -> Result<(), Arc<PersistenceError>> {
    let mut last = last_written.lock().await;
    if *last >= generation && generation > 0 {
        tracing::debug!(
            generation = generation,
            last_written = *last,
            "Skipping write of superseded configuration"
        );
        return Ok(());
    }

    let location = persistence.location();
    let _timer = Timer::new("save_config", location.clone());

    match persistence.write(&snapshot).await {
        Ok(()) => {
            *last = generation;
            tracing::info!(location = %location, generation = generation, "Configuration saved");
            listeners.emit(&ConfigEvent::Saved {
                at: chrono::Utc::now(),
            });
            Ok(())
        }
        Err(e) => {
            log_error("save_config", &location, &e);
            let error = Arc::new(e);
            listeners.emit(&ConfigEvent::PersistenceFailed(error.clone()));
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::persistence::MemoryStore;
    use crate::config::Category;
    use std::sync::Mutex;

    fn store_with(data: ConfigData) -> (Arc<ConfigStore>, Arc<MemoryStore>) {
        let persistence = Arc::new(MemoryStore::new(data.clone()));
        let store = Arc::new(ConfigStore::from_data(data, persistence.clone()));
        (store, persistence)
    }

    fn record(store: &ConfigStore) -> (Arc<Mutex<Vec<String>>>, Subscription) {
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = names.clone();
        let sub = store.subscribe(move |event| {
            if !matches!(event, ConfigEvent::Saved { .. }) {
                sink.lock().unwrap().push(event.name().to_string());
            }
        });
        (names, sub)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_add_admin_emits_and_persists() {
        let (store, persistence) = store_with(ConfigData::default());
        let (names, _sub) = record(&store);

        assert!(store.add_admin("a1"));
        assert_eq!(*names.lock().unwrap(), vec!["adminAdded", "adminsModified"]);
        assert!(store.has_admin(&Identity::from("a1")));

        settle().await;
        assert_eq!(persistence.write_count(), 1);
        assert!(persistence.stored().unwrap().admins.contains(&Identity::from("a1")));
    }

    #[tokio::test]
    async fn test_noop_mutations_are_silent() {
        let mut data = ConfigData::default();
        data.admins.insert(Identity::from("a1"));
        data.guild_channels
            .insert(Identity::from("g1"), ChannelSet::from([Identity::from("c1")]));
        let (store, persistence) = store_with(data);
        let (names, _sub) = record(&store);

        assert!(!store.delete_admin(&Identity::from("never-added")));
        assert!(!store.add_admin("a1"));
        assert!(!store.add_channel("g1", "c1"));
        assert!(!store.delete_channel(&Identity::from("g1"), &Identity::from("c9")));
        assert!(!store.delete_guild(&Identity::from("g9")));
        assert!(!store.add_guild("g1", ["c1"]));

        settle().await;
        assert!(names.lock().unwrap().is_empty());
        assert_eq!(persistence.write_count(), 0);
        assert_eq!(store.generation(), 0);
    }

    #[tokio::test]
    async fn test_add_guild_replaces_channels() {
        let (store, _) = store_with(ConfigData::default());
        store.add_guild("g", ["c1"]);
        store.add_guild("g", ["c2"]);

        let channels = store.channels(&Identity::from("g")).unwrap();
        assert_eq!(channels, ChannelSet::from([Identity::from("c2")]));
        assert!(!store.has_channel(&Identity::from("g"), &Identity::from("c1")));
    }

    #[tokio::test]
    async fn test_add_channel_creates_unknown_guild() {
        let (store, _) = store_with(ConfigData::default());
        let (names, _sub) = record(&store);

        assert!(store.add_channel("g", "c"));
        assert!(store.has_guild(&Identity::from("g")));
        assert!(store.has_channel(&Identity::from("g"), &Identity::from("c")));
        assert_eq!(
            *names.lock().unwrap(),
            vec!["guildAdded", "guildsModified", "channelAdded", "channelsModified"]
        );
    }

    #[tokio::test]
    async fn test_guild_delete_fans_out_channel_events() {
        let (store, _) = store_with(ConfigData::default());
        store.add_guild("g", ["c1", "c2"]);
        let (names, _sub) = record(&store);

        assert!(store.delete_guild(&Identity::from("g")));
        assert_eq!(
            *names.lock().unwrap(),
            vec![
                "guildDeleted",
                "guildsModified",
                "channelDeleted",
                "channelsModified",
                "channelDeleted",
                "channelsModified",
            ]
        );
    }

    #[tokio::test]
    async fn test_channel_moves_between_guilds() {
        let (store, _) = store_with(ConfigData::default());
        store.add_guild("g1", ["c"]);
        store.add_channel("g2", "x");

        assert!(store.add_channel("g2", "c"));
        assert!(!store.has_channel(&Identity::from("g1"), &Identity::from("c")));
        assert!(store.has_channel(&Identity::from("g2"), &Identity::from("c")));
        assert!(store.snapshot().validate().is_ok());
    }

    #[tokio::test]
    async fn test_coalesced_event_carries_action() {
        let (store, _) = store_with(ConfigData::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe(move |event| {
            if let ConfigEvent::Modified { category, action } = event {
                sink.lock().unwrap().push((*category, *action));
            }
        });

        store.add_admin("a");
        store.delete_admin(&Identity::from("a"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (Category::Admins, Action::Added),
                (Category::Admins, Action::Deleted)
            ]
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_state() {
        let (store, persistence) = store_with(ConfigData::default());
        persistence.set_fail_writes(true);

        let failures = Arc::new(Mutex::new(0));
        let sink = failures.clone();
        let _sub = store.subscribe(move |event| {
            if matches!(event, ConfigEvent::PersistenceFailed(_)) {
                *sink.lock().unwrap() += 1;
            }
        });

        assert!(store.add_admin("a1"));
        settle().await;

        assert!(store.has_admin(&Identity::from("a1")));
        assert_eq!(*failures.lock().unwrap(), 1);
        assert!(store.save().await.is_err());
    }

    #[tokio::test]
    async fn test_save_emits_saved() {
        let (store, persistence) = store_with(ConfigData::default());
        store.add_admin("a1");
        settle().await;

        let saved = Arc::new(Mutex::new(0));
        let sink = saved.clone();
        let _sub = store.subscribe(move |event| {
            if matches!(event, ConfigEvent::Saved { .. }) {
                *sink.lock().unwrap() += 1;
            }
        });

        store.add_admin("a2");
        store.save().await.unwrap();
        settle().await;

        assert_eq!(*saved.lock().unwrap(), 1);
        assert_eq!(persistence.stored().unwrap().admins.len(), 2);
    }

    fn count_saved(store: &ConfigStore) -> (Arc<Mutex<usize>>, Subscription) {
        let saved = Arc::new(Mutex::new(0));
        let sink = saved.clone();
        let sub = store.subscribe(move |event| {
            if matches!(event, ConfigEvent::Saved { .. }) {
                *sink.lock().unwrap() += 1;
            }
        });
        (saved, sub)
    }

    #[tokio::test]
    async fn test_superseded_write_is_skipped() {
        let (store, persistence) = store_with(ConfigData::default());
        let older = store.snapshot();
        let mut newer = older.clone();
        newer.admins.insert(Identity::from("a1"));

        write_snapshot(
            persistence.clone(),
            store.listeners.clone(),
            store.last_written.clone(),
            newer.clone(),
            2,
        )
        .await
        .unwrap();
        write_snapshot(
            persistence.clone(),
            store.listeners.clone(),
            store.last_written.clone(),
            older,
            1,
        )
        .await
        .unwrap();

        assert_eq!(persistence.write_count(), 1);
        assert_eq!(persistence.stored(), Some(newer));
    }

    #[tokio::test]
    async fn test_save_of_written_generation_is_noop() {
        let (store, persistence) = store_with(ConfigData::default());
        store.add_admin("a1");
        settle().await;
        assert_eq!(persistence.write_count(), 1);

        let (saved, _sub) = count_saved(&store);
        store.save().await.unwrap();

        assert_eq!(persistence.write_count(), 1);
        assert_eq!(*saved.lock().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_burst_of_mutations_persists_newest_state() {
        let (store, persistence) = store_with(ConfigData::default());
        for i in 0..50 {
            store.add_admin(format!("a{}", i));
        }
        store.save().await.unwrap();

        let stored = persistence.stored().unwrap();
        assert_eq!(stored.admins.len(), 50);
        assert_eq!(stored, store.snapshot());
        assert!(persistence.write_count() <= 51);
    }

    #[tokio::test]
    async fn test_load_from_persistence() {
        let mut data = ConfigData::default();
        data.admins.insert(Identity::from("a1"));
        let persistence = Arc::new(MemoryStore::new(data));

        let store = ConfigStore::load(persistence).await.unwrap();
        assert_eq!(store.admins(), vec![Identity::from("a1")]);
    }
}
