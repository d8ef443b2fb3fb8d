//! Events emitted by the configuration store

use crate::config::Identity;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Configuration category a coalesced event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Admins,
    Channels,
    Guilds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Added,
    Deleted,
}

#[derive(Debug, Clone)]
pub enum ConfigEvent {
    AdminAdded(Identity),
    AdminDeleted(Identity),
    ChannelAdded {
        guild: Identity,
        channel: Identity,
    },
    ChannelDeleted {
        guild: Identity,
        channel: Identity,
    },
    GuildAdded {
        guild: Identity,
        channels: Vec<Identity>,
    },
    GuildDeleted {
        guild: Identity,
        channels: Vec<Identity>,
    },
    /// Coalesced category change; what downstream caches subscribe to
    Modified { category: Category, action: Action },
    Saved { at: DateTime<Utc> },
    PersistenceFailed(Arc<PersistenceError>),
}

impl ConfigEvent {
    /// Category and action of a specific change event
    pub fn coalesced(&self) -> Option<(Category, Action)> {
        match self {
            Self::AdminAdded(_) => Some((Category::Admins, Action::Added)),
            Self::AdminDeleted(_) => Some((Category::Admins, Action::Deleted)),
            Self::ChannelAdded { .. } => Some((Category::Channels, Action::Added)),
            Self::ChannelDeleted { .. } => Some((Category::Channels, Action::Deleted)),
            Self::GuildAdded { .. } => Some((Category::Guilds, Action::Added)),
            Self::GuildDeleted { .. } => Some((Category::Guilds, Action::Deleted)),
            Self::Modified { .. } | Self::Saved { .. } | Self::PersistenceFailed(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AdminAdded(_) => "adminAdded",
            Self::AdminDeleted(_) => "adminDeleted",
            Self::ChannelAdded { .. } => "channelAdded",
            Self::ChannelDeleted { .. } => "channelDeleted",
            Self::GuildAdded { .. } => "guildAdded",
            Self::GuildDeleted { .. } => "guildDeleted",
            Self::Modified {
                category: Category::Admins,
                ..
            } => "adminsModified",
            Self::Modified {
                category: Category::Channels,
                ..
            } => "channelsModified",
            Self::Modified {
                category: Category::Guilds,
                ..
            } => "guildsModified",
            Self::Saved { .. } => "saved",
            Self::PersistenceFailed(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_events_coalesce_by_category() {
        let event = ConfigEvent::ChannelDeleted {
            guild: Identity::from("g"),
            channel: Identity::from("c"),
        };
        assert_eq!(
            event.coalesced(),
            Some((Category::Channels, Action::Deleted))
        );
        assert_eq!(event.name(), "channelDeleted");

        let modified = ConfigEvent::Modified {
            category: Category::Guilds,
            action: Action::Added,
        };
        assert_eq!(modified.coalesced(), None);
        assert_eq!(modified.name(), "guildsModified");
    }
}
