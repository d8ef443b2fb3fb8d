//! Entities owned by the remote chat connection

use crate::config::Identity;
use std::sync::Arc;

/// Common surface of users, guilds and channels
pub trait RemoteEntity {
    fn id(&self) -> &Identity;

    /// Short, human-readable name
    fn short_name(&self) -> &str;

    /// Form that renders as a mention or link in chat
    fn reference_form(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Identity,
    /// Username/handle (e.g., "john.doe")
    pub name: String,
}

impl RemoteEntity for User {
    fn id(&self) -> &Identity {
        &self.id
    }

    fn short_name(&self) -> &str {
        &self.name
    }

    fn reference_form(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: Identity,
    pub name: String,
    /// False while the remote side reports an outage for this guild
    pub available: bool,
}

impl Guild {
    pub fn is_available(&self) -> bool {
        self.available
    }
}

impl RemoteEntity for Guild {
    fn id(&self) -> &Identity {
        &self.id
    }

    fn short_name(&self) -> &str {
        &self.name
    }

    fn reference_form(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Identity,
    /// Owning guild
    pub guild: Identity,
    /// Channel name without # (e.g., "engineering")
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }
}

impl RemoteEntity for Channel {
    fn id(&self) -> &Identity {
        &self.id
    }

    fn short_name(&self) -> &str {
        &self.name
    }

    fn reference_form(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Remote notification that an entity changed (renamed, outage, ...)
#[derive(Debug, Clone)]
pub enum EntityChange {
    ChannelUpdated(Arc<Channel>),
    GuildUpdated(Arc<Guild>),
}
