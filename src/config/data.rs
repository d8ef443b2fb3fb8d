//! Persisted bot configuration

use crate::error::ConfigError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable ID of an administrator, guild, or channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

pub type ChannelSet = IndexSet<Identity>;

/// Administrators and guild -> channel memberships, in insertion order.
///
/// Serialized as `{"admins": [...], "guilds": {"<guild>": [...]}, "secretsLocator": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(default)]
    pub admins: IndexSet<Identity>,

    #[serde(default, rename = "guilds")]
    pub guild_channels: IndexMap<Identity, ChannelSet>,

    #[serde(rename = "secretsLocator", alias = "secretsFile", default)]
    pub secrets_locator: String,
}

impl ConfigData {
    /// Check that no channel is listed under more than one guild
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: IndexMap<&Identity, &Identity> = IndexMap::new();
        for (guild, channels) in &self.guild_channels {
            for channel in channels {
                if let Some(other) = seen.insert(channel, guild) {
                    return Err(ConfigError::Invalid(format!(
                        "channel {} is listed under both guild {} and guild {}",
                        channel, other, guild
                    )));
                }
            }
        }
        Ok(())
    }
}
