//! Formatted text lists of admins, guilds and channels
//!
//! Formatting is cheap and uncached: every call re-derives text from what the
//! name projector currently holds, so numbering follows the current mapping
//! order and may change after an invalidation.

use crate::cache::{NameProjector, NameRecord, Names, PendingNames, resolve_all};
use crate::config::Identity;
use crate::error::{FormatError, ListError};
use crate::lists::options::{ListOptions, Variable};
use crate::lists::pattern::Pattern;
use indexmap::IndexMap;

/// Names to render, either resolved or still awaiting remote lookups
#[derive(Debug, Clone)]
pub enum NameSource {
    Ready(Names),
    Pending(PendingNames),
}

/// Render resolved names, one pattern application per entry
pub fn format_names(
    names: &IndexMap<Identity, NameRecord>,
    options: &ListOptions,
) -> Result<String, FormatError> {
    if names.is_empty() {
        return Ok(String::new());
    }

    options.validate_order()?;
    let pattern = Pattern::parse(&options.pattern)?;

    let lines: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, (id, name))| {
            let number = i + 1;
            let args = options.variable_order.iter().map(|variable| match variable {
                Variable::Number => &number as &dyn std::fmt::Display,
                Variable::Name => &name.display_name,
                Variable::Id => id,
            });
            let mut slots: [&dyn std::fmt::Display; 3] = [&"", &"", &""];
            for (slot, arg) in slots.iter_mut().zip(args) {
                *slot = arg;
            }
            pattern.render(slots)
        })
        .collect();

    Ok(lines.join(&options.delimiter))
}

/// Render a name source; pending names are awaited in full before any output
pub async fn list(source: NameSource, options: &ListOptions) -> Result<String, ListError> {
    let names = match source {
        NameSource::Ready(names) => names,
        NameSource::Pending(pending) => resolve_all(pending).await?,
    };
    Ok(format_names(&names, options)?)
}

pub struct ListFormatter {
    names: NameProjector,
    options: ListOptions,
}

impl ListFormatter {
    pub fn new(names: NameProjector) -> Self {
        Self::with_options(names, ListOptions::default())
    }

    pub fn with_options(names: NameProjector, options: ListOptions) -> Self {
        Self { names, options }
    }

    pub fn set_options(&mut self, options: ListOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub async fn get_admins(&self) -> Result<String, ListError> {
        self.get_admins_with(&self.options).await
    }

    pub async fn get_admins_with(&self, options: &ListOptions) -> Result<String, ListError> {
        list(NameSource::Pending(self.names.admins()), options).await
    }

    pub fn get_guilds(&self) -> Result<String, FormatError> {
        self.get_guilds_with(&self.options)
    }

    pub fn get_guilds_with(&self, options: &ListOptions) -> Result<String, FormatError> {
        format_names(&self.names.guilds(), options)
    }

    pub fn get_channels(&self, guild: &Identity) -> Result<String, FormatError> {
        self.get_channels_with(guild, &self.options)
    }

    pub fn get_channels_with(
        &self,
        guild: &Identity,
        options: &ListOptions,
    ) -> Result<String, FormatError> {
        format_names(&self.names.channels(guild), options)
    }

    /// Channel list of every tracked guild, keyed by guild
    pub fn get_all_channels(&self) -> Result<IndexMap<Identity, String>, FormatError> {
        self.names
            .guilds()
            .keys()
            .map(|guild| Ok((guild.clone(), self.get_channels(guild)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntityResolver;
    use crate::config::{ConfigData, ConfigStore, MemoryStore};
    use crate::error::ResolveError;
    use crate::remote::{Channel, ChannelKind, MemoryConnection};
    use std::sync::Arc;

    fn record(name: &str) -> NameRecord {
        NameRecord {
            display_name: name.to_string(),
            mention_form: format!("<@{}>", name),
        }
    }

    fn sample() -> IndexMap<Identity, NameRecord> {
        IndexMap::from([
            (Identity::from("1"), record("Alice")),
            (Identity::from("2"), record("Bob")),
        ])
    }

    fn setup() -> (Arc<ConfigStore>, Arc<MemoryConnection>, ListFormatter) {
        let persistence = Arc::new(MemoryStore::new(ConfigData::default()));
        let config = Arc::new(ConfigStore::from_data(ConfigData::default(), persistence));
        config.add_admin("U1");
        config.add_admin("U2");
        config.add_admin("U3");
        config.add_guild("G1", ["C1", "C2"]);

        let conn = Arc::new(MemoryConnection::new());
        conn.add_user("U1", "alice");
        conn.add_user("U2", "bob");
        conn.add_user("U3", "carol");
        conn.add_guild("G1", "Home");
        for (id, name) in [("C1", "general"), ("C2", "alerts")] {
            conn.add_channel(Channel {
                id: Identity::from(id),
                guild: Identity::from("G1"),
                name: name.to_string(),
                kind: ChannelKind::Text,
            });
        }

        let resolver = EntityResolver::new(config.clone(), conn.clone());
        let formatter = ListFormatter::new(NameProjector::new(resolver));
        (config, conn, formatter)
    }

    #[test]
    fn test_default_format() {
        let text = format_names(&sample(), &ListOptions::default()).unwrap();
        assert_eq!(text, "1. Alice [1]\n2. Bob [2]");
    }

    #[test]
    fn test_custom_order_and_delimiter() {
        let options = ListOptions::default()
            .with_delimiter(", ")
            .with_pattern("%s=%s (#%d)")
            .with_variable_order([Variable::Id, Variable::Name, Variable::Number]);

        let text = format_names(&sample(), &options).unwrap();
        assert_eq!(text, "1=Alice (#1), 2=Bob (#2)");
    }

    #[test]
    fn test_empty_mapping_is_empty_string() {
        let text = format_names(&IndexMap::new(), &ListOptions::default()).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_invalid_order_fails_fast() {
        let options =
            ListOptions::default().with_variable_order([Variable::Number, Variable::Number]);
        assert_eq!(
            format_names(&sample(), &options),
            Err(FormatError::DuplicateVariable("number"))
        );
    }

    #[tokio::test]
    async fn test_list_ready_source() {
        let text = list(NameSource::Ready(Arc::new(sample())), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "1. Alice [1]\n2. Bob [2]");
    }

    #[tokio::test]
    async fn test_get_admins() {
        let (_config, _conn, formatter) = setup();
        let text = formatter.get_admins().await.unwrap();
        assert_eq!(text, "1. alice [U1]\n2. bob [U2]\n3. carol [U3]");
    }

    #[tokio::test]
    async fn test_get_admins_fails_when_one_lookup_fails() {
        let (_config, conn, formatter) = setup();
        conn.fail_user("U2");

        let result = formatter.get_admins().await;
        assert!(matches!(
            result,
            Err(ListError::Resolve(ResolveError::Remote { .. }))
        ));
    }

    #[tokio::test]
    async fn test_numbering_follows_current_mapping() {
        let (config, _conn, formatter) = setup();
        config.delete_admin(&Identity::from("U1"));

        let text = formatter.get_admins().await.unwrap();
        assert_eq!(text, "1. bob [U2]\n2. carol [U3]");
    }

    #[tokio::test]
    async fn test_guild_and_channel_lists() {
        let (config, _conn, formatter) = setup();
        assert_eq!(formatter.get_guilds().unwrap(), "1. Home [G1]");
        assert_eq!(
            formatter.get_channels(&Identity::from("G1")).unwrap(),
            "1. general [C1]\n2. alerts [C2]"
        );

        config.delete_channel(&Identity::from("G1"), &Identity::from("C1"));
        let all = formatter.get_all_channels().unwrap();
        assert_eq!(all[&Identity::from("G1")], "1. alerts [C2]");
    }

    #[tokio::test]
    async fn test_set_options() {
        let (_config, _conn, mut formatter) = setup();
        formatter.set_options(ListOptions::default().with_pattern("%s %s %s"));
        assert_eq!(formatter.get_guilds().unwrap(), "1 Home G1");
    }
}
