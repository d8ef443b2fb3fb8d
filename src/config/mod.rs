mod data;
mod events;
mod persistence;
mod settings;
mod store;

pub use data::{ChannelSet, ConfigData, Identity};
pub use events::{Action, Category, ConfigEvent};
pub use persistence::{ConfigPersistence, JsonFileStore, MemoryStore};
pub(crate) use persistence::read_json;
pub use settings::{Settings, SlackConfig, load_settings};
pub use store::ConfigStore;
