use std::path::PathBuf;
use thiserror::Error;

/// Malformed or missing persisted configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("File {path:?} is in unknown format; unable to parse JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "File {path:?} is not configured properly; expected at least {expected} characters but found {actual}"
    )]
    TooShort {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to mirror the in-memory configuration to disk. Never fatal.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("File {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("No permission to write {0:?}")]
    Permission(PathBuf),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote entity lookup failure, handed to every caller awaiting that entity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Remote entity not found: {0}")]
    NotFound(String),

    #[error("Remote lookup for {id} failed: {message}")]
    Remote { id: String, message: String },
}

/// Invalid list rendering options.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Variable '{0}' appears more than once in variable order")]
    DuplicateVariable(&'static str),

    #[error("Variable '{0}' is missing from variable order")]
    MissingVariable(&'static str),

    #[error("Pattern must have {expected} placeholders, found {found}")]
    PatternSlots { expected: usize, found: usize },
}

/// Failure of an asynchronous list render.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Error)]
pub enum ArchiveBotError {
    #[error("Slack API error: {0}")]
    SlackApi(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ArchiveBotError>;
