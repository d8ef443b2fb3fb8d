//! Bot credentials stored in the file named by `secretsLocator`

use crate::config::read_json;
use crate::error::ConfigError;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// A secrets file shorter than this cannot hold a usable token
const MIN_SECRETS_LEN: usize = 20;

static TOKENS: LazyLock<DashMap<PathBuf, String>> = LazyLock::new(DashMap::new);

/// `{"id": ..., "secret": ..., "token": ...}`; only the token is used
#[derive(Debug, Deserialize)]
struct Secrets {
    token: String,
}

/// Read the bot token, caching it per path for the process lifetime
pub async fn load_token(path: impl AsRef<Path>) -> Result<String, ConfigError> {
    let path = path.as_ref();
    if let Some(token) = TOKENS.get(path) {
        return Ok(token.clone());
    }

    let secrets: Secrets = read_json(path, MIN_SECRETS_LEN).await?;
    if secrets.token.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "secrets file {:?} has an empty token",
            path
        )));
    }

    tracing::debug!(path = ?path, "Bot token loaded");
    TOKENS.insert(path.to_path_buf(), secrets.token.clone());
    Ok(secrets.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_token_is_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        tokio::fs::write(&path, r#"{"id": "1", "secret": "s", "token": "xoxb-abc"}"#)
            .await
            .unwrap();

        assert_eq!(load_token(&path).await.unwrap(), "xoxb-abc");

        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(load_token(&path).await.unwrap(), "xoxb-abc");
    }

    #[tokio::test]
    async fn test_short_secrets_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        tokio::fs::write(&path, r#"{"token":"x"}"#).await.unwrap();

        assert!(matches!(
            load_token(&path).await,
            Err(ConfigError::TooShort { .. })
        ));
    }
}
