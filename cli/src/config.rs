//! Configuration file handling.
//!
//! Everything the commands need is read once at startup from a TOML file,
//! then a handful of environment variables may replace the Spotify secrets.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use spotmover::spotify::{authorize_url, Grant, SpotifyCredentials};
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_ID: &str = "spotmover-spotify";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub spotify: Option<SpotifyConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpotifyConfig {
    pub username: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    /// Redirect URI registered for the application (default: "http://localhost:8888/callback")
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the lookup cache directory (default: "spotmover-spotify")
    pub cache_id: String,
    /// Parent directory of the lookup cache (default: system temp dir)
    pub cache_root: Option<PathBuf>,
    /// Catalog lookups in flight at once (default: 1)
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_id: DEFAULT_CACHE_ID.to_string(),
            cache_root: None,
            concurrency: 1,
        }
    }
}

impl AppConfig {
    /// `<config dir>/spotmover/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("spotmover").join("config.toml"))
    }

    /// Reads `path` and applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        if config.engine.concurrency == 0 {
            bail!("engine.concurrency must be at least 1");
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        let Some(spotify) = self.spotify.as_mut() else {
            return;
        };
        if let Ok(value) = std::env::var("SPOTIFY_CLIENT_ID") {
            spotify.client_id = value;
        }
        if let Ok(value) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            spotify.client_secret = value;
        }
        if let Ok(value) = std::env::var("SPOTIFY_REFRESH_TOKEN") {
            spotify.refresh_token = Some(value);
        }
        if let Ok(value) = std::env::var("SPOTIFY_ACCESS_TOKEN") {
            spotify.access_token = Some(value);
        }
    }

    pub fn spotify(&self) -> Result<&SpotifyConfig> {
        self.spotify
            .as_ref()
            .context("The config file has no [spotify] section")
    }
}

impl SpotifyConfig {
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    /// A refresh token wins over an access token when both are set.
    pub fn credentials(&self) -> Result<SpotifyCredentials> {
        let grant = match (&self.refresh_token, &self.access_token) {
            (Some(token), _) => Grant::RefreshToken(token.clone()),
            (None, Some(token)) => Grant::AccessToken(token.clone()),
            (None, None) => {
                let url = authorize_url(&self.client_id, self.redirect_uri())?;
                bail!(
                    "No Spotify token configured. Authorize the application at {url} \
                     and set spotify.refresh_token or SPOTIFY_REFRESH_TOKEN"
                );
            }
        };

        Ok(SpotifyCredentials {
            username: self.username.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            grant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const FULL: &str = r#"
[spotify]
username = "someone"
client_id = "id"
client_secret = "secret"
refresh_token = "refresh"

[engine]
cache_id = "custom"
cache_root = "/var/cache"
concurrency = 4
"#;

    fn clear_env() {
        for name in [
            "SPOTIFY_CLIENT_ID",
            "SPOTIFY_CLIENT_SECRET",
            "SPOTIFY_REFRESH_TOKEN",
            "SPOTIFY_ACCESS_TOKEN",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_engine_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert!(config.spotify.is_none());
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.cache_id, "spotmover-spotify");
        assert!(config.spotify().is_err());
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml(FULL).unwrap();
        assert_eq!(config.engine.cache_id, "custom");
        assert_eq!(config.engine.cache_root, Some(PathBuf::from("/var/cache")));
        assert_eq!(config.engine.concurrency, 4);

        let creds = config.spotify().unwrap().credentials().unwrap();
        assert_eq!(creds.username, "someone");
        assert_eq!(creds.grant, Grant::RefreshToken("refresh".to_string()));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(AppConfig::from_toml("[engine]\nconcurrency = 0\n").is_err());
    }

    #[test]
    fn test_missing_token_points_to_authorization() {
        let config = AppConfig::from_toml(
            "[spotify]\nusername = \"u\"\nclient_id = \"abc\"\nclient_secret = \"s\"\n",
        )
        .unwrap();
        let err = config.spotify().unwrap().credentials().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("https://accounts.spotify.com/authorize"));
        assert!(message.contains("client_id=abc"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        std::env::set_var("SPOTIFY_CLIENT_SECRET", "from-env");
        std::env::set_var("SPOTIFY_ACCESS_TOKEN", "access");
        let config = AppConfig::load(&path).unwrap();
        clear_env();

        let spotify = config.spotify().unwrap();
        assert_eq!(spotify.client_id, "id");
        assert_eq!(spotify.client_secret, "from-env");
        assert_eq!(spotify.access_token.as_deref(), Some("access"));
        // the refresh token from the file still wins
        assert_eq!(
            spotify.credentials().unwrap().grant,
            Grant::RefreshToken("refresh".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_env_access_token_alone() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[spotify]\nusername = \"u\"\nclient_id = \"c\"\nclient_secret = \"s\"\n",
        )
        .unwrap();

        std::env::set_var("SPOTIFY_ACCESS_TOKEN", "access");
        let config = AppConfig::load(&path).unwrap();
        clear_env();

        assert_eq!(
            config.spotify().unwrap().credentials().unwrap().grant,
            Grant::AccessToken("access".to_string())
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Unable to read config file"));
    }
}
