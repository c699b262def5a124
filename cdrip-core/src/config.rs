use crate::cddb::GNUDB_URL;
use crate::credentials::{default_token_path, DISCOGS_TOKEN_FILE, LASTFM_TOKEN_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_DEVICE: &str = "/dev/cdrom";
pub const DEFAULT_HELLO: &str = "user hostname cdrip 0.1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Could not determine home directory")]
    NoHome,
}

/// `~/.cdrip/config.yaml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigYaml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnudb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hello: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub musicbrainz_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discogs_token_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastfm_token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device: String,
    pub gnudb_url: String,
    /// CDDB `hello` greeting: `user host client version`
    pub hello: String,
    pub musicbrainz_contact: String,
    pub output_dir: PathBuf,
    pub discogs_token_path: PathBuf,
    pub lastfm_token_path: PathBuf,
}

impl Config {
    /// `.env`, then `~/.cdrip/config.yaml`, then `CDRIP_*` variables
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::NoHome)?
            .join(".cdrip");
        let yaml = load_config_yaml(&config_dir.join("config.yaml"))?;
        Self::from_sources(yaml, |key| std::env::var(key).ok())
    }

    fn from_sources(
        yaml: ConfigYaml,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| env(key).filter(|v| !v.is_empty());
        let discogs_token_path = match var("CDRIP_DISCOGS_TOKEN_PATH")
            .map(PathBuf::from)
            .or(yaml.discogs_token_path)
        {
            Some(path) => path,
            None => default_token_path(DISCOGS_TOKEN_FILE).map_err(|_| ConfigError::NoHome)?,
        };
        let lastfm_token_path = match var("CDRIP_LASTFM_TOKEN_PATH")
            .map(PathBuf::from)
            .or(yaml.lastfm_token_path)
        {
            Some(path) => path,
            None => default_token_path(LASTFM_TOKEN_FILE).map_err(|_| ConfigError::NoHome)?,
        };

        Ok(Self {
            device: var("CDRIP_DEVICE")
                .or(yaml.device)
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            gnudb_url: var("CDRIP_GNUDB_URL")
                .or(yaml.gnudb_url)
                .unwrap_or_else(|| GNUDB_URL.to_string()),
            hello: var("CDRIP_HELLO")
                .or(yaml.hello)
                .unwrap_or_else(|| DEFAULT_HELLO.to_string()),
            musicbrainz_contact: var("CDRIP_MUSICBRAINZ_CONTACT")
                .or(yaml.musicbrainz_contact)
                .unwrap_or_else(|| "anonymous cdrip user".to_string()),
            output_dir: var("CDRIP_OUTPUT_DIR")
                .map(PathBuf::from)
                .or(yaml.output_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            discogs_token_path,
            lastfm_token_path,
        })
    }
}

/// Missing file means defaults; a malformed one is an error
fn load_config_yaml(path: &Path) -> Result<ConfigYaml, ConfigError> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(ConfigYaml::default());
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn config_yaml_fields_are_optional() {
        let yaml: ConfigYaml = serde_yaml::from_str("device: /dev/sr1\n").unwrap();
        assert_eq!(yaml.device.as_deref(), Some("/dev/sr1"));
        assert_eq!(yaml.gnudb_url, None);
    }

    #[test]
    fn defaults_without_yaml_or_env() {
        let config = Config::from_sources(ConfigYaml::default(), no_env).unwrap();
        assert_eq!(config.device, DEFAULT_DEVICE);
        assert_eq!(config.gnudb_url, GNUDB_URL);
        assert_eq!(config.hello, DEFAULT_HELLO);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.discogs_token_path.ends_with(DISCOGS_TOKEN_FILE));
    }

    #[test]
    fn env_overrides_yaml() {
        let yaml = ConfigYaml {
            device: Some("/dev/sr1".to_string()),
            output_dir: Some(PathBuf::from("/music")),
            ..Default::default()
        };
        let env: HashMap<&str, &str> =
            HashMap::from([("CDRIP_DEVICE", "/dev/sr2"), ("CDRIP_HELLO", "")]);
        let config =
            Config::from_sources(yaml, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.device, "/dev/sr2");
        assert_eq!(config.output_dir, PathBuf::from("/music"));
        // Empty variables are ignored
        assert_eq!(config.hello, DEFAULT_HELLO);
    }

    #[test]
    fn load_config_yaml_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let yaml = load_config_yaml(&tmp.path().join("config.yaml")).unwrap();
        assert_eq!(yaml, ConfigYaml::default());
    }

    #[test]
    fn load_config_yaml_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        let written = ConfigYaml {
            gnudb_url: Some("http://localhost:8880/~cddb/cddb.cgi".to_string()),
            lastfm_token_path: Some(PathBuf::from("/secrets/lastfm")),
            ..Default::default()
        };
        std::fs::write(&path, serde_yaml::to_string(&written).unwrap()).unwrap();

        assert_eq!(load_config_yaml(&path).unwrap(), written);
    }

    #[test]
    fn load_config_yaml_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "device: [unclosed\n").unwrap();
        assert!(matches!(
            load_config_yaml(&path),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
