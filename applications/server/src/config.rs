/// Server configuration
use crate::error::{Result, ServerError};
use contour_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub library: LibrarySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where tracks come from
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// Directory scanned recursively at startup
    #[serde(default)]
    pub music_dir: Option<PathBuf>,

    /// Explicit id → file mappings, added after the scan
    #[serde(default)]
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackEntry {
    pub id: String,
    pub path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from file and environment
    ///
    /// `path` overrides the default `config.toml`, which is optional.
    /// Environment variables prefixed with `CONTOUR_` take precedence,
    /// with `__` separating sections (`CONTOUR_ENGINE__WORKERS=4`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ServerError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CONTOUR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        if let Some(dir) = &self.library.music_dir {
            if !dir.is_dir() {
                return Err(ServerError::Config(format!(
                    "Music directory not found: {}",
                    dir.display()
                )));
            }
        }

        let mut ids: Vec<&str> = self.library.tracks.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ServerError::Config(format!("Duplicate track id: {}", pair[0])));
        }

        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
