use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::BlobStoreConfig;

#[derive(Deserialize, Debug, Clone)]
pub struct LibrarianConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    pub database_url: String,

    /// Prefix for published post URLs; empty gives relative URLs.
    #[serde(default)]
    pub public_base_url: String,

    pub auth_url: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

// Partial config for layering. The file uses a `[blob_store]` table; the environment
// uses the flat `BLOB_*` fields.
#[derive(Deserialize, Default, Debug)]
struct PartialLibrarianConfig {
    listen_address: Option<String>,
    database_url: Option<String>,
    public_base_url: Option<String>,
    auth_url: Option<String>,
    log_dir: Option<String>,
    max_connections: Option<u32>,
    blob_store: Option<BlobStoreConfig>,
    blob_backend: Option<String>,
    blob_root: Option<PathBuf>,
    blob_bucket: Option<String>,
}

impl PartialLibrarianConfig {
    fn blob_store(&self) -> Result<Option<BlobStoreConfig>, String> {
        let Some(backend) = self.blob_backend.as_deref() else {
            return Ok(self.blob_store.clone());
        };
        let config = match backend.to_ascii_lowercase().as_str() {
            "local" => BlobStoreConfig::Local {
                root: self
                    .blob_root
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("data/blobs")),
            },
            "memory" => BlobStoreConfig::Memory,
            "s3" => BlobStoreConfig::S3 {
                bucket: self
                    .blob_bucket
                    .clone()
                    .ok_or("BLOB_BUCKET is required for the s3 blob backend")?,
            },
            other => return Err(format!("Unknown blob backend '{other}'")),
        };
        Ok(Some(config))
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl LibrarianConfig {
    /// Environment (`LIBRARIAN_*`, `.env` included) overrides the optional TOML file.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::load_from(config_path, std::env::vars())
    }

    pub fn load_from<I>(config_path: Option<&str>, vars: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        // 1. Load from file (optional)
        let file_config: PartialLibrarianConfig = match config_path.map(Path::new) {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            }
            _ => PartialLibrarianConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialLibrarianConfig = envy::prefixed("LIBRARIAN_")
            .from_iter(vars)
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        let blob_store = env_config
            .blob_store()?
            .or(file_config.blob_store()?)
            .unwrap_or_default();
        let max_connections = env_config
            .max_connections
            .or(file_config.max_connections)
            .unwrap_or_else(default_max_connections);
        if max_connections == 0 {
            return Err("MAX_CONNECTIONS must be at least 1".to_string());
        }

        Ok(LibrarianConfig {
            listen_address: env_config
                .listen_address
                .or(file_config.listen_address)
                .unwrap_or_else(default_listen_address),
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .ok_or("LIBRARIAN_DATABASE_URL is required")?,
            public_base_url: env_config
                .public_base_url
                .or(file_config.public_base_url)
                .unwrap_or_default(),
            auth_url: env_config
                .auth_url
                .or(file_config.auth_url)
                .ok_or("LIBRARIAN_AUTH_URL is required")?,
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            max_connections,
            blob_store,
        })
    }
}
