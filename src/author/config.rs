use serde::Deserialize;
use std::num::NonZeroUsize;

use super::Credentials;
use super::driver::DEFAULT_WORKERS;

/// Settings for the bulk authoring CLI, read from `AUTHOR_*` variables.
#[derive(Deserialize, Clone)]
pub struct AuthorConfig {
    pub publisher_url: String,
    pub librarian_url: String,
    pub auth_url: String,
    pub admin_email: String,
    pub admin_password: String,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl AuthorConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: AuthorConfig = envy::prefixed("AUTHOR_")
            .from_iter(vars)
            .map_err(|e| format!("Failed to load author config from environment: {e}"))?;
        config.worker_count()?;
        Ok(config)
    }

    pub fn worker_count(&self) -> Result<NonZeroUsize, String> {
        NonZeroUsize::new(self.workers).ok_or_else(|| "AUTHOR_WORKERS must be at least 1".to_string())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.admin_email.clone(),
            password: self.admin_password.clone(),
        }
    }
}
