//! Configuration management for Folio Server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub workers: WorkerConfig,
    pub render: RenderConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding uploaded originals (`<name>.pdf`)
    pub originals_dir: PathBuf,
    /// Directory holding rendered pages (`<name><page>.png`)
    pub pages_dir: PathBuf,
    /// Chunk size for streamed downloads
    pub chunk_size: usize,
    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent CPU-bound jobs (hashing, probing, rasterization)
    pub threads: usize,
    /// Jobs allowed to wait for a free worker before submissions are rejected
    pub queue_depth: usize,
    /// How long a queued job may wait for a worker
    pub submit_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Render scale (1.0 = 72 DPI)
    pub scale: f32,
    /// Where page downloads redirect when a page cannot be served
    pub fallback_url: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Maximum upload size: 500MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8888,
            },
            database: DatabaseConfig {
                url: "sqlite:./file-repo.sqlite3".to_string(),
                max_connections: 5,
            },
            storage: StorageConfig {
                originals_dir: PathBuf::from("./media/pdf"),
                pages_dir: PathBuf::from("./media/pages"),
                chunk_size: DEFAULT_CHUNK_SIZE,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            workers: WorkerConfig {
                threads: 2,
                queue_depth: 16,
                submit_timeout_secs: 10,
            },
            render: RenderConfig {
                scale: 1.5,
                fallback_url: "/".to_string(),
            },
            auth: AuthConfig {
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_var(
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                )?,
            },
            storage: StorageConfig {
                originals_dir: env::var("STORAGE_ORIGINALS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.originals_dir),
                pages_dir: env::var("STORAGE_PAGES_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.pages_dir),
                chunk_size: parse_var("STREAM_CHUNK_SIZE", defaults.storage.chunk_size)?,
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.storage.max_upload_bytes)?,
            },
            workers: WorkerConfig {
                threads: parse_var("WORKER_THREADS", defaults.workers.threads)?,
                queue_depth: parse_var("WORKER_QUEUE_DEPTH", defaults.workers.queue_depth)?,
                submit_timeout_secs: parse_var(
                    "WORKER_SUBMIT_TIMEOUT_SECS",
                    defaults.workers.submit_timeout_secs,
                )?,
            },
            render: RenderConfig {
                scale: parse_var("RENDER_SCALE", defaults.render.scale)?,
                fallback_url: env::var("RENDER_FALLBACK_URL").unwrap_or(defaults.render.fallback_url),
            },
            auth: AuthConfig {
                bcrypt_cost: parse_var("BCRYPT_COST", defaults.auth.bcrypt_cost)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.chunk_size == 0 {
            return Err(ConfigError::Invalid("STREAM_CHUNK_SIZE", "must be positive".into()));
        }
        if self.workers.threads == 0 {
            return Err(ConfigError::Invalid("WORKER_THREADS", "must be positive".into()));
        }
        if !(0.1..=8.0).contains(&self.render.scale) {
            return Err(ConfigError::Invalid("RENDER_SCALE", "must be between 0.1 and 8.0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}
