//! Configuration for the image dispatch service.
//!
//! Unlike a desktop or plugin-backed tool, this service has nothing to read a
//! config file for: its entire external surface is the two environment
//! variables and two CLI flags named in the system contract. `load_config()`
//! therefore reads the environment directly rather than searching for a
//! `config.yaml`, but keeps the teacher's philosophy of "never fail startup
//! over configuration" — every value has a default.

use std::path::PathBuf;

/// Top-level configuration, aggregating store and server settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the embedded store directory. `DB_PATH` env var, default `db/image_tasks.db`.
    pub db_path: PathBuf,
    /// Directory sidecar artifacts are written to. `IMAGES_DIR` env var, default `images/`.
    pub images_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: PathBuf::from("db/image_tasks.db"),
            images_dir: PathBuf::from("images"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Load configuration from the environment, falling back to defaults for any
/// value that is absent or fails to parse.
pub fn load_config() -> Config {
    let mut config = Config::default();

    if let Ok(db_path) = std::env::var("DB_PATH") {
        config.store.db_path = PathBuf::from(db_path);
    }

    if let Ok(images_dir) = std::env::var("IMAGES_DIR") {
        config.store.images_dir = PathBuf::from(images_dir);
    }

    config
}
