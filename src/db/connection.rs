use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::opt::capabilities::Capabilities;
use surrealdb::Surreal;
use tracing::{info, warn};

use crate::config::read_toml_file;
use crate::ShelfmarkError;

/// Handle to the catalog database, embedded or remote.
pub type ShelfmarkDb = Surreal<Any>;

const DEFAULT_NAMESPACE: &str = "shelfmark";
const DEFAULT_DATABASE: &str = "catalog";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

/// Where the catalog and the embedding cache live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DbConfig {
    /// RocksDB under the data directory. One process at a time.
    Embedded {
        /// Replaces `{data_path}/catalog.db`
        #[serde(default)]
        path: Option<String>,
    },
    /// A shared SurrealDB server over WebSocket (`ws://` or `wss://`).
    Remote {
        endpoint: String,
        /// Falls back to `SHELFMARK_DB_USER`, then `root`
        #[serde(default)]
        username: Option<String>,
        /// Falls back to `SHELFMARK_DB_PASS`, then `root`
        #[serde(default)]
        password: Option<String>,
        #[serde(default = "default_namespace")]
        namespace: String,
        #[serde(default = "default_database")]
        database: String,
    },
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::Embedded { path: None }
    }
}

impl DbConfig {
    /// Remote config from `SHELFMARK_DB_URL`, if set.
    fn from_env() -> Option<Self> {
        let endpoint = std::env::var("SHELFMARK_DB_URL").ok()?;
        Some(Self::Remote {
            endpoint,
            username: None,
            password: None,
            namespace: default_namespace(),
            database: default_database(),
        })
    }
}

fn rocksdb_path(path: Option<&str>, data_path: &Path) -> PathBuf {
    path.map(PathBuf::from)
        .unwrap_or_else(|| data_path.join("catalog.db"))
}

fn credential(configured: Option<&String>, env_var: &str) -> String {
    configured
        .cloned()
        .or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| "root".to_string())
}

/// `{data_path}/database.toml`, then `SHELFMARK_DB_URL`, then embedded.
///
/// A broken file is logged and ignored.
pub fn load_db_config(data_path: &Path) -> DbConfig {
    match read_toml_file::<DbConfig>(&data_path.join("database.toml")) {
        Ok(Some(config)) => return config,
        Ok(None) => {}
        Err(e) => warn!("Ignoring database config: {}", e),
    }
    if let Some(config) = DbConfig::from_env() {
        info!("Using remote database from SHELFMARK_DB_URL");
        return config;
    }
    DbConfig::default()
}

/// Connect and select the namespace and database.
///
/// `data_path` only matters for the default embedded location.
pub async fn init_db(config: &DbConfig, data_path: &Path) -> Result<ShelfmarkDb, ShelfmarkError> {
    match config {
        DbConfig::Embedded { path } => {
            let location = rocksdb_path(path.as_deref(), data_path);
            let options = surrealdb::opt::Config::new().capabilities(Capabilities::all());
            let db = surrealdb::engine::any::connect((
                format!("rocksdb:{}", location.display()),
                options,
            ))
            .await?;
            db.use_ns(DEFAULT_NAMESPACE).use_db(DEFAULT_DATABASE).await?;
            Ok(db)
        }
        DbConfig::Remote {
            endpoint,
            username,
            password,
            namespace,
            database,
        } => {
            let db = surrealdb::engine::any::connect(endpoint.as_str()).await?;
            let username = credential(username.as_ref(), "SHELFMARK_DB_USER");
            let password = credential(password.as_ref(), "SHELFMARK_DB_PASS");
            db.signin(Root {
                username: &username,
                password: &password,
            })
            .await?;
            db.use_ns(namespace.as_str())
                .use_db(database.as_str())
                .await?;
            Ok(db)
        }
    }
}
