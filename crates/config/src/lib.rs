//! Layered configuration for `shelf`.
//!
//! Settings are resolved in priority order:
//! 1. **Environment variables** prefixed with `SHELF_` (`SHELF_PAGE_SIZE=25`).
//! 2. **Config file**: given explicitly, or `config.toml` in the platform's
//!    configuration directory when it exists. TOML, YAML and JSON are read
//!    according to the file extension.
//! 3. **Compiled defaults** ([`Config::default`]).
//!
//! | Key | Default |
//! |-----|---------|
//! | `database` | `library.db` in the platform data directory |
//! | `page_size` | `10` |
//! | `export_chunk_size` | `100` |
//! | `loan_period_days` | `14` |
//! | `log_level` | `warn` |

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SHELF_";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "library.db";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "shelf").ok_or_raise(|| ErrorKind::NoConfigDirectory)
}

/// The per-user configuration file, whether or not it exists.
pub fn default_config_file() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The SQLite database holding the circulation records.
    pub database: PathBuf,
    /// Rows per page in listings.
    pub page_size: u64,
    /// Rows fetched per round trip when exporting a report.
    pub export_chunk_size: u64,
    /// Days a book may be kept when a loan is recorded without an end date.
    pub loan_period_days: u32,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let database = match project_dirs() {
            Ok(dirs) => dirs.data_dir().join(DATABASE_FILE),
            Err(_) => PathBuf::from(DATABASE_FILE),
        };
        Self { database, page_size: 10, export_chunk_size: 100, loan_period_days: 14, log_level: "warn".to_string() }
    }
}

impl Config {
    /// Resolve the configuration from defaults, a file and the environment.
    ///
    /// An explicitly given file must exist; the per-user file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::File(path.to_path_buf()));
                }
                figment = merge_file(figment, path)?;
            },
            None => match default_config_file() {
                Ok(path) if path.is_file() => figment = merge_file(figment, &path)?,
                Ok(_) => {},
                Err(err) => tracing::debug!(reason = %*err, "no per-user configuration file"),
            },
        }
        let config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no command could work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("page_size"));
        }
        if self.export_chunk_size == 0 {
            exn::bail!(ErrorKind::Invalid("export_chunk_size"));
        }
        if self.loan_period_days == 0 {
            exn::bail!(ErrorKind::Invalid("loan_period_days"));
        }
        if self.log_level.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("log_level"));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    tracing::debug!(path = %path.display(), "reading configuration file");
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    let figment = match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::File(path.to_path_buf())),
    };
    Ok(figment)
}
