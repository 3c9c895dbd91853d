//! Configuration Loading
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, and `TAPECAT_`-prefixed environment variables.

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the catalogue database file.
    pub database: PathBuf,
    /// Maximum attempts per catalogue operation on lost connections.
    pub max_tries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            max_tries: tapecat_catalogue::DEFAULT_MAX_TRIES,
        }
    }
}

impl Config {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed("TAPECAT_"))
            .extract()
            .or_raise(|| ErrorKind::Config)
    }
}

fn default_database_path() -> PathBuf {
    ProjectDirs::from("", "", "tapecat")
        .map(|dirs| dirs.data_dir().join("catalogue.db"))
        .unwrap_or_else(|| PathBuf::from("tapecat.db"))
}
