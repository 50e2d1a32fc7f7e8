//! Binding configuration.
//!
//! Read from TOML, then overridden by `ANN_*` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::library::AnnLibrary;
use crate::options::{AnnOptions, LoadOptions, LogLevel, TuningLevel};

pub const ENV_PREFIX: &str = "ANN_";
pub const DEFAULT_CACHE_FOLDER: &str = "/cache";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnConfig {
    /// Adapter library to load instead of `libann.so` from the search path.
    pub library_path: Option<PathBuf>,
    /// Folder for tuning data and network caches.
    pub cache_folder: PathBuf,
    pub log_level: LogLevel,
    pub tuning_level: TuningLevel,
    pub tuning_file: Option<PathBuf>,
    pub fast_math: bool,
    pub fp16: bool,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            cache_folder: PathBuf::from(DEFAULT_CACHE_FOLDER),
            log_level: LogLevel::default(),
            tuning_level: TuningLevel::default(),
            tuning_file: None,
            fast_math: true,
            fp16: false,
        }
    }
}

impl AnnConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `ANN_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(path) = var("LIBRARY_PATH") {
            self.library_path = Some(PathBuf::from(path));
        }
        if let Some(folder) = var("CACHE_FOLDER") {
            self.cache_folder = PathBuf::from(folder);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = LogLevel::try_from(parse_int("LOG_LEVEL", &level)?)?;
        }
        if let Some(level) = var("TUNING_LEVEL") {
            self.tuning_level = TuningLevel::try_from(parse_int("TUNING_LEVEL", &level)?)?;
        }
        if let Some(file) = var("TUNING_FILE") {
            self.tuning_file = Some(PathBuf::from(file));
        }
        if let Some(value) = var("FAST_MATH") {
            self.fast_math = parse_bool("FAST_MATH", &value)?;
        }
        if let Some(value) = var("FP16") {
            self.fp16 = parse_bool("FP16", &value)?;
        }
        Ok(())
    }

    pub fn ann_options(&self) -> AnnOptions {
        AnnOptions {
            log_level: self.log_level,
            tuning_level: self.tuning_level,
            tuning_file: self.tuning_file.clone(),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::new().fast_math(self.fast_math).fp16(self.fp16)
    }

    /// The configured adapter, or the process-wide default one.
    pub fn open_library(&self) -> Result<Arc<AnnLibrary>> {
        match &self.library_path {
            Some(path) => Ok(Arc::new(AnnLibrary::open_with_driver(path)?)),
            None => AnnLibrary::global(),
        }
    }
}

fn parse_int(name: &str, value: &str) -> Result<i32> {
    value.trim().parse().map_err(|_| {
        Error::InvalidConfig(format!("{ENV_PREFIX}{name} must be an integer, got `{value}`"))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!(
            "{ENV_PREFIX}{name} must be a boolean, got `{value}`"
        ))),
    }
}
