//! Typed options for context creation and model loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Native log severity passed to `init` (Arm NN `LogSeverity`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    #[default]
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    /// Maps a `tracing` level onto the closest native severity.
    pub fn from_tracing(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

impl TryFrom<i32> for LogLevel {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Trace),
            1 => Ok(Self::Debug),
            2 => Ok(Self::Info),
            3 => Ok(Self::Warning),
            4 => Ok(Self::Error),
            5 => Ok(Self::Fatal),
            _ => Err(Error::InvalidConfig(
                "log_level must be 0 (trace), 1 (debug), 2 (info), 3 (warning), 4 (error) or 5 (fatal)"
                    .to_string(),
            )),
        }
    }
}

impl From<LogLevel> for i32 {
    fn from(level: LogLevel) -> Self {
        level as i32
    }
}

/// OpenCL kernel tuning level of the GPU backend.
///
/// `ReadOnly` reuses existing tuning data and needs a tuning file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum TuningLevel {
    ReadOnly = 0,
    #[default]
    Rapid = 1,
    Normal = 2,
    Exhaustive = 3,
}

impl TryFrom<i32> for TuningLevel {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::ReadOnly),
            1 => Ok(Self::Rapid),
            2 => Ok(Self::Normal),
            3 => Ok(Self::Exhaustive),
            _ => Err(Error::InvalidConfig(
                "tuning_level must be 0 (load from tuning_file), 1, 2 or 3.".to_string(),
            )),
        }
    }
}

impl From<TuningLevel> for i32 {
    fn from(level: TuningLevel) -> Self {
        level as i32
    }
}

/// Options for creating an ANN runtime context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnOptions {
    pub log_level: LogLevel,
    pub tuning_level: TuningLevel,
    pub tuning_file: Option<PathBuf>,
}

impl AnnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn tuning_level(mut self, level: TuningLevel) -> Self {
        self.tuning_level = level;
        self
    }

    pub fn tuning_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tuning_file = Some(path.into());
        self
    }

    /// Checks the options against the filesystem before they reach `init`.
    pub fn validate(&self) -> Result<()> {
        if let Some(file) = &self.tuning_file {
            if !file.exists() {
                return Err(Error::InvalidConfig(
                    "tuning_file must point to an existing (possibly empty) file!".to_string(),
                ));
            }
        }
        if self.tuning_level == TuningLevel::ReadOnly && self.tuning_file.is_none() {
            return Err(Error::InvalidConfig(
                "tuning_level == 0 reads existing tuning information and requires a tuning_file"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-model options forwarded to the optimizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub fast_math: bool,
    pub fp16: bool,
    pub save_cached_network: bool,
    pub cached_network_path: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fast_math: true,
            fp16: false,
            save_cached_network: false,
            cached_network_path: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fast_math(mut self, enabled: bool) -> Self {
        self.fast_math = enabled;
        self
    }

    pub fn fp16(mut self, enabled: bool) -> Self {
        self.fp16 = enabled;
        self
    }

    pub fn save_cached_network(mut self, enabled: bool) -> Self {
        self.save_cached_network = enabled;
        self
    }

    pub fn cached_network_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cached_network_path = Some(path.into());
        self
    }

    /// Validates a model path together with these options.
    pub fn validate(&self, model_path: &Path) -> Result<()> {
        if !(model_path.is_file() && has_model_extension(model_path)) {
            return Err(Error::InvalidModel(
                "model_path must be a file with extension .armnn, .tflite or .onnx".to_string(),
            ));
        }
        if let Some(cache) = &self.cached_network_path {
            if !cache.exists() {
                return Err(Error::InvalidConfig(
                    "cached_network_path must point to an existing (possibly empty) file!"
                        .to_string(),
                ));
            }
        }
        if self.save_cached_network && self.cached_network_path.is_none() {
            return Err(Error::InvalidConfig(
                "save_cached_network is true, cached_network_path must be specified!".to_string(),
            ));
        }
        Ok(())
    }
}

fn has_model_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| crate::MODEL_EXTENSIONS.contains(&ext))
}
