//! Error types for the ANN binding.

use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::NetworkId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not load shared library `{name}`: {source}")]
    LibraryLoad {
        name: String,
        #[source]
        source: libloading::Error,
    },

    #[error("shared library `{library}` does not export `{symbol}`: {source}")]
    MissingSymbol {
        library: String,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("ANN shared libraries are not available: {0}")]
    Unavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("ANN runtime initialization returned a null context")]
    InitFailed,

    #[error("Failed to load network from `{}` (status {status})", path.display())]
    LoadFailed { path: PathBuf, status: i32 },

    #[error("Unknown network id {0}")]
    UnknownNetwork(NetworkId),

    #[error("Tensor index {index} out of range for network {network} ({count} tensors)")]
    TensorIndex {
        network: NetworkId,
        index: usize,
        count: usize,
    },

    #[error("input_tensors lengths {actual} != network inputs {expected}")]
    InputCount { expected: usize, actual: usize },

    #[error("input_tensor shape {actual:?} != network input shape {expected:?}")]
    InputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
