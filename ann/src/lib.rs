//! Safe binding for the Arm NN inference adapter (`libann.so`).
//!
//! The adapter owns model parsing, optimization and execution on the GPU.
//! This crate only loads it, validates what is handed across the C ABI and
//! marshals tensor pointers in and out.

pub mod config;
pub mod error;
pub mod library;
pub mod logging;
pub mod options;
pub mod runtime;
pub mod session;
pub mod shape;
pub mod sys;

pub use config::AnnConfig;
pub use error::{Error, Result};
pub use library::{is_available, AnnLibrary};
pub use logging::init_logging;
pub use options::{AnnOptions, LoadOptions, LogLevel, TuningLevel};
pub use runtime::{Ann, NetworkId, NetworkShapes};
pub use session::{AnnNode, AnnSession, NetworkCache};
pub use shape::{decode_shape, pack_shape, Shape};

/// Model file extensions the adapter knows how to parse.
pub const MODEL_EXTENSIONS: [&str; 3] = ["armnn", "tflite", "onnx"];
