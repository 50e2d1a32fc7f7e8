//! Helpers behind the `ann` command-line tool.

pub mod bench;
pub mod config;
pub mod tensor_io;

pub use bench::{random_inputs, BenchReport};
pub use tensor_io::{read_tensor, write_tensor};
