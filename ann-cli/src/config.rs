//! Settings shared by every subcommand.
//!
//! Precedence, lowest first: TOML file, `ANN_*` environment, flags.

use std::path::{Path, PathBuf};

use ann::logging::native_log_level;
use ann::{AnnConfig, LoadOptions, NetworkCache, TuningLevel};
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// Adapter library to load instead of libann.so
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); also sets the adapter's log level
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// GPU tuning level: 0 (read tuning file), 1, 2 or 3
    #[arg(long, global = true)]
    pub tuning_level: Option<i32>,

    /// Tuning data file
    #[arg(long, global = true)]
    pub tuning_file: Option<PathBuf>,

    /// Reduce fp32 to fp16
    #[arg(long, global = true)]
    pub fp16: bool,

    /// Disable fast math kernels
    #[arg(long, global = true)]
    pub no_fast_math: bool,

    /// Optimized-network cache file, written when missing
    #[arg(long, global = true)]
    pub cache_file: Option<PathBuf>,
}

/// Resolves the binding config, reading `ANN_*` variables through `env`.
pub fn build_config(args: &ConfigArgs, env: impl Fn(&str) -> Option<String>) -> Result<AnnConfig> {
    let mut config = match &args.config {
        Some(path) => AnnConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AnnConfig::default(),
    };
    config.apply_overrides(env)?;

    if let Some(library) = &args.library {
        config.library_path = Some(library.clone());
    }
    if let Some(log) = &args.log {
        config.log_level = native_log_level(log)?;
    }
    if let Some(level) = args.tuning_level {
        config.tuning_level = TuningLevel::try_from(level)?;
    }
    if let Some(file) = &args.tuning_file {
        config.tuning_file = Some(file.clone());
    }
    if args.fp16 {
        config.fp16 = true;
    }
    if args.no_fast_math {
        config.fast_math = false;
    }
    Ok(config)
}

/// Load options for `model`, with `cache_file` prepared when given.
///
/// The model path is checked before any cache file is created. The returned
/// cache should be discarded if the load fails.
pub fn load_options(
    config: &AnnConfig,
    model: &Path,
    cache_file: Option<&Path>,
) -> Result<(LoadOptions, Option<NetworkCache>)> {
    let options = config.load_options();
    options.validate(model)?;
    match cache_file {
        Some(path) => {
            let cache = NetworkCache::prepare(path)
                .with_context(|| format!("creating {}", path.display()))?;
            Ok((cache.apply(options), Some(cache)))
        }
        None => Ok((options, None)),
    }
}
