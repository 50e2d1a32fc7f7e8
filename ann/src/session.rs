//! Session wrapper shaped like an ONNX Runtime session, so callers can swap
//! ANN in without changing how they feed inputs.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayViewD};
use tracing::{info, warn};

use crate::config::AnnConfig;
use crate::error::Result;
use crate::options::{AnnOptions, LoadOptions, TuningLevel};
use crate::runtime::{Ann, NetworkId};
use crate::shape::Shape;

/// Tuning data file kept in the cache folder.
pub const TUNING_FILE_NAME: &str = "gpu-tuning.ann";
/// Extension of the optimized-network cache stored next to each model.
pub const CACHE_EXTENSION: &str = "anncache";

/// A session input or output. ANN bindings carry no names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnNode {
    pub name: Option<String>,
    pub shape: Shape,
}

/// One loaded model on a (usually shared) ANN context.
pub struct AnnSession {
    ann: Ann,
    model: NetworkId,
    model_path: PathBuf,
}

impl AnnSession {
    /// Loads `model_path` on the process-wide context described by `config`.
    pub fn new(model_path: impl AsRef<Path>, config: &AnnConfig) -> Result<Self> {
        let library = config.open_library()?;
        let mut options = session_options(&config.cache_folder)?;
        options.log_level = config.log_level;
        let ann = Ann::shared(library, options)?;
        Self::with_ann(ann, model_path, config.load_options())
    }

    /// Loads `model_path` on `ann`, reusing or creating its network cache.
    ///
    /// The cache lives next to the model with the `.anncache` extension. It
    /// is written only when it did not exist yet.
    pub fn with_ann(ann: Ann, model_path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();
        info!("Loading ANN model {} ...", model_path.display());

        LoadOptions::new().validate(&model_path)?;
        let cache = NetworkCache::for_model(&model_path)?;
        let options = cache.apply(options);

        let model = match ann.load(&model_path, &options) {
            Ok(model) => model,
            Err(err) => {
                cache.discard();
                return Err(err);
            }
        };
        info!("Loaded ANN model with ID {model}");
        Ok(Self {
            ann,
            model,
            model_path,
        })
    }

    pub fn inputs(&self) -> Vec<AnnNode> {
        nodes(self.ann.input_shapes(self.model))
    }

    pub fn outputs(&self) -> Vec<AnnNode> {
        nodes(self.ann.output_shapes(self.model))
    }

    /// Runs the model on inputs given in binding order.
    pub fn run(&self, inputs: &[ArrayViewD<'_, f32>]) -> Result<Vec<ArrayD<f32>>> {
        self.ann.execute(self.model, inputs)
    }

    pub fn network_id(&self) -> NetworkId {
        self.model
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn ann(&self) -> &Ann {
        &self.ann
    }
}

impl Drop for AnnSession {
    fn drop(&mut self) {
        match self.ann.unload(self.model) {
            Ok(()) => info!("Unloaded ANN model {}", self.model),
            Err(err) => warn!("Failed to unload ANN model {}: {err}", self.model),
        }
    }
}

impl std::fmt::Debug for AnnSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnSession")
            .field("model", &self.model)
            .field("model_path", &self.model_path)
            .finish()
    }
}

/// Optimized-network cache file handed to `load`.
///
/// A missing file is created empty and marked for saving. If the load then
/// fails, [`NetworkCache::discard`] removes it again so a later load still
/// writes the cache.
#[derive(Debug)]
pub struct NetworkCache {
    path: PathBuf,
    created: bool,
}

impl NetworkCache {
    pub fn prepare(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let created = !path.exists();
        if created {
            touch(&path)?;
        }
        Ok(Self { path, created })
    }

    /// The `.anncache` file next to `model_path`.
    pub fn for_model(model_path: &Path) -> Result<Self> {
        Self::prepare(model_path.with_extension(CACHE_EXTENSION))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the adapter is asked to write the cache.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn apply(&self, options: LoadOptions) -> LoadOptions {
        options
            .save_cached_network(self.created)
            .cached_network_path(&self.path)
    }

    /// Removes the file if [`NetworkCache::prepare`] created it.
    pub fn discard(self) {
        if !self.created {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("Failed to remove network cache {}: {err}", self.path.display());
        }
    }
}

/// Context options for sessions: exhaustive tuning persisted in
/// `<cache_folder>/gpu-tuning.ann`, created empty when missing.
pub fn session_options(cache_folder: &Path) -> Result<AnnOptions> {
    fs::create_dir_all(cache_folder)?;
    let tuning_file = cache_folder.join(TUNING_FILE_NAME);
    touch(&tuning_file)?;
    Ok(AnnOptions::new()
        .tuning_level(TuningLevel::Exhaustive)
        .tuning_file(tuning_file))
}

fn touch(path: &Path) -> Result<()> {
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

fn nodes(shapes: Option<Vec<Shape>>) -> Vec<AnnNode> {
    shapes
        .unwrap_or_default()
        .into_iter()
        .map(|shape| AnnNode { name: None, shape })
        .collect()
}
