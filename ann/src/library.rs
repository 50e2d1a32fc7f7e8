//! Loading `libann.so` and resolving its symbols.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use libloading::Library;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sys::{self, AnnApi};

/// Mali GPU driver; the adapter cannot run without it.
pub const GPU_DRIVER: &str = "libmali.so";
/// Default adapter library name.
pub const DEFAULT_LIBRARY: &str = "libann.so";

static GLOBAL: OnceCell<std::result::Result<Arc<AnnLibrary>, String>> = OnceCell::new();

/// A loaded adapter together with the libraries that back its symbols.
pub struct AnnLibrary {
    api: AnnApi,
    // Field order matters: the adapter must unload before the driver.
    adapter: Option<Library>,
    driver: Option<Library>,
}

impl AnnLibrary {
    /// Loads the adapter from `path` without probing the GPU driver.
    pub fn open(path: impl AsRef<OsStr>) -> Result<Self> {
        let adapter = load_library(path.as_ref())?;
        let api = resolve(&adapter, &path.as_ref().to_string_lossy())?;
        Ok(Self {
            api,
            adapter: Some(adapter),
            driver: None,
        })
    }

    /// Probes `libmali.so`, then loads `libann.so` from the default search
    /// path.
    pub fn open_default() -> Result<Self> {
        Self::open_with_driver(DEFAULT_LIBRARY)
    }

    /// Probes `libmali.so`, then loads the adapter from `path`.
    pub fn open_with_driver(path: impl AsRef<OsStr>) -> Result<Self> {
        let driver = load_library(OsStr::new(GPU_DRIVER))?;
        let mut library = Self::open(path)?;
        library.driver = Some(driver);
        Ok(library)
    }

    /// Wraps an existing function table, for adapters linked into the
    /// process some other way.
    ///
    /// # Safety
    ///
    /// Every function in `api` must implement the adapter's C contract and
    /// stay callable for as long as the returned value (or any `Ann` built
    /// from it) is alive.
    pub unsafe fn from_api(api: AnnApi) -> Self {
        Self {
            api,
            adapter: None,
            driver: None,
        }
    }

    /// The process-wide default library, loaded on first use.
    ///
    /// The outcome is memoised: a failed load is not retried.
    pub fn global() -> Result<Arc<AnnLibrary>> {
        GLOBAL
            .get_or_init(|| match AnnLibrary::open_default() {
                Ok(library) => {
                    debug!("Loaded ANN shared libraries");
                    Ok(Arc::new(library))
                }
                Err(err) => {
                    warn!("could not load ANN shared libraries, using ONNX: {err}");
                    Err(err.to_string())
                }
            })
            .clone()
            .map_err(Error::Unavailable)
    }

    pub(crate) fn api(&self) -> &AnnApi {
        &self.api
    }
}

impl std::fmt::Debug for AnnLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnLibrary")
            .field("dynamic", &self.adapter.is_some())
            .field("driver", &self.driver.is_some())
            .finish()
    }
}

/// Whether the default ANN libraries could be loaded in this process.
pub fn is_available() -> bool {
    AnnLibrary::global().is_ok()
}

/// Whether `path` names an existing file or a bare library name the
/// dynamic loader should search for.
pub fn looks_loadable(path: &Path) -> bool {
    path.components().count() == 1 || path.is_file()
}

fn load_library(name: &OsStr) -> Result<Library> {
    // SAFETY: loading runs the library's initialisers; the adapter and the
    // Mali driver are trusted system libraries.
    unsafe { Library::new(name) }.map_err(|source| Error::LibraryLoad {
        name: name.to_string_lossy().into_owned(),
        source,
    })
}

fn resolve(library: &Library, name: &str) -> Result<AnnApi> {
    macro_rules! symbol {
        ($sym:literal, $ty:ty) => {{
            // SAFETY: `$ty` is the C signature the adapter exports under
            // this name. The pointer is only used while `library` is alive.
            let sym = unsafe { library.get::<$ty>(concat!($sym, "\0").as_bytes()) };
            *sym.map_err(|source| Error::MissingSymbol {
                library: name.to_string(),
                symbol: $sym,
                source,
            })?
        }};
    }

    let api = AnnApi {
        init: symbol!("init", sys::InitFn),
        destroy: symbol!("destroy", sys::DestroyFn),
        load: symbol!("load", sys::LoadFn),
        unload: symbol!("unload", sys::UnloadFn),
        execute: symbol!("execute", sys::ExecuteFn),
        shape: symbol!("shape", sys::ShapeFn),
        tensors: symbol!("tensors", sys::TensorsFn),
    };
    debug!(library = name, symbols = sys::SYMBOLS.len(), "resolved ANN symbols");
    Ok(api)
}
