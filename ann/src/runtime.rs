//! The ANN runtime context.
//!
//! An [`Ann`] owns one native context created by `init`. Handles are cheap
//! clones; `destroy` runs when the last one is dropped. Every native call on
//! a context goes through its lock, together with the cache of tensor shapes
//! for the networks loaded on it.

use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::fmt;
use std::os::raw::c_int;
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Weak};

use ndarray::{ArrayD, ArrayViewD, CowArray, IxDyn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::library::AnnLibrary;
use crate::options::{AnnOptions, LoadOptions};
use crate::shape::{decode_shape, Shape};
use crate::sys::{AnnApi, AnnHandle, RawNetworkId};

static SHARED: Lazy<Mutex<Weak<Inner>>> = Lazy::new(|| Mutex::new(Weak::new()));

/// Identifier of a network loaded on a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(RawNetworkId);

impl NetworkId {
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input and output tensor shapes of a loaded network.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkShapes {
    pub inputs: Vec<Shape>,
    pub outputs: Vec<Shape>,
}

struct Context {
    handle: AnnHandle,
    networks: HashMap<NetworkId, NetworkShapes>,
}

// SAFETY: the handle is only dereferenced by the adapter, and only while the
// owning `Mutex<Context>` is held.
unsafe impl Send for Context {}

impl Context {
    fn tensors(&self, api: &AnnApi, id: NetworkId, is_input: bool) -> usize {
        // SAFETY: `handle` is a live context and `id` was returned by `load`
        // on it.
        let count = unsafe { (api.tensors)(self.handle, id.0, is_input) };
        count.max(0) as usize
    }

    fn shape(&self, api: &AnnApi, id: NetworkId, is_input: bool, index: usize) -> Shape {
        // SAFETY: as above, and `index` is below the adapter's tensor count.
        let packed = unsafe { (api.shape)(self.handle, id.0, is_input, index as c_int) };
        decode_shape(packed)
    }

    fn shapes(&self, api: &AnnApi, id: NetworkId, is_input: bool) -> Vec<Shape> {
        (0..self.tensors(api, id, is_input))
            .map(|index| self.shape(api, id, is_input, index))
            .collect()
    }

    fn known(&self, id: NetworkId) -> Result<&NetworkShapes> {
        self.networks.get(&id).ok_or(Error::UnknownNetwork(id))
    }
}

struct Inner {
    library: Arc<AnnLibrary>,
    options: AnnOptions,
    context: Mutex<Context>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let context = self.context.get_mut();
        if !context.networks.is_empty() {
            debug!(
                networks = context.networks.len(),
                "destroying ANN context with networks still loaded"
            );
        }
        // SAFETY: last reference to a handle returned by `init`.
        unsafe { (self.library.api().destroy)(context.handle) };
        debug!("destroyed ANN context");
    }
}

/// Handle to a native ANN runtime context.
#[derive(Clone)]
pub struct Ann {
    inner: Arc<Inner>,
}

impl Ann {
    /// Creates a new native context.
    pub fn new(library: Arc<AnnLibrary>, options: AnnOptions) -> Result<Self> {
        options.validate()?;
        let tuning_file = options
            .tuning_file
            .as_deref()
            .map(path_to_cstring)
            .transpose()?;

        // SAFETY: `tuning_file` outlives the call; the adapter copies it.
        let handle = unsafe {
            (library.api().init)(
                options.log_level.into(),
                options.tuning_level.into(),
                tuning_file.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            )
        };
        if handle.is_null() {
            return Err(Error::InitFailed);
        }
        info!(
            log_level = ?options.log_level,
            tuning_level = ?options.tuning_level,
            tuning_file = ?options.tuning_file,
            "created ANN context"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                library,
                options,
                context: Mutex::new(Context {
                    handle,
                    networks: HashMap::new(),
                }),
            }),
        })
    }

    /// Returns the process-wide context, creating it on first use.
    ///
    /// While any handle to the shared context is alive, later calls return
    /// another handle to it and their `library` and `options` are ignored.
    pub fn shared(library: Arc<AnnLibrary>, options: AnnOptions) -> Result<Self> {
        let mut slot = SHARED.lock();
        if let Some(inner) = slot.upgrade() {
            if inner.options != options {
                debug!(
                    active = ?inner.options,
                    requested = ?options,
                    "shared ANN context exists, ignoring requested options"
                );
            }
            let ann = Self { inner };
            debug!(ref_count = ann.ref_count(), "reusing shared ANN context");
            return Ok(ann);
        }

        let ann = Self::new(library, options)?;
        *slot = Arc::downgrade(&ann.inner);
        Ok(ann)
    }

    /// Number of live handles to this context.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn options(&self) -> &AnnOptions {
        &self.inner.options
    }

    /// Whether two handles share the same native context.
    pub fn same_context(&self, other: &Ann) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Loads a model and caches its tensor shapes.
    pub fn load(&self, model_path: impl AsRef<Path>, options: &LoadOptions) -> Result<NetworkId> {
        let model_path = model_path.as_ref();
        options.validate(model_path)?;
        let path = path_to_cstring(model_path)?;
        let cache = options
            .cached_network_path
            .as_deref()
            .map(path_to_cstring)
            .transpose()?;

        let api = self.api();
        let mut context = self.inner.context.lock();
        // SAFETY: both strings outlive the call.
        let raw = unsafe {
            (api.load)(
                context.handle,
                path.as_ptr(),
                options.fast_math,
                options.fp16,
                options.save_cached_network,
                cache.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            )
        };
        if raw < 0 {
            return Err(Error::LoadFailed {
                path: model_path.to_path_buf(),
                status: raw,
            });
        }

        let id = NetworkId(raw);
        let shapes = NetworkShapes {
            inputs: context.shapes(api, id, true),
            outputs: context.shapes(api, id, false),
        };
        info!(
            network = %id,
            model = %model_path.display(),
            inputs = ?shapes.inputs,
            outputs = ?shapes.outputs,
            "loaded network"
        );
        context.networks.insert(id, shapes);
        Ok(id)
    }

    /// Unloads a network and forgets its shapes.
    pub fn unload(&self, id: NetworkId) -> Result<()> {
        let mut context = self.inner.context.lock();
        if context.networks.remove(&id).is_none() {
            return Err(Error::UnknownNetwork(id));
        }
        // SAFETY: `id` was loaded on this context and not yet unloaded.
        unsafe { (self.api().unload)(context.handle, id.0) };
        debug!(network = %id, "unloaded network");
        Ok(())
    }

    /// Runs a network on `inputs` and returns freshly allocated outputs.
    ///
    /// Inputs must match the network's input shapes in count and order.
    pub fn execute(&self, id: NetworkId, inputs: &[ArrayViewD<'_, f32>]) -> Result<Vec<ArrayD<f32>>> {
        let context = self.inner.context.lock();
        let shapes = context.known(id)?;

        if inputs.len() != shapes.inputs.len() {
            return Err(Error::InputCount {
                expected: shapes.inputs.len(),
                actual: inputs.len(),
            });
        }
        for (expected, input) in shapes.inputs.iter().zip(inputs) {
            if input.shape() != expected.as_slice() {
                return Err(Error::InputShape {
                    expected: expected.clone(),
                    actual: input.shape().to_vec(),
                });
            }
        }

        let inputs: Vec<CowArray<'_, f32, IxDyn>> =
            inputs.iter().map(|input| input.as_standard_layout()).collect();
        let mut outputs: Vec<ArrayD<f32>> = shapes
            .outputs
            .iter()
            .map(|shape| ArrayD::zeros(IxDyn(shape)))
            .collect();

        let input_ptrs: Vec<*const c_void> =
            inputs.iter().map(|input| input.as_ptr().cast()).collect();
        let output_ptrs: Vec<*mut c_void> = outputs
            .iter_mut()
            .map(|output| output.as_mut_ptr().cast())
            .collect();

        // SAFETY: one contiguous buffer per binding, each sized from the
        // shapes the adapter reported at load time.
        unsafe {
            (self.api().execute)(
                context.handle,
                id.0,
                input_ptrs.as_ptr(),
                output_ptrs.as_ptr(),
            )
        };
        Ok(outputs)
    }

    /// Number of input or output tensors of a network, asked of the adapter.
    pub fn tensors(&self, id: NetworkId, is_input: bool) -> Result<usize> {
        let context = self.inner.context.lock();
        context.known(id)?;
        Ok(context.tensors(self.api(), id, is_input))
    }

    /// Shape of one input or output tensor, asked of the adapter.
    pub fn shape(&self, id: NetworkId, is_input: bool, index: usize) -> Result<Shape> {
        let context = self.inner.context.lock();
        context.known(id)?;
        let count = context.tensors(self.api(), id, is_input);
        if index >= count {
            return Err(Error::TensorIndex {
                network: id,
                index,
                count,
            });
        }
        let shape = context.shape(self.api(), id, is_input, index);
        debug!(network = %id, is_input, index, ?shape, "queried tensor shape");
        Ok(shape)
    }

    /// Cached input shapes of a loaded network.
    pub fn input_shapes(&self, id: NetworkId) -> Option<Vec<Shape>> {
        let context = self.inner.context.lock();
        context.networks.get(&id).map(|shapes| shapes.inputs.clone())
    }

    /// Cached output shapes of a loaded network.
    pub fn output_shapes(&self, id: NetworkId) -> Option<Vec<Shape>> {
        let context = self.inner.context.lock();
        context.networks.get(&id).map(|shapes| shapes.outputs.clone())
    }

    pub fn network_shapes(&self, id: NetworkId) -> Option<NetworkShapes> {
        self.inner.context.lock().networks.get(&id).cloned()
    }

    /// Networks currently loaded on this context, in id order.
    pub fn networks(&self) -> Vec<NetworkId> {
        let mut ids: Vec<NetworkId> = self.inner.context.lock().networks.keys().copied().collect();
        ids.sort();
        ids
    }

    fn api(&self) -> &AnnApi {
        self.inner.library.api()
    }
}

impl fmt::Debug for Ann {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ann")
            .field("options", &self.inner.options)
            .field("ref_count", &self.ref_count())
            .field("networks", &self.networks())
            .finish()
    }
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_id_displays_raw_value() {
        assert_eq!(NetworkId(7).to_string(), "7");
        assert_eq!(NetworkId(7).raw(), 7);
    }

    #[test]
    fn interior_nul_is_an_invalid_path() {
        let err = path_to_cstring(Path::new("model\0.onnx")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }
}
