//! Raw C ABI of `libann.so`.
//!
//! Use [`crate::Ann`] instead of calling these directly.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_ulong};

/// Opaque pointer to the adapter's runtime object.
pub type AnnHandle = *mut c_void;

/// Native network identifier (`armnn::NetworkId`).
pub type RawNetworkId = c_int;

pub type InitFn =
    unsafe extern "C" fn(log_level: c_int, tuning_level: c_int, tuning_file: *const c_char) -> AnnHandle;
pub type DestroyFn = unsafe extern "C" fn(ann: AnnHandle);
pub type LoadFn = unsafe extern "C" fn(
    ann: AnnHandle,
    path: *const c_char,
    fast_math: bool,
    fp16: bool,
    save_cached_network: bool,
    cached_network_path: *const c_char,
) -> RawNetworkId;
pub type UnloadFn = unsafe extern "C" fn(ann: AnnHandle, net_id: RawNetworkId);
pub type ExecuteFn = unsafe extern "C" fn(
    ann: AnnHandle,
    net_id: RawNetworkId,
    input_data: *const *const c_void,
    output_data: *const *mut c_void,
);
pub type ShapeFn =
    unsafe extern "C" fn(ann: AnnHandle, net_id: RawNetworkId, is_input: bool, index: c_int) -> c_ulong;
pub type TensorsFn = unsafe extern "C" fn(ann: AnnHandle, net_id: RawNetworkId, is_input: bool) -> c_int;

/// Exported symbol names, in the order they are resolved.
pub const SYMBOLS: [&str; 7] = ["init", "destroy", "load", "unload", "execute", "shape", "tensors"];

/// Function table of the adapter.
#[derive(Clone, Copy)]
pub struct AnnApi {
    pub init: InitFn,
    pub destroy: DestroyFn,
    pub load: LoadFn,
    pub unload: UnloadFn,
    pub execute: ExecuteFn,
    pub shape: ShapeFn,
    pub tensors: TensorsFn,
}

impl std::fmt::Debug for AnnApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnApi").finish_non_exhaustive()
    }
}
