//! Packed tensor shapes.
//!
//! The adapter's `shape` call returns up to four 16-bit dimensions packed
//! into one 64-bit value, first dimension in the lowest bits.

use std::os::raw::c_ulong;

/// Dimensions of one tensor.
pub type Shape = Vec<usize>;

const DIM_BITS: u32 = 16;
const DIM_MASK: u64 = 0xFFFF;
const MAX_DIMS: usize = 4;

/// Unpacks a shape returned by the native `shape` call.
///
/// Decoding stops at the first zero remainder, so a packed value of 0 is the
/// empty shape.
pub fn decode_shape(packed: c_ulong) -> Shape {
    let mut packed = packed as u64;
    let mut dims = Vec::with_capacity(MAX_DIMS);
    while packed != 0 {
        dims.push((packed & DIM_MASK) as usize);
        packed >>= DIM_BITS;
    }
    dims
}

/// Packs `dims` the way the adapter does. Returns `None` for more than four
/// dimensions or a dimension outside `1..=0xFFFF`.
pub fn pack_shape(dims: &[usize]) -> Option<c_ulong> {
    if dims.len() > MAX_DIMS {
        return None;
    }
    let mut packed = 0u64;
    for (d, &dim) in dims.iter().enumerate() {
        if dim == 0 || dim as u64 > DIM_MASK {
            return None;
        }
        packed |= (dim as u64) << (d as u32 * DIM_BITS);
    }
    Some(packed as c_ulong)
}
