//! Raw `f32` tensor files: little-endian values, no header, row-major.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{cast_slice, try_cast_slice};
use memmap2::MmapOptions;
use ndarray::{ArrayD, IxDyn};

/// Reads a tensor of `shape` from `path`, which must hold exactly as many
/// values as the shape has elements.
pub fn read_tensor(path: &Path, shape: &[usize]) -> Result<ArrayD<f32>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let expected: usize = shape.iter().product();

    let values: Vec<f32> = if file.metadata()?.len() == 0 {
        Vec::new()
    } else {
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        decode_le(&mmap[..])
            .map_err(|err| anyhow!("{} is not a raw f32 file: {err}", path.display()))?
    };

    if values.len() != expected {
        bail!(
            "{} holds {} values, input shape {:?} needs {}",
            path.display(),
            values.len(),
            shape,
            expected
        );
    }
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}

/// Writes `tensor` in row-major order.
pub fn write_tensor(path: &Path, tensor: &ArrayD<f32>) -> Result<()> {
    let standard = tensor.as_standard_layout();
    let values = standard
        .as_slice()
        .ok_or_else(|| anyhow!("tensor is not contiguous"))?;
    fs::write(path, encode_le(values)).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn decode_le(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        bail!("{} bytes is not a whole number of f32 values", bytes.len());
    }
    if cfg!(target_endian = "little") {
        if let Ok(values) = try_cast_slice::<u8, f32>(bytes) {
            return Ok(values.to_vec());
        }
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn encode_le(values: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        cast_slice::<f32, u8>(values).to_vec()
    } else {
        values.iter().flat_map(|value| value.to_le_bytes()).collect()
    }
}
