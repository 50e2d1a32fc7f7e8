use ann_cli::{read_tensor, write_tensor};
use ndarray::{ArrayD, IxDyn};
use tempfile::TempDir;

#[test]
fn written_tensor_reads_back_with_its_shape() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("output-0.f32");
    let tensor = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.25f32, -1.5, 3.0, 8.0])?;

    write_tensor(&path, &tensor)?;
    assert_eq!(std::fs::metadata(&path)?.len(), 16);
    assert_eq!(read_tensor(&path, &[2, 2])?, tensor);
    Ok(())
}

#[test]
fn transposed_tensor_is_written_row_major() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("t.f32");
    let tensor = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let transposed = tensor.t().to_owned();
    assert!(!transposed.is_standard_layout());

    write_tensor(&path, &transposed)?;
    let read = read_tensor(&path, &[3, 2])?;
    assert_eq!(read.as_slice().unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    Ok(())
}

#[test]
fn element_count_must_match_shape() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("short.f32");
    std::fs::write(&path, bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0, 3.0]))?;

    let err = read_tensor(&path, &[1, 4]).unwrap_err();
    assert!(err.to_string().contains("holds 3 values"));
    Ok(())
}

#[test]
fn truncated_values_are_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("odd.f32");
    std::fs::write(&path, [0u8; 6])?;

    let err = read_tensor(&path, &[1]).unwrap_err();
    assert!(err.to_string().contains("not a raw f32 file"));
    Ok(())
}

#[test]
fn empty_file_matches_empty_tensor() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.f32");
    std::fs::write(&path, b"")?;

    assert_eq!(read_tensor(&path, &[0])?.len(), 0);
    assert!(read_tensor(&path, &[1]).is_err());
    Ok(())
}
