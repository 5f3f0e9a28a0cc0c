//! IDX container parsing (MNIST and derivatives: Fashion-MNIST, EMNIST, ...).
//!
//! # IDX3 image file layout
//! ```text
//! bytes  0-3:   0x00000803  (magic: uint8 payload, 3 dimensions)
//! bytes  4-7:   N           (number of images, big-endian u32)
//! bytes  8-11:  rows        (image height in pixels, big-endian u32)
//! bytes 12-15:  cols        (image width in pixels, big-endian u32)
//! bytes 16..:   N * rows * cols bytes, row-major, uint8
//! ```
//!
//! # IDX1 label file layout
//! ```text
//! bytes  0-3:   0x00000801  (magic: uint8 payload, 1 dimension)
//! bytes  4-7:   N           (number of labels, big-endian u32)
//! bytes  8..:   N bytes, each a class index in [0, n_classes)
//! ```

use std::io::Cursor;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::info;

use crate::data::dataset::{one_hot, Dataset};
use crate::error::{NnError, Result};

pub const IMAGE_MAGIC: u32 = 0x0000_0803;
pub const LABEL_MAGIC: u32 = 0x0000_0801;

/// Decoded IDX3 images, each flattened row-major and scaled to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub rows: usize,
    pub cols: usize,
    pub images: Vec<Vec<f64>>,
}

/// Parses an IDX3 image file. `limit` keeps only the first `limit` images.
pub fn parse_images(bytes: &[u8], limit: Option<usize>) -> Result<IdxImages> {
    let mut cursor = Cursor::new(bytes);
    let magic = header_u32(&mut cursor, "image")?;
    if magic != IMAGE_MAGIC {
        return Err(NnError::InvalidData(format!(
            "IDX image file: magic number mismatch (got {:#010x}, expected {:#010x})",
            magic, IMAGE_MAGIC
        )));
    }
    let n_items = header_u32(&mut cursor, "image")? as usize;
    let rows = header_u32(&mut cursor, "image")? as usize;
    let cols = header_u32(&mut cursor, "image")? as usize;

    let n_pixels = rows.checked_mul(cols).filter(|&n| n > 0).ok_or_else(|| {
        NnError::InvalidData(format!("IDX image file: unusable image size {}x{}", rows, cols))
    })?;
    let wanted = limit.map_or(n_items, |l| l.min(n_items));
    let needed = wanted.checked_mul(n_pixels).ok_or_else(|| {
        NnError::InvalidData("IDX image file: payload size overflows usize".to_owned())
    })?;

    let payload = &bytes[cursor.position() as usize..];
    if payload.len() < needed {
        return Err(NnError::InvalidData(format!(
            "IDX image file too short: {} images of {}x{} need {} payload bytes, found {}",
            wanted,
            rows,
            cols,
            needed,
            payload.len()
        )));
    }

    let images = payload[..needed]
        .chunks_exact(n_pixels)
        .map(|chunk| chunk.iter().map(|&px| px as f64 / 255.0).collect())
        .collect();

    Ok(IdxImages { rows, cols, images })
}

/// Parses an IDX1 label file into raw class indices.
pub fn parse_labels(bytes: &[u8], limit: Option<usize>) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(bytes);
    let magic = header_u32(&mut cursor, "label")?;
    if magic != LABEL_MAGIC {
        return Err(NnError::InvalidData(format!(
            "IDX label file: magic number mismatch (got {:#010x}, expected {:#010x})",
            magic, LABEL_MAGIC
        )));
    }
    let n_items = header_u32(&mut cursor, "label")? as usize;
    let wanted = limit.map_or(n_items, |l| l.min(n_items));

    let payload = &bytes[cursor.position() as usize..];
    if payload.len() < wanted {
        return Err(NnError::InvalidData(format!(
            "IDX label file too short: header declares {} labels, file holds {}",
            n_items,
            payload.len()
        )));
    }
    let labels = payload[..wanted].to_vec();
    Ok(labels)
}

/// Parses an image file and a label file into a dataset of normalized inputs
/// and one-hot targets.
pub fn parse_idx_pair(
    image_bytes: &[u8],
    label_bytes: &[u8],
    n_classes: usize,
    limit: Option<usize>,
) -> Result<Dataset> {
    if n_classes < 2 {
        return Err(NnError::InvalidConfig(format!("n_classes must be at least 2, got {}", n_classes)));
    }

    let images = parse_images(image_bytes, limit)?;
    let labels = parse_labels(label_bytes, limit)?;
    if images.images.len() != labels.len() {
        return Err(NnError::InvalidData(format!(
            "IDX file mismatch: {} images but {} labels",
            images.images.len(),
            labels.len()
        )));
    }

    let mut targets = Vec::with_capacity(labels.len());
    for (i, &class) in labels.iter().enumerate() {
        let class = class as usize;
        if class >= n_classes {
            return Err(NnError::InvalidData(format!(
                "IDX label at index {}: class {} is out of range for {} classes",
                i, class, n_classes
            )));
        }
        targets.push(one_hot(class, n_classes));
    }

    Dataset::new(images.images, targets)
}

/// Reads and parses an image/label file pair from disk.
pub fn load_idx_pair<P: AsRef<Path>, Q: AsRef<Path>>(
    images_path: P,
    labels_path: Q,
    n_classes: usize,
    limit: Option<usize>,
) -> Result<Dataset> {
    let image_bytes = std::fs::read(images_path.as_ref())?;
    let label_bytes = std::fs::read(labels_path.as_ref())?;
    let dataset = parse_idx_pair(&image_bytes, &label_bytes, n_classes, limit)?;
    info!(
        images = %images_path.as_ref().display(),
        samples = dataset.len(),
        input_size = dataset.input_size().unwrap_or(0),
        "loaded IDX dataset"
    );
    Ok(dataset)
}

fn header_u32(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u32> {
    cursor.read_u32::<BigEndian>().map_err(|_| {
        NnError::InvalidData(format!("IDX {} file too short: truncated header", what))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_file(n: u32, rows: u32, cols: u32, pixels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&IMAGE_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&n.to_be_bytes());
        bytes.extend_from_slice(&rows.to_be_bytes());
        bytes.extend_from_slice(&cols.to_be_bytes());
        bytes.extend_from_slice(pixels);
        bytes
    }

    fn label_file(labels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LABEL_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        bytes.extend_from_slice(labels);
        bytes
    }

    #[test]
    fn parses_images_and_normalizes() {
        let bytes = image_file(2, 1, 2, &[0, 255, 51, 102]);
        let parsed = parse_images(&bytes, None).unwrap();
        assert_eq!((parsed.rows, parsed.cols), (1, 2));
        assert_eq!(parsed.images, vec![vec![0.0, 1.0], vec![0.2, 0.4]]);
    }

    #[test]
    fn limit_keeps_prefix() {
        let bytes = image_file(3, 1, 1, &[10, 20, 30]);
        assert_eq!(parse_images(&bytes, Some(2)).unwrap().images.len(), 2);
        assert_eq!(parse_images(&bytes, Some(10)).unwrap().images.len(), 3);
        assert_eq!(parse_labels(&label_file(&[1, 2, 3]), Some(1)).unwrap(), vec![1]);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = image_file(1, 1, 1, &[0]);
        bytes[3] = 0x01;
        assert!(matches!(parse_images(&bytes, None), Err(NnError::InvalidData(_))));
        assert!(matches!(parse_labels(&image_file(1, 1, 1, &[0]), None), Err(NnError::InvalidData(_))));
    }

    #[test]
    fn rejects_truncated_files() {
        assert!(parse_images(&image_file(2, 2, 2, &[0; 7]), None).is_err());
        assert!(parse_images(&IMAGE_MAGIC.to_be_bytes(), None).is_err());
        let mut labels = label_file(&[1, 2, 3]);
        labels.pop();
        assert!(parse_labels(&labels, None).is_err());
    }

    #[test]
    fn label_count_beyond_payload_is_rejected() {
        let mut bytes = LABEL_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(parse_labels(&bytes, None), Err(NnError::InvalidData(_))));
        assert_eq!(parse_labels(&bytes, Some(0)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn pair_builds_one_hot_targets() {
        let ds = parse_idx_pair(&image_file(2, 1, 1, &[0, 255]), &label_file(&[2, 0]), 3, None).unwrap();
        assert_eq!(ds.targets(), &[vec![0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0]]);
        assert_eq!(ds.inputs(), &[vec![0.0], vec![1.0]]);
    }

    #[test]
    fn pair_rejects_out_of_range_label_and_count_mismatch() {
        let images = image_file(2, 1, 1, &[0, 255]);
        assert!(parse_idx_pair(&images, &label_file(&[0, 9]), 3, None).is_err());
        assert!(parse_idx_pair(&images, &label_file(&[0]), 3, None).is_err());
        assert!(parse_idx_pair(&images, &label_file(&[0, 1]), 1, None).is_err());
    }
}
