/// RLE (Run-Length Encoding) decoder for COCO segmentation masks
///
/// RLE format: {"size": [height, width], "counts": [run1, run2, ...]}
/// Counts alternate between 0s and 1s, starting with 0s.
/// IMPORTANT: COCO RLE uses COLUMN-MAJOR (Fortran) order!
///
/// `counts` may also be the compressed string form written by pycocotools.
use super::mask::Mask;
use super::parser::{Rle, RleCounts, Segmentation};
use crate::error::{CocoError, Result};

/// Decode RLE to a row-major binary mask.
///
/// Counts may cover fewer pixels than `size`; the rest stays background.
/// Counts that run past the end, or a size above [`MAX_MASK_PIXELS`], are
/// rejected before anything is allocated.
///
/// [`MAX_MASK_PIXELS`]: super::mask::MAX_MASK_PIXELS
pub fn decode(rle: &Rle) -> Result<Mask> {
    let height = rle.size[0] as usize;
    let width = rle.size[1] as usize;

    let counts = match &rle.counts {
        RleCounts::Uncompressed(counts) => counts.clone(),
        RleCounts::Compressed(s) => decode_counts_string(s)?,
    };

    let covered: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    let total_pixels = (height as u64).checked_mul(width as u64);
    if total_pixels.map_or(true, |total| covered > total) {
        return Err(CocoError::InvalidRle(format!(
            "counts cover {} pixels but the mask is {}x{}",
            covered, height, width
        )));
    }

    let mut mask = Mask::new(width, height)?;
    let mut pos = 0usize;
    let mut value = false; // Start with background

    for &count in &counts {
        let end = pos + count as usize;

        if value {
            for i in pos..end {
                // Column-major position -> row-major storage
                let row = i % height;
                let col = i / height;
                mask.data[row * width + col] = true;
            }
        }

        pos = end;
        value = !value;
    }

    Ok(mask)
}

/// Decode the compressed COCO counts string.
///
/// Each count is stored as 5-bit groups in printable chars (offset 48), with
/// bit 0x20 marking continuation and bit 0x10 of the last group carrying the
/// sign. From the fourth count on, values are deltas against the count two
/// positions back.
pub fn decode_counts_string(s: &str) -> Result<Vec<u32>> {
    let bytes = s.as_bytes();
    let mut counts: Vec<u32> = Vec::new();
    let mut p = 0usize;

    while p < bytes.len() {
        let mut x: i64 = 0;
        let mut k = 0u32;
        loop {
            let Some(&byte) = bytes.get(p) else {
                return Err(CocoError::InvalidRle(format!(
                    "counts string ends inside a value at byte {p}"
                )));
            };
            let c = i64::from(byte) - 48;
            if !(0..64).contains(&c) || k > 11 {
                return Err(CocoError::InvalidRle(format!(
                    "invalid byte {byte:#04x} at position {p}"
                )));
            }

            x |= (c & 0x1f) << (5 * k);
            p += 1;
            k += 1;

            if c & 0x20 == 0 {
                if c & 0x10 != 0 {
                    x |= -1i64 << (5 * k);
                }
                break;
            }
        }

        if counts.len() > 2 {
            x = x
                .checked_add(i64::from(counts[counts.len() - 2]))
                .ok_or_else(|| CocoError::InvalidRle(format!("run length overflows at byte {p}")))?;
        }
        let count = u32::try_from(x).map_err(|_| {
            CocoError::InvalidRle(format!("run length {x} out of range at count {}", counts.len()))
        })?;
        counts.push(count);
    }

    Ok(counts)
}

impl Segmentation {
    /// Rasterize polygons or decode RLE into a mask of the given size.
    pub fn to_mask(&self, height: usize, width: usize) -> Result<Mask> {
        match self {
            Segmentation::Polygons(polygons) => Mask::from_polygons(polygons, width, height),
            Segmentation::Rle(rle) => {
                let mask = decode(rle)?;
                if mask.width != width || mask.height != height {
                    return Err(CocoError::InvalidRle(format!(
                        "RLE size {}x{} does not match image size {}x{}",
                        mask.height, mask.width, height, width
                    )));
                }
                Ok(mask)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rle_decode() {
        // Simple 3x3 mask with center pixel set
        let rle = Rle {
            size: [3, 3],
            counts: RleCounts::Uncompressed(vec![4, 1, 4]),
        };

        let mask = decode(&rle).unwrap();
        assert_eq!(mask.data.len(), 9);
        assert_eq!(mask.area(), 1);
        assert!(mask.get(1, 1));
    }

    #[test]
    fn test_rle_is_column_major() {
        // 2 rows x 3 cols, second column set
        let rle = Rle {
            size: [2, 3],
            counts: RleCounts::Uncompressed(vec![2, 2, 2]),
        };

        let mask = decode(&rle).unwrap();
        assert_eq!(mask.width, 3);
        assert_eq!(mask.height, 2);
        assert_eq!(mask.data, vec![false, true, false, false, true, false]);
    }

    #[test]
    fn test_rle_overrun_is_rejected() {
        let rle = Rle {
            size: [2, 2],
            counts: RleCounts::Uncompressed(vec![1, 5]),
        };
        assert!(matches!(decode(&rle), Err(CocoError::InvalidRle(_))));
    }

    #[test]
    fn test_compressed_counts() {
        assert_eq!(decode_counts_string("414").unwrap(), vec![4, 1, 4]);
        assert_eq!(decode_counts_string("X1").unwrap(), vec![40]);
        // Fourth value is a delta of +1 against the second count
        assert_eq!(decode_counts_string("4141").unwrap(), vec![4, 1, 4, 2]);
        assert!(decode_counts_string("X").is_err());
    }

    #[test]
    fn test_compressed_counts_out_of_range() {
        // Twelve 5-bit groups decode to a value far above u32::MAX
        let huge = format!("{}?", "o".repeat(11)).repeat(40);
        assert!(matches!(decode_counts_string(&huge), Err(CocoError::InvalidRle(_))));

        // 'K' is -5: negative as a first count, and as a delta taking 1 to -4
        assert!(decode_counts_string("K").is_err());
        assert!(decode_counts_string("414K").is_err());

        // A delta that lifts the count past u32::MAX
        let max_then_delta = format!("414{}3", "o".repeat(6));
        assert!(decode_counts_string(&max_then_delta).is_err());
    }

    #[test]
    fn test_oversized_rle_is_rejected() {
        let rle = Rle {
            size: [u32::MAX, u32::MAX],
            counts: RleCounts::Uncompressed(vec![0]),
        };
        assert!(matches!(decode(&rle), Err(CocoError::MaskTooLarge { .. })));

        let rle = Rle {
            size: [u32::MAX, u32::MAX],
            counts: RleCounts::Uncompressed(vec![u32::MAX; 3]),
        };
        assert!(decode(&rle).is_err());
    }

    #[test]
    fn test_compressed_rle_decode() {
        let rle = Rle {
            size: [3, 3],
            counts: RleCounts::Compressed("414".to_string()),
        };
        let mask = decode(&rle).unwrap();
        assert!(mask.get(1, 1));
        assert_eq!(mask.area(), 1);
    }

    #[test]
    fn test_segmentation_to_mask() {
        let polygons = Segmentation::Polygons(vec![vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0, 0.0, 2.0]]);
        assert_eq!(polygons.to_mask(4, 4).unwrap().area(), 4);

        let rle = Segmentation::Rle(Rle {
            size: [3, 3],
            counts: RleCounts::Uncompressed(vec![4, 1, 4]),
        });
        assert!(rle.to_mask(3, 3).is_ok());
        assert!(rle.to_mask(4, 4).is_err());
    }
}
