/// Automatic mask generator output
///
/// Each record describes one generated mask. `bbox` and `crop_box` are in
/// xywh format; `segmentation` is COCO RLE.
use std::path::Path;
use serde::{Deserialize, Serialize};
use log::{debug, info};

use super::detections::Detections;
use super::parser::Rle;
use super::rle;
use crate::error::{CocoError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SamMask {
    pub segmentation: Rle,
    pub area: u64,
    pub bbox: [f64; 4],
    pub predicted_iou: f64,
    pub point_coords: Vec<[f64; 2]>,
    pub stability_score: f64,
    pub crop_box: [f64; 4],
}

pub fn load_sam_masks(path: &Path) -> Result<Vec<SamMask>> {
    info!("Loading mask generator output: {}", path.display());
    let bytes = std::fs::read(path).map_err(|source| CocoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let masks: Vec<SamMask> = serde_json::from_slice(&bytes).map_err(CocoError::from_json)?;
    debug!("Parsed {} generated masks", masks.len());
    Ok(masks)
}

impl Detections {
    /// Build detections from generated masks, largest area first.
    ///
    /// Generated masks carry no class, so every class id is 0.
    pub fn from_sam(masks: &[SamMask]) -> Result<Detections> {
        let mut sorted: Vec<&SamMask> = masks.iter().collect();
        // Stable sort keeps generator order among equal areas
        sorted.sort_by(|a, b| b.area.cmp(&a.area));

        let mut detections = Detections {
            xyxy: Vec::with_capacity(sorted.len()),
            class_id: vec![0; sorted.len()],
            mask: Some(Vec::with_capacity(sorted.len())),
        };

        for generated in sorted {
            let [x, y, w, h] = generated.bbox;
            detections.xyxy.push([x, y, x + w, y + h]);
            if let Some(masks) = detections.mask.as_mut() {
                masks.push(rle::decode(&generated.segmentation)?);
            }
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATED: &str = r#"[
        {"segmentation": {"size": [3, 3], "counts": [4, 1, 4]}, "area": 1,
         "bbox": [1, 1, 1, 1], "predicted_iou": 0.91, "point_coords": [[1.5, 1.5]],
         "stability_score": 0.97, "crop_box": [0, 0, 3, 3]},
        {"segmentation": {"size": [3, 3], "counts": "09"}, "area": 9,
         "bbox": [0, 0, 3, 3], "predicted_iou": 0.88, "point_coords": [[0.5, 0.5]],
         "stability_score": 0.95, "crop_box": [0, 0, 3, 3]}
    ]"#;

    #[test]
    fn test_from_sam_sorts_by_area() {
        let masks: Vec<SamMask> = serde_json::from_str(GENERATED).unwrap();
        let detections = Detections::from_sam(&masks).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections.xyxy, vec![[0.0, 0.0, 3.0, 3.0], [1.0, 1.0, 2.0, 2.0]]);
        assert_eq!(detections.class_id, vec![0, 0]);
        assert_eq!(detections.area(), vec![9.0, 1.0]);
        assert_eq!(detections.largest().len(), 1);
    }

    #[test]
    fn test_load_sam_masks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masks.json");
        std::fs::write(&path, GENERATED).unwrap();

        let masks = load_sam_masks(&path).unwrap();
        assert_eq!(masks.len(), 2);
        assert_eq!(masks[0].point_coords, vec![[1.5, 1.5]]);

        std::fs::write(&path, r#"[{"area": 1}]"#).unwrap();
        assert!(load_sam_masks(&path).unwrap_err().is_schema());
    }
}
