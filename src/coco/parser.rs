/// COCO annotation document parser
///
/// This module parses COCO format annotation files into typed records.
/// Format specification: https://cocodataset.org/#format-data
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use log::{debug, info};

use crate::error::{CocoError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnnotationDocument {
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<Annotation>,
    pub categories: Vec<Category>,
    pub licenses: Vec<License>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageRecord {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
    pub license: u64,
    pub date_captured: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coco_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flickr_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    pub segmentation: Segmentation,
    pub area: f64,
    pub bbox: [f64; 4],  // [x, y, width, height] in COCO format
    pub iscrowd: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Segmentation {
    Polygons(Vec<Vec<f64>>),  // Flat [x0, y0, x1, y1, ...] lists
    Rle(Rle),                 // Run-length encoding, used for crowd regions
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Rle {
    pub size: [u32; 2],  // [height, width]
    pub counts: RleCounts,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RleCounts {
    Uncompressed(Vec<u32>),
    Compressed(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub supercategory: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct License {
    pub id: u64,
    pub name: String,
    pub url: String,
}

impl AnnotationDocument {
    /// Parse a COCO document from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading COCO file: {}", path.display());
        let bytes = std::fs::read(path).map_err(|source| CocoError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let start = Instant::now();
        let document = Self::from_slice(&bytes)?;
        debug!("Parsed {} bytes in {:.2}ms", bytes.len(), start.elapsed().as_secs_f64() * 1000.0);

        info!("COCO document parsed: {} images, {} annotations, {} categories",
              document.images.len(), document.annotations.len(), document.categories.len());
        Ok(document)
    }

    /// Parse a COCO document from a string
    pub fn from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(CocoError::from_json)
    }

    /// Parse a COCO document from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(CocoError::from_json)
    }

    /// Parse a COCO document from any reader. Wrap files in a `BufReader`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(CocoError::from_json)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.map_err(CocoError::from_json)
    }

    /// Check if JSON content looks like a COCO document (quick detection)
    pub fn is_coco_format(content: &str) -> bool {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
            if let Some(obj) = value.as_object() {
                return obj.contains_key("images")
                    && obj.contains_key("annotations")
                    && obj.contains_key("categories");
            }
        }
        false
    }

    /// Check references and box shapes without modifying the document.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.images.is_empty() {
            report.warnings.push("COCO document has no images".to_string());
        }

        if self.categories.is_empty() {
            report.warnings.push("COCO document has no categories".to_string());
        }

        let mut category_ids = HashSet::new();
        for category in &self.categories {
            if !category_ids.insert(category.id) {
                report.duplicate_category_ids.push(category.id);
                report.warnings.push(format!(
                    "Category id {} ({}) is used more than once",
                    category.id, category.name
                ));
            }
        }

        let image_ids: HashSet<_> = self.images.iter().map(|img| img.id).collect();

        for ann in &self.annotations {
            let mut invalid = false;
            if !image_ids.contains(&ann.image_id) {
                report.warnings.push(format!(
                    "Annotation {}: references non-existent image_id {}",
                    ann.id, ann.image_id
                ));
                invalid = true;
            }
            if !category_ids.contains(&ann.category_id) {
                report.warnings.push(format!(
                    "Annotation {}: references non-existent category_id {}",
                    ann.id, ann.category_id
                ));
                invalid = true;
            }
            if ann.bbox[2] < 0.0 || ann.bbox[3] < 0.0 {
                report.warnings.push(format!(
                    "Annotation {}: negative bbox size ({} x {})",
                    ann.id, ann.bbox[2], ann.bbox[3]
                ));
                invalid = true;
            }
            if invalid {
                report.invalid_annotation_ids.push(ann.id);
                report.images_with_invalid_annotations.insert(ann.image_id);
            }
        }

        debug!("Validation finished with {} warning(s)", report.warnings.len());
        report
    }

    /// Category names excluding the placeholder supercategory.
    ///
    /// Roboflow exports carry a synthetic first category whose supercategory
    /// is `"none"`; pass that label to skip it.
    pub fn class_names(&self, excluded_supercategory: &str) -> Vec<String> {
        self.categories
            .iter()
            .filter(|cat| cat.supercategory != excluded_supercategory)
            .map(|cat| cat.name.clone())
            .collect()
    }

    /// Get list of all image filenames in the document
    pub fn image_file_names(&self) -> Vec<String> {
        self.images.iter().map(|img| img.file_name.clone()).collect()
    }

    pub fn category(&self, id: u64) -> Option<&Category> {
        self.categories.iter().find(|cat| cat.id == id)
    }

    /// Category id to name. Later duplicates of an id win.
    pub fn category_names(&self) -> HashMap<u64, &str> {
        self.categories.iter().map(|cat| (cat.id, cat.name.as_str())).collect()
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            num_images: self.images.len(),
            num_annotations: self.annotations.len(),
            num_categories: self.categories.len(),
            num_licenses: self.licenses.len(),
        }
    }
}

impl Annotation {
    /// Convert COCO bbox (x, y, w, h) to top-left and bottom-right corners
    pub fn bbox_xyxy(&self) -> [f64; 4] {
        let [x, y, w, h] = self.bbox;
        [x, y, x + w, y + h]
    }
}

/// Problems found by [`AnnotationDocument::validate`]
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
    pub invalid_annotation_ids: Vec<u64>,
    pub images_with_invalid_annotations: HashSet<u64>,
    pub duplicate_category_ids: Vec<u64>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_annotation_ids.is_empty() && self.duplicate_category_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStats {
    pub num_images: usize,
    pub num_annotations: usize,
    pub num_categories: usize,
    pub num_licenses: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "info": {"year": "2023", "description": "Exported from roboflow.ai"},
        "licenses": [
            {"id": 1, "name": "CC BY 4.0", "url": "https://creativecommons.org/licenses/by/4.0/"}
        ],
        "categories": [
            {"id": 0, "name": "tumor", "supercategory": "none"},
            {"id": 1, "name": "glioma", "supercategory": "tumor"},
            {"id": 2, "name": "meningioma", "supercategory": "tumor"}
        ],
        "images": [
            {"id": 0, "license": 1, "file_name": "scan_0.jpg", "height": 640, "width": 640,
             "date_captured": "2023-05-01T10:00:00+00:00"},
            {"id": 1, "license": 1, "file_name": "scan_1.jpg", "height": 640, "width": 640,
             "date_captured": "2023-05-01T10:00:00+00:00",
             "coco_url": "http://example.org/scan_1.jpg"},
            {"id": 2, "license": 1, "file_name": "scan_0.jpg", "height": 320, "width": 320,
             "date_captured": "2023-05-01T10:00:00+00:00"}
        ],
        "annotations": [
            {"id": 0, "image_id": 0, "category_id": 1, "bbox": [10, 20, 5, 6],
             "area": 30, "segmentation": [[10, 20, 15, 20, 15, 26, 10, 26]], "iscrowd": 0},
            {"id": 1, "image_id": 1, "category_id": 2, "bbox": [100.5, 50.0, 40.0, 30.0],
             "area": 1200.0, "segmentation": [], "iscrowd": 0},
            {"id": 2, "image_id": 0, "category_id": 2, "bbox": [0, 0, 3, 3],
             "area": 1, "segmentation": {"size": [3, 3], "counts": [4, 1, 4]}, "iscrowd": 1}
        ]
    }"#;

    pub(crate) fn sample() -> AnnotationDocument {
        AnnotationDocument::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_coco_detection() {
        let valid_coco = r#"{
            "images": [],
            "annotations": [],
            "categories": []
        }"#;
        assert!(AnnotationDocument::is_coco_format(valid_coco));

        let invalid = r#"{"foo": "bar"}"#;
        assert!(!AnnotationDocument::is_coco_format(invalid));
    }

    #[test]
    fn test_coco_parsing() {
        let doc = sample();
        assert_eq!(doc.images.len(), 3);
        assert_eq!(doc.annotations.len(), 3);
        assert_eq!(doc.categories.len(), 3);
        assert_eq!(doc.licenses.len(), 1);
        assert_eq!(doc.images[1].coco_url.as_deref(), Some("http://example.org/scan_1.jpg"));
        assert_eq!(doc.images[0].flickr_url, None);
        assert!(matches!(doc.annotations[2].segmentation, Segmentation::Rle(_)));
        assert_eq!(doc.annotations[1].segmentation, Segmentation::Polygons(vec![]));
    }

    #[test]
    fn test_round_trip() {
        let doc = sample();
        let json = doc.to_json(false).unwrap();
        let reloaded = AnnotationDocument::from_str(&json).unwrap();
        assert_eq!(doc, reloaded);
    }

    #[test]
    fn test_missing_images_is_schema_error() {
        let json = r#"{"annotations": [], "categories": [], "licenses": []}"#;
        let err = AnnotationDocument::from_str(json).unwrap_err();
        assert!(err.is_schema(), "unexpected error: {err}");
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = AnnotationDocument::from_str(r#"{"images": [}"#).unwrap_err();
        assert!(err.is_parse());

        let err = AnnotationDocument::from_str(r#"{"images": ["#).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_wrong_bbox_length_is_schema_error() {
        let json = SAMPLE.replace("[10, 20, 5, 6]", "[10, 20, 5]");
        let err = AnnotationDocument::from_str(&json).unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_from_reader() {
        let doc = AnnotationDocument::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc, sample());

        let truncated = &SAMPLE.as_bytes()[..SAMPLE.len() / 2];
        let err = AnnotationDocument::from_reader(truncated).unwrap_err();
        assert!(err.is_parse(), "unexpected error: {err}");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_annotations.coco.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let doc = AnnotationDocument::from_file(&path).unwrap();
        assert_eq!(doc, sample());

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            AnnotationDocument::from_file(&missing),
            Err(CocoError::Io { .. })
        ));
    }

    #[test]
    fn test_validate_reports_problems() {
        let clean = sample().validate();
        assert!(clean.is_clean(), "{:?}", clean.warnings);

        let mut doc = sample();
        doc.annotations[0].image_id = 99;
        doc.annotations[1].bbox[2] = -4.0;
        doc.categories.push(Category {
            id: 1,
            name: "duplicate".to_string(),
            supercategory: "tumor".to_string(),
        });
        let before = doc.clone();

        let report = doc.validate();
        assert_eq!(report.invalid_annotation_ids, vec![0, 1]);
        assert_eq!(report.duplicate_category_ids, vec![1]);
        assert!(report.images_with_invalid_annotations.contains(&99));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_class_names_skip_placeholder() {
        let doc = sample();
        assert_eq!(doc.class_names("none"), vec!["glioma", "meningioma"]);
        assert_eq!(doc.image_file_names().len(), 3);
        assert_eq!(doc.category(2).map(|c| c.name.as_str()), Some("meningioma"));
    }

    #[test]
    fn test_category_names_by_id() {
        let doc = sample();
        let names = doc.category_names();
        assert_eq!(names.len(), 3);
        assert_eq!(names.get(&1), Some(&"glioma"));
        assert_eq!(names.get(&7), None);
    }

    #[test]
    fn test_coco_sections_without_valid_records() {
        // Has the three sections, so it looks like COCO, but lacks licenses
        let json = r#"{"images": [], "annotations": [], "categories": []}"#;
        assert!(AnnotationDocument::is_coco_format(json));
        assert!(AnnotationDocument::from_str(json).unwrap_err().is_schema());
    }
}
