/// COCO annotation handling
///
/// Loading and indexing annotation documents, converting annotations into
/// detections, and decoding segmentations into masks.
pub mod parser;
pub mod index;
pub mod detections;
pub mod mask;
pub mod rle;
pub mod sam;

pub use detections::{annotations_to_detections, Detections};
pub use index::{
    find_annotations_by_filename, find_annotations_by_image_id, find_image_by_filename,
    AnnotationIndex,
};
pub use mask::{Mask, ShapeStats};
pub use parser::{
    Annotation, AnnotationDocument, Category, DocumentStats, ImageRecord, License, Rle,
    RleCounts, Segmentation, ValidationReport,
};
pub use sam::{load_sam_masks, SamMask};
