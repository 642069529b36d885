//! Read COCO annotation documents, look up images and annotations, and
//! convert them into detections and masks.

pub mod build_info;
pub mod coco;
pub mod config;
pub mod error;
pub mod logging;
pub mod settings;

pub use coco::{
    annotations_to_detections, find_annotations_by_filename, find_annotations_by_image_id,
    find_image_by_filename, AnnotationDocument, AnnotationIndex, Detections,
};
pub use config::Config;
pub use error::{CocoError, Result};
