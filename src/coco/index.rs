/// Lookups over a loaded annotation document
///
/// The free functions scan the document directly. `AnnotationIndex` builds
/// hash maps once for callers that query many images.
use std::collections::HashMap;
use log::debug;

use super::parser::{Annotation, AnnotationDocument, ImageRecord};

/// All annotations referencing `image_id`, in document order.
pub fn find_annotations_by_image_id(document: &AnnotationDocument, image_id: u64) -> Vec<&Annotation> {
    document
        .annotations
        .iter()
        .filter(|ann| ann.image_id == image_id)
        .collect()
}

/// First image whose `file_name` matches exactly.
pub fn find_image_by_filename<'a>(document: &'a AnnotationDocument, file_name: &str) -> Option<&'a ImageRecord> {
    document.images.iter().find(|img| img.file_name == file_name)
}

/// Annotations of the image called `file_name`.
///
/// `None` means the file name is unknown; `Some(vec![])` means the image
/// exists but carries no annotations.
pub fn find_annotations_by_filename<'a>(
    document: &'a AnnotationDocument,
    file_name: &str,
) -> Option<Vec<&'a Annotation>> {
    find_image_by_filename(document, file_name)
        .map(|image| find_annotations_by_image_id(document, image.id))
}

/// Prebuilt lookup tables borrowing a document
pub struct AnnotationIndex<'a> {
    document: &'a AnnotationDocument,

    /// image id -> positions in `document.annotations`, in document order
    by_image_id: HashMap<u64, Vec<usize>>,

    /// file name -> position of the first image with that name
    by_file_name: HashMap<&'a str, usize>,
}

impl<'a> AnnotationIndex<'a> {
    pub fn new(document: &'a AnnotationDocument) -> Self {
        let mut by_image_id: HashMap<u64, Vec<usize>> = HashMap::new();
        for (pos, ann) in document.annotations.iter().enumerate() {
            by_image_id.entry(ann.image_id).or_default().push(pos);
        }

        let mut by_file_name = HashMap::with_capacity(document.images.len());
        for (pos, image) in document.images.iter().enumerate() {
            // Keep the first occurrence so duplicates resolve like a linear scan
            by_file_name.entry(image.file_name.as_str()).or_insert(pos);
        }

        debug!("Indexed {} images and {} annotation groups",
               by_file_name.len(), by_image_id.len());

        Self { document, by_image_id, by_file_name }
    }

    pub fn document(&self) -> &'a AnnotationDocument {
        self.document
    }

    pub fn annotations_by_image_id(&self, image_id: u64) -> Vec<&'a Annotation> {
        let document = self.document;
        self.by_image_id
            .get(&image_id)
            .map(|positions| positions.iter().map(|&pos| &document.annotations[pos]).collect())
            .unwrap_or_default()
    }

    pub fn image_by_filename(&self, file_name: &str) -> Option<&'a ImageRecord> {
        let document = self.document;
        self.by_file_name.get(file_name).map(|&pos| &document.images[pos])
    }

    pub fn annotations_by_filename(&self, file_name: &str) -> Option<Vec<&'a Annotation>> {
        self.image_by_filename(file_name)
            .map(|image| self.annotations_by_image_id(image.id))
    }
}
