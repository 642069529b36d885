use std::path::PathBuf;

use serde_json::error::Category;

/// Errors surfaced while loading or transforming COCO data.
///
/// Lookups that find nothing are not errors; they return `None` or an empty
/// `Vec` instead.
#[derive(Debug, thiserror::Error)]
pub enum CocoError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("JSON does not match the expected schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("Invalid RLE: {0}")]
    InvalidRle(String),

    #[error("Mask of {width}x{height} pixels exceeds the supported size")]
    MaskTooLarge { width: usize, height: usize },

    #[error("Class id {class_id} shifted by {offset} is out of range")]
    ClassIdOutOfRange { class_id: u64, offset: i64 },
}

impl CocoError {
    /// Split serde_json failures into syntax problems and shape problems.
    pub fn from_json(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Syntax | Category::Eof => CocoError::Parse(err),
            Category::Data => CocoError::Schema(err),
            Category::Io => CocoError::Parse(err),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, CocoError::Parse(_))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, CocoError::Schema(_))
    }
}

pub type Result<T> = std::result::Result<T, CocoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_classification() {
        let syntax = serde_json::from_str::<Vec<u32>>("[1, 2").unwrap_err();
        assert!(CocoError::from_json(syntax).is_parse());

        let data = serde_json::from_str::<Vec<u32>>(r#"["a"]"#).unwrap_err();
        assert!(CocoError::from_json(data).is_schema());
    }
}
