/// Parallel-array detection representation
///
/// Entry `i` of every array describes the same object. Boxes are stored as
/// [x_min, y_min, x_max, y_max].
use serde::Serialize;

use super::mask::Mask;
use super::parser::Annotation;
use crate::error::{CocoError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detections {
    pub xyxy: Vec<[f64; 4]>,
    pub class_id: Vec<u64>,
    #[serde(skip)]
    pub mask: Option<Vec<Mask>>,
}

/// Convert annotations to detections, one entry per annotation in order.
///
/// Boxes go from (x, y, w, h) to (x, y, x + w, y + h). Nothing is filtered
/// or validated; negative sizes pass through unchanged.
pub fn annotations_to_detections<'a, I>(annotations: I) -> Detections
where
    I: IntoIterator<Item = &'a Annotation>,
{
    let mut detections = Detections::default();
    for ann in annotations {
        detections.xyxy.push(ann.bbox_xyxy());
        detections.class_id.push(ann.category_id);
    }
    detections
}

impl Detections {
    pub fn len(&self) -> usize {
        self.xyxy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xyxy.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64; 4], u64)> + '_ {
        self.xyxy.iter().zip(self.class_id.iter().copied())
    }

    /// Shift every class id by `offset`.
    ///
    /// COCO exports usually number classes from 1 while many models count
    /// from 0; callers pass `-1` for that case.
    pub fn with_class_offset(&self, offset: i64) -> Result<Detections> {
        let class_id = self
            .class_id
            .iter()
            .map(|&class_id| {
                class_id
                    .checked_add_signed(offset)
                    .ok_or(CocoError::ClassIdOutOfRange { class_id, offset })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Detections {
            xyxy: self.xyxy.clone(),
            class_id,
            mask: self.mask.clone(),
        })
    }

    /// Mask pixel counts when masks are present, box areas otherwise
    pub fn area(&self) -> Vec<f64> {
        match &self.mask {
            Some(masks) => masks.iter().map(|m| m.area() as f64).collect(),
            None => self
                .xyxy
                .iter()
                .map(|[x0, y0, x1, y1]| (x1 - x0) * (y1 - y0))
                .collect(),
        }
    }

    /// Keep the entries at `indices`, in the given order
    pub fn select(&self, indices: &[usize]) -> Detections {
        Detections {
            xyxy: indices.iter().map(|&i| self.xyxy[i]).collect(),
            class_id: indices.iter().map(|&i| self.class_id[i]).collect(),
            mask: self
                .mask
                .as_ref()
                .map(|masks| indices.iter().map(|&i| masks[i].clone()).collect()),
        }
    }

    /// Keep only the entries whose area equals the largest area
    pub fn largest(&self) -> Detections {
        let areas = self.area();
        let max = areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let indices: Vec<usize> = areas
            .iter()
            .enumerate()
            .filter(|&(_, &area)| area == max)
            .map(|(i, _)| i)
            .collect();
        self.select(&indices)
    }
}
