/// Binary masks and shape analysis
///
/// Masks are stored row-major. Outer contours are traced with Moore-neighbour
/// tracing and simplified with Douglas-Peucker.
use serde::Serialize;

use crate::error::{CocoError, Result};

/// Largest mask accepted, in pixels (a 16384 x 16384 image).
pub const MAX_MASK_PIXELS: usize = 1 << 28;

// Moore neighbourhood, clockwise in image coordinates: N, NE, E, SE, S, SW, W, NW
const DX: [i64; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const DY: [i64; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];
const WEST: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl Mask {
    /// Empty mask. Fails when `width * height` overflows or exceeds [`MAX_MASK_PIXELS`].
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let pixels = width
            .checked_mul(height)
            .filter(|&pixels| pixels <= MAX_MASK_PIXELS)
            .ok_or(CocoError::MaskTooLarge { width, height })?;
        Ok(Self { width, height, data: vec![false; pixels] })
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Number of foreground pixels
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Inclusive pixel extents as [x_min, y_min, x_max, y_max]
    pub fn bounding_box(&self) -> Option<[f64; 4]> {
        let mut bounds: Option<[usize; 4]> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.data[y * self.width + x] {
                    continue;
                }
                bounds = Some(match bounds {
                    None => [x, y, x, y],
                    Some([x0, y0, x1, y1]) => [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
                });
            }
        }
        bounds.map(|[x0, y0, x1, y1]| [x0 as f64, y0 as f64, x1 as f64, y1 as f64])
    }

    /// Rasterize flat [x0, y0, x1, y1, ...] polygons with the even-odd rule.
    ///
    /// A pixel is set when its center lies inside any polygon.
    pub fn from_polygons(polygons: &[Vec<f64>], width: usize, height: usize) -> Result<Self> {
        let mut mask = Mask::new(width, height)?;

        for flat in polygons {
            let points: Vec<(f64, f64)> = flat.chunks_exact(2).map(|p| (p[0], p[1])).collect();
            if points.len() < 3 {
                continue;
            }

            for y in 0..height {
                let cy = y as f64 + 0.5;
                let mut crossings: Vec<f64> = Vec::new();
                for i in 0..points.len() {
                    let (x0, y0) = points[i];
                    let (x1, y1) = points[(i + 1) % points.len()];
                    if (y0 <= cy && y1 > cy) || (y1 <= cy && y0 > cy) {
                        crossings.push(x0 + (cy - y0) / (y1 - y0) * (x1 - x0));
                    }
                }
                crossings.sort_by(|a, b| a.total_cmp(b));

                for span in crossings.chunks_exact(2) {
                    for x in 0..width {
                        let cx = x as f64 + 0.5;
                        if cx >= span[0] && cx < span[1] {
                            mask.set(x, y, true);
                        }
                    }
                }
            }
        }

        Ok(mask)
    }

    /// Trace the outer contour of every 8-connected component.
    ///
    /// Holes do not produce contours of their own; a component inside a
    /// hole does.
    pub fn to_polygons(&self, simplify_epsilon: f32) -> Vec<Vec<(f32, f32)>> {
        let mut labelled = vec![false; self.data.len()];
        let mut polygons = Vec::new();

        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                if !self.data[idx] || labelled[idx] {
                    continue;
                }

                // First pixel of a new component in raster order, so its
                // west neighbour is background.
                let contour = self.trace_outer_contour(x, y);
                self.label_component(x, y, &mut labelled);

                let simplified = simplify_polygon(&contour, simplify_epsilon);
                if simplified.len() >= 3 {
                    polygons.push(simplified);
                }
            }
        }

        polygons
    }

    fn is_set(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && self.get(x as usize, y as usize)
    }

    /// Moore-neighbour tracing, entering the start pixel from the west.
    ///
    /// Stops when the start pixel is about to be left by its first move
    /// again (Jacob's criterion).
    fn trace_outer_contour(&self, start_x: usize, start_y: usize) -> Vec<(f32, f32)> {
        let start = (start_x as i64, start_y as i64);
        let mut current = start;
        let mut backtrack = WEST;
        let mut first_move: Option<usize> = None;
        let mut contour = vec![(start_x as f32, start_y as f32)];

        let max_steps = 4 * self.data.len() + 8;
        for _ in 0..max_steps {
            let Some(dir) = (1..=8)
                .map(|i| (backtrack + i) % 8)
                .find(|&d| self.is_set(current.0 + DX[d], current.1 + DY[d]))
            else {
                // Isolated pixel
                break;
            };

            if current == start && first_move == Some(dir) {
                contour.pop();
                break;
            }
            first_move.get_or_insert(dir);

            current = (current.0 + DX[dir], current.1 + DY[dir]);
            // Direction from the new pixel to the last background pixel checked
            backtrack = if dir % 2 == 0 { (dir + 6) % 8 } else { (dir + 5) % 8 };
            contour.push((current.0 as f32, current.1 as f32));
        }

        contour
    }

    /// Mark every pixel 8-connected to (x, y)
    fn label_component(&self, x: usize, y: usize, labelled: &mut [bool]) {
        let mut stack = vec![(x as i64, y as i64)];
        labelled[y * self.width + x] = true;

        while let Some((cx, cy)) = stack.pop() {
            for (dx, dy) in DX.iter().zip(DY.iter()) {
                let (nx, ny) = (cx + dx, cy + dy);
                if !self.is_set(nx, ny) {
                    continue;
                }
                let nidx = ny as usize * self.width + nx as usize;
                if !labelled[nidx] {
                    labelled[nidx] = true;
                    stack.push((nx, ny));
                }
            }
        }
    }
}

/// Simplify polygon using Douglas-Peucker algorithm
pub fn simplify_polygon(points: &[(f32, f32)], epsilon: f32) -> Vec<(f32, f32)> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut result = Vec::new();
    douglas_peucker_recursive(points, epsilon, &mut result);
    result
}

fn douglas_peucker_recursive(points: &[(f32, f32)], epsilon: f32, result: &mut Vec<(f32, f32)>) {
    if points.len() <= 2 {
        result.extend_from_slice(points);
        return;
    }

    let start = points[0];
    let end = points[points.len() - 1];
    let mut max_dist = 0.0f32;
    let mut max_idx = 0;

    for (i, &point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(point, start, end);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist > epsilon {
        douglas_peucker_recursive(&points[..=max_idx], epsilon, result);
        result.pop(); // shared with the next half
        douglas_peucker_recursive(&points[max_idx..], epsilon, result);
    } else {
        result.push(start);
        result.push(end);
    }
}

fn perpendicular_distance(point: (f32, f32), line_start: (f32, f32), line_end: (f32, f32)) -> f32 {
    let dx = line_end.0 - line_start.0;
    let dy = line_end.1 - line_start.1;

    let norm = (dx * dx + dy * dy).sqrt();
    if norm < 1e-6 {
        let pdx = point.0 - line_start.0;
        let pdy = point.1 - line_start.1;
        return (pdx * pdx + pdy * pdy).sqrt();
    }

    let cross = (point.0 - line_start.0) * dy - (point.1 - line_start.1) * dx;
    cross.abs() / norm
}

/// Area, perimeter and extents of a closed polygon
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShapeStats {
    pub area: f64,
    pub perimeter: f64,
    pub xyxy: [f64; 4],
}

impl ShapeStats {
    pub fn from_polygon(points: &[(f32, f32)]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let mut twice_area = 0.0f64;
        let mut perimeter = 0.0f64;
        let mut xyxy = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];

        for (i, &(x0, y0)) in points.iter().enumerate() {
            let (x1, y1) = points[(i + 1) % points.len()];
            let (x0, y0, x1, y1) = (x0 as f64, y0 as f64, x1 as f64, y1 as f64);

            twice_area += x0 * y1 - x1 * y0;
            perimeter += ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();

            xyxy = [xyxy[0].min(x0), xyxy[1].min(y0), xyxy[2].max(x0), xyxy[3].max(y0)];
        }

        Some(Self { area: twice_area.abs() / 2.0, perimeter, xyxy })
    }
}
