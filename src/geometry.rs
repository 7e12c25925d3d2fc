//! Geometry for polygon annotations.
//!
//! This module contains the pure math used by both the drawing surface and
//! the exam flow:
//! - Building a closed outline from an ordered list of points
//! - Converting between display-surface pixels and native image pixels
//! - The vertex string used on the wire (`x,y;x,y;...;`)

use serde::{Deserialize, Serialize};

use crate::error::ExamError;

// ============================================================================
// Core Geometry Types
// ============================================================================

/// A 2D point.
///
/// Depending on context this is either in display-surface pixels (while a
/// point is being edited) or native image pixels (once an annotation is saved).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point.
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// Size of the on-screen drawing surface in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

impl DisplaySize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Scale factors that stretch an image of the given native size over the surface.
    pub fn scale_for(&self, natural_width: u32, natural_height: u32) -> (f32, f32) {
        (
            self.width / natural_width as f32,
            self.height / natural_height as f32,
        )
    }
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self::new(
            crate::constants::DISPLAY_WIDTH,
            crate::constants::DISPLAY_HEIGHT,
        )
    }
}

// ============================================================================
// Outline
// ============================================================================

/// A single drawing instruction for a 2D path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PathCommand {
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    Close,
}

/// A closed polygon path through a list of points in insertion order.
///
/// Edge `i` connects vertex `i` to vertex `i + 1` and the last edge connects
/// the final vertex back to the first. With fewer than two vertices the shape
/// is degenerate and draws nothing visible.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClosedPolygon {
    vertices: Vec<Point>,
}

impl ClosedPolygon {
    /// The vertices in path order.
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Number of edges including the closing edge.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    /// Iterate over the edges as `(from, to)` pairs, closing edge last.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Whether the shape has no visible extent.
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 2
    }

    /// Path instructions: move to the first point, line to each following
    /// point, then close back to the start.
    pub fn path_commands(&self) -> Vec<PathCommand> {
        let Some((first, rest)) = self.vertices.split_first() else {
            return Vec::new();
        };

        let mut commands = Vec::with_capacity(self.vertices.len() + 1);
        commands.push(PathCommand::MoveTo {
            x: first.x,
            y: first.y,
        });
        commands.extend(rest.iter().map(|p| PathCommand::LineTo { x: p.x, y: p.y }));
        commands.push(PathCommand::Close);
        commands
    }

    /// Absolute area of the enclosed region (shoelace formula).
    pub fn area(&self) -> f32 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        let twice: f32 = self.edges().map(|(a, b)| a.x * b.y - b.x * a.y).sum();
        twice.abs() / 2.0
    }
}

/// Build the closed outline through `points` in insertion order.
pub fn build_outline(points: &[Point]) -> ClosedPolygon {
    ClosedPolygon {
        vertices: points.to_vec(),
    }
}

// ============================================================================
// Coordinate Conversion
// ============================================================================

/// Convert a display-surface point into native image pixels.
///
/// The surface stretches the image to its fixed size, so the inverse scale is
/// `display / natural` per axis and `native = display_coord / scale`.
pub fn to_normalized(
    point: Point,
    display_width: f32,
    display_height: f32,
    natural_width: u32,
    natural_height: u32,
) -> Result<Point, ExamError> {
    let (scale_x, scale_y) = checked_scale(
        display_width,
        display_height,
        natural_width,
        natural_height,
    )?;
    Ok(Point::new(point.x / scale_x, point.y / scale_y))
}

/// Convert a native image point back onto the display surface.
pub fn to_display(
    point: Point,
    display_width: f32,
    display_height: f32,
    natural_width: u32,
    natural_height: u32,
) -> Result<Point, ExamError> {
    let (scale_x, scale_y) = checked_scale(
        display_width,
        display_height,
        natural_width,
        natural_height,
    )?;
    Ok(Point::new(point.x * scale_x, point.y * scale_y))
}

fn checked_scale(
    display_width: f32,
    display_height: f32,
    natural_width: u32,
    natural_height: u32,
) -> Result<(f32, f32), ExamError> {
    if natural_width == 0 || natural_height == 0 {
        return Err(ExamError::invariant(format!(
            "native image size {}x{} cannot be used for normalization",
            natural_width, natural_height
        )));
    }
    if !(display_width > 0.0 && display_height > 0.0) {
        return Err(ExamError::invariant(format!(
            "display size {}x{} cannot be used for normalization",
            display_width, display_height
        )));
    }
    Ok(DisplaySize::new(display_width, display_height).scale_for(natural_width, natural_height))
}

// ============================================================================
// Vertex Strings
// ============================================================================

/// Serialize vertices as `x,y;` pairs in insertion order.
pub fn serialize_vertices(points: &[Point]) -> String {
    points.iter().map(|p| format!("{},{};", p.x, p.y)).collect()
}

/// Parse a vertex string produced by [`serialize_vertices`].
pub fn parse_vertices(text: &str) -> Result<Vec<Point>, ExamError> {
    text.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| ExamError::malformed_vertices(pair))?;
            let x = x
                .trim()
                .parse::<f32>()
                .map_err(|_| ExamError::malformed_vertices(pair))?;
            let y = y
                .trim()
                .parse::<f32>()
                .map_err(|_| ExamError::malformed_vertices(pair))?;
            Ok(Point::new(x, y))
        })
        .collect()
}
