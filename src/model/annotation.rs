//! Annotation and per-image result types.

use serde::Serialize;

use crate::geometry::{Point, build_outline, serialize_vertices};

/// A named closed polygon on one image, in native image pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Name of the anatomical structure
    pub name: String,
    /// Polygon vertices in insertion order
    pub vertices: Vec<Point>,
}

impl Annotation {
    /// Create a new annotation with the given name and vertices.
    pub fn new(name: impl Into<String>, vertices: Vec<Point>) -> Self {
        Self {
            name: name.into(),
            vertices,
        }
    }

    /// The vertex list in wire form (`x,y;` per vertex).
    pub fn vertex_string(&self) -> String {
        serialize_vertices(&self.vertices)
    }

    /// Area enclosed by the polygon in native pixels.
    pub fn area(&self) -> f32 {
        build_outline(&self.vertices).area()
    }
}

/// Everything the test-taker entered for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageResult {
    /// Free-text body part label
    pub body_part: String,
    /// Saved annotations in the order they were saved
    pub annotations: Vec<Annotation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_string_and_area() {
        let square = Annotation::new(
            "patella",
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
        );
        assert_eq!(square.vertex_string(), "0,0;10,0;10,10;0,10;");
        assert_eq!(square.area(), 100.0);
        assert_eq!(Annotation::new("dot", vec![Point::new(1.0, 1.0)]).area(), 0.0);
    }
}
