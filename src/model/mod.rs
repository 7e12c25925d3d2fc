//! Data models for an exam session.

mod annotation;
mod image;
mod step;

pub use annotation::{Annotation, ImageResult};
pub use image::ImageRef;
pub use step::Step;
