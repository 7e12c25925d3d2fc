//! Exam Canvas - visual exam annotation core
//!
//! Drives a visual anatomy exam: the test-taker labels each image with a
//! body part, outlines structures as polygons, and submits the whole
//! session. Points are drawn on a fixed-size surface and stored in native
//! image pixels.

pub mod api;
pub mod canvas;
pub mod config;
pub mod constants;
pub mod error;
pub mod exam;
pub mod geometry;
pub mod history;
pub mod logging;
pub mod model;
pub mod session;

#[cfg(not(target_arch = "wasm32"))]
pub mod replay;

pub use config::ExamConfig;
pub use error::{ExamError, ValidationError};
pub use exam::{Effect, ExamController, ExamPhase};

// WASM entry point
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::*;
