//! Global constants for the exam canvas

/// Logical width of the drawing surface
pub const DISPLAY_WIDTH: f32 = 800.0;

/// Logical height of the drawing surface
pub const DISPLAY_HEIGHT: f32 = 600.0;

/// Status value the exam server uses for a successful response
pub const STATUS_OK: i32 = 1;

/// Static-asset base path that image paths are resolved against
pub const DEFAULT_ASSET_BASE_URL: &str = "https://wghtstudio.cn/app/static/";

/// Radius of a point marker, also used as its hit radius
pub const MARKER_RADIUS: f32 = 4.0;

/// Default number of undo steps kept per image
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
