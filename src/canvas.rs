//! Drawing surface for one exam image.
//!
//! The surface goes `Empty -> Loading -> Ready` for every image it is shown.
//! Entering an image drops the previous layer set entirely; a fresh one is
//! built when the image finishes loading. Each load carries a generation
//! number so a late completion for an image the user already left is ignored.
//!
//! Point markers are plain records owned by the point layer. The outline
//! layer is derived from them with [`build_outline`] after every mutation
//! (add, drag, clear), and [`CanvasSurface::frame`] derives a complete
//! render description from the current records.

use serde::{Deserialize, Serialize};

use crate::constants::MARKER_RADIUS;
use crate::error::{ExamError, ValidationError};
use crate::geometry::{ClosedPolygon, DisplaySize, PathCommand, Point, build_outline, to_normalized};
use crate::model::{Annotation, Step};
use crate::session::SessionState;

/// Unique identifier for a point marker within one layer set.
pub type MarkerId = u32;

// ============================================================================
// Styles
// ============================================================================

/// Appearance of point markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    /// Marker radius, also the hit radius for clicks and drags
    #[serde(default = "default_marker_radius")]
    pub radius: f32,
    /// Fill color (CSS color string)
    #[serde(default = "default_marker_fill")]
    pub fill: String,
}

fn default_marker_radius() -> f32 {
    MARKER_RADIUS
}

fn default_marker_fill() -> String {
    "green".to_string()
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: default_marker_radius(),
            fill: default_marker_fill(),
        }
    }
}

/// Appearance of the polygon outline.
///
/// A faint fill keeps overlapping regions distinguishable while the solid
/// stroke keeps the outline visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineStyle {
    pub fill: String,
    pub opacity: f32,
    pub stroke: String,
    pub stroke_width: f32,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            fill: "#00D2FF".to_string(),
            opacity: 0.1,
            stroke: "black".to_string(),
            stroke_width: 4.0,
        }
    }
}

// ============================================================================
// Layers
// ============================================================================

/// A draggable point placed by the test-taker, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointMarker {
    pub id: MarkerId,
    pub position: Point,
}

/// The image stretched over the whole surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundLayer {
    pub url: String,
    pub natural_width: u32,
    pub natural_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
}

/// Point markers in insertion order.
#[derive(Debug, Clone, Default)]
struct PointLayer {
    markers: Vec<PointMarker>,
    next_id: MarkerId,
}

impl PointLayer {
    fn add(&mut self, position: Point) -> MarkerId {
        let id = self.next_id;
        self.next_id += 1;
        self.markers.push(PointMarker { id, position });
        id
    }

    /// Topmost marker under `position` (last added wins).
    fn hit_test(&self, position: Point, radius: f32) -> Option<MarkerId> {
        self.markers
            .iter()
            .rev()
            .find(|m| m.position.distance_to(&position) <= radius)
            .map(|m| m.id)
    }

    fn move_to(&mut self, id: MarkerId, position: Point) -> bool {
        match self.markers.iter_mut().find(|m| m.id == id) {
            Some(marker) => {
                marker.position = position;
                true
            }
            None => false,
        }
    }

    fn positions(&self) -> Vec<Point> {
        self.markers.iter().map(|m| m.position).collect()
    }
}

/// All layers for the image currently on the surface.
#[derive(Debug, Clone)]
pub struct LayerSet {
    generation: u64,
    image_index: usize,
    background: BackgroundLayer,
    points: PointLayer,
    outline: ClosedPolygon,
    dragging: Option<MarkerId>,
    /// Bumped on every point mutation
    version: u64,
}

impl LayerSet {
    pub fn image_index(&self) -> usize {
        self.image_index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn background(&self) -> &BackgroundLayer {
        &self.background
    }

    pub fn markers(&self) -> &[PointMarker] {
        &self.points.markers
    }

    pub fn outline(&self) -> &ClosedPolygon {
        &self.outline
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Recompute the outline from the current markers.
    fn redraw_outline(&mut self) {
        self.outline = build_outline(&self.points.positions());
        self.version += 1;
    }
}

/// An image that is being fetched for the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub generation: u64,
    pub image_index: usize,
    pub url: String,
}

/// Lifecycle of the surface.
#[derive(Debug, Clone)]
pub enum SurfaceState {
    /// No image has been shown yet
    Empty,
    /// Waiting for the image asset
    Loading(PendingImage),
    /// Image loaded and layers built
    Ready(LayerSet),
}

/// What a click on the surface did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Surface not ready, wrong step or outside the surface
    Ignored,
    /// The click landed on an existing marker; no point was added
    OnMarker(MarkerId),
    /// A new marker was added
    Added(MarkerId),
}

// ============================================================================
// Surface
// ============================================================================

/// Owns the drawing layers for the active image.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    display: DisplaySize,
    marker_style: MarkerStyle,
    outline_style: OutlineStyle,
    last_generation: u64,
    state: SurfaceState,
}

impl CanvasSurface {
    pub fn new(display: DisplaySize, marker_style: MarkerStyle, outline_style: OutlineStyle) -> Self {
        Self {
            display,
            marker_style,
            outline_style,
            last_generation: 0,
            state: SurfaceState::Empty,
        }
    }

    pub fn display(&self) -> DisplaySize {
        self.display
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SurfaceState::Ready(_))
    }

    pub fn layers(&self) -> Option<&LayerSet> {
        match &self.state {
            SurfaceState::Ready(layers) => Some(layers),
            _ => None,
        }
    }

    /// Markers on the surface, empty unless ready.
    pub fn markers(&self) -> &[PointMarker] {
        self.layers().map(LayerSet::markers).unwrap_or(&[])
    }

    /// Start showing an image. Drops all layers of the previous image and
    /// returns the generation the load completion must carry.
    /// Drop any image and layers. Generations keep counting up, so a load
    /// issued before the reset can never match a later one.
    pub fn reset(&mut self) {
        self.state = SurfaceState::Empty;
    }

    pub fn enter_image(&mut self, image_index: usize, url: impl Into<String>) -> u64 {
        self.last_generation += 1;
        let pending = PendingImage {
            generation: self.last_generation,
            image_index,
            url: url.into(),
        };
        log::debug!(
            "Surface loading image {} (generation {}): {}",
            image_index,
            pending.generation,
            pending.url
        );
        self.state = SurfaceState::Loading(pending);
        self.last_generation
    }

    /// The image being loaded, if `generation` is still the one awaited.
    pub fn pending(&self, generation: u64) -> Option<&PendingImage> {
        match &self.state {
            SurfaceState::Loading(pending) if pending.generation == generation => Some(pending),
            _ => None,
        }
    }

    /// Build fresh layers once the awaited image has loaded.
    ///
    /// Returns `false` for a stale generation; the surface is left as is.
    pub fn finish_loading(&mut self, generation: u64, width: u32, height: u32) -> Result<bool, ExamError> {
        let Some(pending) = self.pending(generation).cloned() else {
            log::warn!("Ignoring load completion for stale generation {}", generation);
            return Ok(false);
        };
        if width == 0 || height == 0 {
            return Err(ExamError::invariant(format!(
                "image {} loaded with empty size {}x{}",
                pending.image_index, width, height
            )));
        }

        let (scale_x, scale_y) = self.display.scale_for(width, height);
        let layers = LayerSet {
            generation,
            image_index: pending.image_index,
            background: BackgroundLayer {
                url: pending.url,
                natural_width: width,
                natural_height: height,
                scale_x,
                scale_y,
            },
            points: PointLayer::default(),
            outline: ClosedPolygon::default(),
            dragging: None,
            version: 0,
        };
        log::debug!(
            "Surface ready for image {} ({}x{}, scale {:.3}x{:.3})",
            pending.image_index,
            width,
            height,
            scale_x,
            scale_y
        );
        self.state = SurfaceState::Ready(layers);
        Ok(true)
    }

    fn drawable_layers(&mut self, step: Step) -> Option<&mut LayerSet> {
        if step != Step::Draw {
            return None;
        }
        match &mut self.state {
            SurfaceState::Ready(layers) => Some(layers),
            _ => None,
        }
    }

    fn contains(&self, position: Point) -> bool {
        (0.0..=self.display.width).contains(&position.x)
            && (0.0..=self.display.height).contains(&position.y)
    }

    fn clamp(&self, position: Point) -> Point {
        Point::new(
            position.x.clamp(0.0, self.display.width),
            position.y.clamp(0.0, self.display.height),
        )
    }

    // ========================================================================
    // Pointer interaction
    // ========================================================================

    /// Handle a click at a display position.
    pub fn click(&mut self, position: Point, step: Step) -> ClickOutcome {
        if !self.contains(position) {
            return ClickOutcome::Ignored;
        }
        let radius = self.marker_style.radius;
        let Some(layers) = self.drawable_layers(step) else {
            return ClickOutcome::Ignored;
        };

        if let Some(id) = layers.points.hit_test(position, radius) {
            log::debug!("Click on marker {}, no point added", id);
            return ClickOutcome::OnMarker(id);
        }

        let id = layers.points.add(position);
        layers.redraw_outline();
        log::debug!(
            "Added point {} at ({:.1}, {:.1}), total: {}",
            id,
            position.x,
            position.y,
            layers.points.markers.len()
        );
        ClickOutcome::Added(id)
    }

    /// Start dragging the marker under `position`, if any.
    pub fn drag_start(&mut self, position: Point, step: Step) -> Option<MarkerId> {
        let radius = self.marker_style.radius;
        let layers = self.drawable_layers(step)?;
        let id = layers.points.hit_test(position, radius)?;
        layers.dragging = Some(id);
        log::debug!("Drag started on marker {}", id);
        Some(id)
    }

    /// Move the dragged marker and redraw the outline.
    pub fn drag_move(&mut self, position: Point) -> bool {
        let position = self.clamp(position);
        let SurfaceState::Ready(layers) = &mut self.state else {
            return false;
        };
        let Some(id) = layers.dragging else {
            return false;
        };
        if layers.points.move_to(id, position) {
            layers.redraw_outline();
            true
        } else {
            false
        }
    }

    /// Finish a drag at `position`.
    pub fn drag_end(&mut self, position: Point) -> bool {
        let moved = self.drag_move(position);
        if let SurfaceState::Ready(layers) = &mut self.state {
            if let Some(id) = layers.dragging.take() {
                log::debug!("Drag ended on marker {}", id);
            }
        }
        moved
    }

    /// Remove every marker and the outline, keeping the background.
    pub fn clear_all(&mut self) {
        if let SurfaceState::Ready(layers) = &mut self.state {
            let cleared = layers.points.markers.len();
            layers.points.markers.clear();
            layers.dragging = None;
            layers.redraw_outline();
            if cleared > 0 {
                log::debug!("Cleared {} points", cleared);
            }
        }
    }

    /// Save the current points as a named annotation on the current image.
    ///
    /// Points are converted to native image pixels before they are stored.
    /// On success the surface is cleared for the next annotation.
    pub fn commit_annotation(&mut self, name: &str, session: &SessionState) -> Result<SessionState, ExamError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyAnnotationName.into());
        }
        if session.step() != Step::Draw {
            return Err(ValidationError::WrongStep {
                expected: Step::Draw,
                actual: session.step(),
            }
            .into());
        }
        let layers = self
            .layers()
            .ok_or_else(|| ExamError::invariant("annotation saved before the image finished loading"))?;
        if layers.image_index != session.current_index() {
            return Err(ExamError::invariant(format!(
                "surface shows image {} but the session is on image {}",
                layers.image_index,
                session.current_index()
            )));
        }
        let image = session.current_image()?;
        let (width, height) = image.dimensions().ok_or_else(|| {
            ExamError::invariant(format!("image {} has no recorded dimensions", image.id))
        })?;

        let vertices = layers
            .markers()
            .iter()
            .map(|m| to_normalized(m.position, self.display.width, self.display.height, width, height))
            .collect::<Result<Vec<_>, _>>()?;
        if vertices.len() < 3 {
            log::warn!("Saving '{}' with only {} points", name, vertices.len());
        }

        let annotation = Annotation::new(name, vertices);
        let area = annotation.area();
        let next = session.add_annotation(annotation)?;
        log::info!(
            "Saved annotation '{}' on image {} ({:.0} px²)",
            name,
            image.id,
            area
        );
        self.clear_all();
        Ok(next)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Describe everything that should currently be drawn.
    pub fn frame(&self) -> RenderFrame {
        match &self.state {
            SurfaceState::Empty => RenderFrame::empty(FrameStatus::Empty, self.display),
            SurfaceState::Loading(_) => RenderFrame::empty(FrameStatus::Loading, self.display),
            SurfaceState::Ready(layers) => RenderFrame {
                status: FrameStatus::Ready,
                width: self.display.width,
                height: self.display.height,
                version: layers.version,
                background: Some(layers.background.clone()),
                markers: layers
                    .markers()
                    .iter()
                    .map(|m| MarkerView {
                        id: m.id,
                        x: m.position.x,
                        y: m.position.y,
                        radius: self.marker_style.radius,
                        fill: self.marker_style.fill.clone(),
                    })
                    .collect(),
                outline: (!layers.outline.is_degenerate()).then(|| OutlineView {
                    commands: layers.outline.path_commands(),
                    style: self.outline_style.clone(),
                }),
            },
        }
    }
}

/// Surface status as seen by a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Empty,
    Loading,
    Ready,
}

/// A marker as it should be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerView {
    pub id: MarkerId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub fill: String,
}

/// The outline path with its style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineView {
    pub commands: Vec<PathCommand>,
    #[serde(flatten)]
    pub style: OutlineStyle,
}

/// Complete render description of the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub status: FrameStatus,
    pub width: f32,
    pub height: f32,
    pub version: u64,
    pub background: Option<BackgroundLayer>,
    pub markers: Vec<MarkerView>,
    pub outline: Option<OutlineView>,
}

impl RenderFrame {
    fn empty(status: FrameStatus, display: DisplaySize) -> Self {
        Self {
            status,
            width: display.width,
            height: display.height,
            version: 0,
            background: None,
            markers: Vec::new(),
            outline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawImage;

    fn surface() -> CanvasSurface {
        CanvasSurface::new(DisplaySize::default(), MarkerStyle::default(), OutlineStyle::default())
    }

    fn ready_surface() -> CanvasSurface {
        let mut surface = surface();
        let generation = surface.enter_image(0, "a.png");
        assert!(surface.finish_loading(generation, 1600, 1200).unwrap());
        surface
    }

    fn drawing_session(width: u32, height: u32) -> SessionState {
        SessionState::init_from_fetch(
            &[RawImage {
                id: 7,
                image_path: "a.png".to_string(),
            }],
            "https://example.org/static/",
        )
        .record_image_dimensions(width, height)
        .unwrap()
        .set_body_part("chest")
        .unwrap()
    }

    #[test]
    fn test_loading_lifecycle() {
        let mut surface = surface();
        assert!(matches!(surface.state(), SurfaceState::Empty));

        let generation = surface.enter_image(0, "a.png");
        assert!(matches!(surface.state(), SurfaceState::Loading(_)));
        assert!(surface.finish_loading(generation, 1600, 1200).unwrap());

        let layers = surface.layers().unwrap();
        assert_eq!(layers.background().scale_x, 0.5);
        assert_eq!(layers.background().scale_y, 0.5);
        assert!(layers.markers().is_empty());
    }

    #[test]
    fn test_stale_load_is_ignored() {
        let mut surface = surface();
        let first = surface.enter_image(0, "a.png");
        let second = surface.enter_image(1, "b.png");
        assert!(!surface.finish_loading(first, 100, 100).unwrap());
        assert!(!surface.is_ready());
        assert!(surface.finish_loading(second, 100, 100).unwrap());
        assert_eq!(surface.layers().unwrap().image_index(), 1);
    }

    #[test]
    fn test_reset_keeps_generations_unique() {
        let mut surface = ready_surface();
        let old = surface.layers().unwrap().generation();
        surface.reset();
        assert!(matches!(surface.state(), SurfaceState::Empty));

        let new = surface.enter_image(0, "b.png");
        assert!(new > old);
        assert!(surface.pending(old).is_none());
        assert!(!surface.finish_loading(old, 100, 100).unwrap());
    }

    #[test]
    fn test_entering_image_discards_layers() {
        let mut surface = ready_surface();
        surface.click(Point::new(10.0, 10.0), Step::Draw);
        let generation = surface.enter_image(1, "b.png");
        assert!(surface.markers().is_empty());
        surface.finish_loading(generation, 800, 600).unwrap();
        assert!(surface.markers().is_empty());
        assert!(surface.layers().unwrap().outline().vertices().is_empty());
    }

    #[test]
    fn test_click_adds_points_and_outline() {
        let mut surface = ready_surface();
        assert_eq!(surface.click(Point::new(100.0, 100.0), Step::Draw), ClickOutcome::Added(0));
        assert_eq!(surface.click(Point::new(200.0, 100.0), Step::Draw), ClickOutcome::Added(1));
        assert_eq!(surface.click(Point::new(200.0, 200.0), Step::Draw), ClickOutcome::Added(2));

        let layers = surface.layers().unwrap();
        assert_eq!(layers.outline().edge_count(), 3);
        assert_eq!(layers.outline().vertices()[2], Point::new(200.0, 200.0));
    }

    #[test]
    fn test_click_ignored_outside_draw_step() {
        let mut surface = ready_surface();
        assert_eq!(surface.click(Point::new(10.0, 10.0), Step::Label), ClickOutcome::Ignored);
        assert!(surface.markers().is_empty());

        let mut loading = surface.clone();
        loading.enter_image(1, "b.png");
        assert_eq!(loading.click(Point::new(10.0, 10.0), Step::Draw), ClickOutcome::Ignored);
        assert_eq!(surface.click(Point::new(900.0, 10.0), Step::Draw), ClickOutcome::Ignored);
    }

    #[test]
    fn test_click_on_marker_does_not_add_point() {
        let mut surface = ready_surface();
        surface.click(Point::new(100.0, 100.0), Step::Draw);
        assert_eq!(surface.click(Point::new(102.0, 101.0), Step::Draw), ClickOutcome::OnMarker(0));
        assert_eq!(surface.markers().len(), 1);
    }

    #[test]
    fn test_drag_updates_outline_live() {
        let mut surface = ready_surface();
        surface.click(Point::new(100.0, 100.0), Step::Draw);
        surface.click(Point::new(200.0, 100.0), Step::Draw);
        let before = surface.layers().unwrap().version();

        assert_eq!(surface.drag_start(Point::new(199.0, 100.0), Step::Draw), Some(1));
        assert!(surface.drag_move(Point::new(250.0, 150.0)));
        assert_eq!(surface.layers().unwrap().outline().vertices()[1], Point::new(250.0, 150.0));
        assert!(surface.drag_end(Point::new(300.0, 160.0)));
        assert_eq!(surface.markers()[1].position, Point::new(300.0, 160.0));
        assert!(surface.layers().unwrap().version() > before);

        // No drag in progress any more
        assert!(!surface.drag_move(Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_drag_clamps_to_surface() {
        let mut surface = ready_surface();
        surface.click(Point::new(10.0, 10.0), Step::Draw);
        surface.drag_start(Point::new(10.0, 10.0), Step::Draw);
        surface.drag_end(Point::new(-50.0, 900.0));
        assert_eq!(surface.markers()[0].position, Point::new(0.0, 600.0));
    }

    #[test]
    fn test_drag_start_misses() {
        let mut surface = ready_surface();
        surface.click(Point::new(100.0, 100.0), Step::Draw);
        assert_eq!(surface.drag_start(Point::new(300.0, 300.0), Step::Draw), None);
    }

    #[test]
    fn test_clear_all_is_idempotent() {
        let mut surface = ready_surface();
        surface.click(Point::new(100.0, 100.0), Step::Draw);
        surface.click(Point::new(200.0, 100.0), Step::Draw);

        surface.clear_all();
        assert!(surface.markers().is_empty());
        assert!(surface.layers().unwrap().outline().vertices().is_empty());
        surface.clear_all();
        assert!(surface.markers().is_empty());
        assert!(surface.frame().outline.is_none());
        assert!(surface.frame().background.is_some());
    }

    #[test]
    fn test_commit_normalizes_and_clears() {
        let mut surface = ready_surface();
        let session = drawing_session(1600, 1200);
        for (x, y) in [(100.0, 100.0), (200.0, 100.0), (200.0, 200.0)] {
            surface.click(Point::new(x, y), Step::Draw);
        }

        let next = surface.commit_annotation("rib", &session).unwrap();
        let saved = &next.results()[0].annotations[0];
        assert_eq!(saved.name, "rib");
        assert_eq!(
            saved.vertices,
            vec![
                Point::new(200.0, 200.0),
                Point::new(400.0, 200.0),
                Point::new(400.0, 400.0)
            ]
        );
        assert!(surface.markers().is_empty());
    }

    #[test]
    fn test_commit_rejects_empty_name() {
        let mut surface = ready_surface();
        let session = drawing_session(1600, 1200);
        surface.click(Point::new(100.0, 100.0), Step::Draw);

        let err = surface.commit_annotation("  ", &session).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(surface.markers().len(), 1);
        assert!(session.results()[0].annotations.is_empty());
    }

    #[test]
    fn test_commit_requires_dimensions() {
        let mut surface = ready_surface();
        let session = SessionState::init_from_fetch(
            &[RawImage {
                id: 7,
                image_path: "a.png".to_string(),
            }],
            "https://example.org/static/",
        )
        .set_body_part("chest")
        .unwrap();
        surface.click(Point::new(100.0, 100.0), Step::Draw);
        assert!(matches!(
            surface.commit_annotation("rib", &session),
            Err(ExamError::Invariant(_))
        ));
    }

    #[test]
    fn test_frame_describes_layers() {
        let mut surface = ready_surface();
        assert_eq!(surface.frame().status, FrameStatus::Ready);
        surface.click(Point::new(100.0, 100.0), Step::Draw);
        surface.click(Point::new(200.0, 100.0), Step::Draw);

        let frame = surface.frame();
        assert_eq!(frame.markers.len(), 2);
        assert_eq!(frame.markers[0].fill, "green");
        let outline = frame.outline.unwrap();
        assert_eq!(outline.commands.len(), 3);
        assert_eq!(outline.style.stroke_width, 4.0);

        let json = serde_json::to_string(&surface.frame()).unwrap();
        assert!(json.contains("\"strokeWidth\":4.0"));
        assert!(json.contains("\"op\":\"moveTo\""));
    }
}
