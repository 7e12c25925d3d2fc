//! Annotation session state.
//!
//! `SessionState` is a persistent value: every operation returns a new state
//! and leaves the receiver untouched. Images and results are held behind
//! `Arc`, so a new state shares every image and result it did not change
//! with the state it was derived from (`Arc::ptr_eq` holds for them).

use std::sync::Arc;

use crate::api::{RawImage, image_url};
use crate::error::{ExamError, ValidationError};
use crate::model::{Annotation, ImageRef, ImageResult, Step};

/// Multi-field update applied in one transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub current_index: Option<usize>,
    pub step: Option<Step>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: usize) -> Self {
        self.current_index = Some(index);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }
}

/// The whole state of one exam session.
///
/// Invariants: `images.len() == results.len()`, and
/// `current_index < images.len()` whenever there are images.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    images: Vec<Arc<ImageRef>>,
    results: Vec<Arc<ImageResult>>,
    current_index: usize,
    step: Step,
}

impl SessionState {
    /// An empty session with no images.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a session from a fetched image list.
    ///
    /// Each image gets an empty result; index and step are reset.
    pub fn init_from_fetch(raw_images: &[RawImage], asset_base_url: &str) -> Self {
        let images = raw_images
            .iter()
            .map(|raw| Arc::new(ImageRef::new(raw.id, image_url(asset_base_url, &raw.image_path))))
            .collect::<Vec<_>>();
        let results = images
            .iter()
            .map(|_| Arc::new(ImageResult::default()))
            .collect();

        log::debug!("Session initialised with {} images", images.len());

        Self {
            images,
            results,
            current_index: 0,
            step: Step::Label,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn images(&self) -> Vec<&ImageRef> {
        self.images.iter().map(Arc::as_ref).collect()
    }

    pub fn results(&self) -> Vec<&ImageResult> {
        self.results.iter().map(Arc::as_ref).collect()
    }

    pub fn image(&self, index: usize) -> Option<&ImageRef> {
        self.images.get(index).map(Arc::as_ref)
    }

    pub fn result(&self, index: usize) -> Option<&ImageResult> {
        self.results.get(index).map(Arc::as_ref)
    }

    /// Shared handle to an image, for structural-sharing checks.
    pub fn image_arc(&self, index: usize) -> Option<&Arc<ImageRef>> {
        self.images.get(index)
    }

    /// Shared handle to a result, for structural-sharing checks.
    pub fn result_arc(&self, index: usize) -> Option<&Arc<ImageResult>> {
        self.results.get(index)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Whether the current image is the last one.
    pub fn is_last(&self) -> bool {
        !self.is_empty() && self.current_index == self.images.len() - 1
    }

    pub fn current_image(&self) -> Result<&ImageRef, ExamError> {
        self.image(self.current_index)
            .ok_or_else(|| ExamError::invariant("session has no current image"))
    }

    pub fn current_result(&self) -> Result<&ImageResult, ExamError> {
        self.result(self.current_index)
            .ok_or_else(|| ExamError::invariant("session has no current result"))
    }

    /// Total number of saved annotations across all images.
    pub fn annotation_count(&self) -> usize {
        self.results.iter().map(|r| r.annotations.len()).sum()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Record the native size of the current image.
    ///
    /// Dimensions are recorded once; a later load of the same image leaves
    /// them unchanged.
    pub fn record_image_dimensions(&self, width: u32, height: u32) -> Result<Self, ExamError> {
        if width == 0 || height == 0 {
            return Err(ExamError::invariant(format!(
                "image loaded with empty size {}x{}",
                width, height
            )));
        }
        let image = self.current_image()?;
        if image.dimensions().is_some() {
            log::debug!(
                "Image {} already has dimensions {:?}, keeping them",
                image.id,
                image.dimensions()
            );
            return Ok(self.clone());
        }

        let updated = image.clone().with_dimensions(width, height);
        log::debug!("Image {} native size {}x{}", updated.id, width, height);

        let mut next = self.clone();
        next.images[self.current_index] = Arc::new(updated);
        Ok(next)
    }

    /// Set the body part of the current image and move on to drawing.
    pub fn set_body_part(&self, text: &str) -> Result<Self, ExamError> {
        if self.step != Step::Label {
            return Err(ValidationError::WrongStep {
                expected: Step::Label,
                actual: self.step,
            }
            .into());
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyBodyPart.into());
        }

        let mut next = self.update_current_result(|result| {
            result.body_part = text.to_string();
        })?;
        next.step = Step::Draw;
        log::debug!("Body part '{}' set, step -> Draw", text);
        Ok(next)
    }

    /// Append an annotation to the current image.
    pub fn add_annotation(&self, annotation: Annotation) -> Result<Self, ExamError> {
        if annotation.name.trim().is_empty() {
            return Err(ValidationError::EmptyAnnotationName.into());
        }
        log::debug!(
            "Adding annotation '{}' with {} vertices",
            annotation.name,
            annotation.vertices.len()
        );
        self.update_current_result(move |result| result.annotations.push(annotation))
    }

    /// Remove the annotation at `index` from the current image.
    pub fn delete_annotation(&self, index: usize) -> Result<Self, ExamError> {
        let count = self.current_result()?.annotations.len();
        if index >= count {
            return Err(ExamError::invariant(format!(
                "annotation index {} out of range (image has {})",
                index, count
            )));
        }
        self.update_current_result(|result| {
            let removed = result.annotations.remove(index);
            log::debug!("Deleted annotation '{}'", removed.name);
        })
    }

    /// Move to another image without touching the step.
    pub fn go_to(&self, index: usize) -> Result<Self, ExamError> {
        self.check_index(index)?;
        let mut next = self.clone();
        next.current_index = index;
        Ok(next)
    }

    /// Apply several field updates as one transition.
    pub fn set_field(&self, patch: SessionPatch) -> Result<Self, ExamError> {
        let mut next = self.clone();
        if let Some(index) = patch.current_index {
            self.check_index(index)?;
            next.current_index = index;
        }
        if let Some(step) = patch.step {
            next.step = step;
        }
        Ok(next)
    }

    /// This state's results, index and step over the images of `current`.
    ///
    /// Image dimensions are recorded as images load, outside any edit, so a
    /// restored snapshot must take its images from the state it replaces.
    pub fn with_images_of(&self, current: &SessionState) -> Self {
        if self.images.len() != current.images.len() {
            log::error!(
                "Invariant violated: restoring a session of {} images over one of {}",
                self.images.len(),
                current.images.len()
            );
            return self.clone();
        }
        Self {
            images: current.images.clone(),
            ..self.clone()
        }
    }

    fn check_index(&self, index: usize) -> Result<(), ExamError> {
        if index >= self.images.len() {
            return Err(ExamError::invariant(format!(
                "image index {} out of range (session has {})",
                index,
                self.images.len()
            )));
        }
        Ok(())
    }

    /// Copy-on-write update of the current result only.
    fn update_current_result(
        &self,
        update: impl FnOnce(&mut ImageResult),
    ) -> Result<Self, ExamError> {
        let mut result = self.current_result()?.clone();
        update(&mut result);
        let mut next = self.clone();
        next.results[self.current_index] = Arc::new(result);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn raw(id: u64, path: &str) -> RawImage {
        RawImage {
            id,
            image_path: path.to_string(),
        }
    }

    fn three_images() -> SessionState {
        SessionState::init_from_fetch(
            &[raw(1, "a.png"), raw(2, "b.png"), raw(3, "c.png")],
            "https://example.org/static/",
        )
    }

    fn assert_invariants(state: &SessionState) {
        assert_eq!(state.images().len(), state.results().len());
        if !state.is_empty() {
            assert!(state.current_index() < state.len());
        }
    }

    #[test]
    fn test_init_from_fetch() {
        let state = SessionState::init_from_fetch(&[raw(7, "a.png")], "https://example.org/static/");
        assert_eq!(state.len(), 1);
        assert_eq!(state.images()[0].id, 7);
        assert_eq!(state.images()[0].url, "https://example.org/static/a.png");
        assert_eq!(state.results()[0], &ImageResult::default());
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.step(), Step::Label);
        assert_invariants(&state);
    }

    #[test]
    fn test_set_body_part_advances_step() {
        let state = three_images();
        let next = state.set_body_part("chest").unwrap();
        assert_eq!(next.results()[0].body_part, "chest");
        assert_eq!(next.step(), Step::Draw);
        // Receiver is untouched
        assert_eq!(state.results()[0].body_part, "");
        assert_eq!(state.step(), Step::Label);
    }

    #[test]
    fn test_set_body_part_rejects_empty_and_wrong_step() {
        let state = three_images();
        assert!(matches!(
            state.set_body_part("   "),
            Err(ExamError::Validation(ValidationError::EmptyBodyPart))
        ));
        let drawing = state.set_body_part("chest").unwrap();
        assert!(matches!(
            drawing.set_body_part("head"),
            Err(ExamError::Validation(ValidationError::WrongStep { .. }))
        ));
    }

    #[test]
    fn test_record_dimensions_once() {
        let state = three_images();
        let loaded = state.record_image_dimensions(1600, 1200).unwrap();
        assert_eq!(loaded.images()[0].dimensions(), Some((1600, 1200)));
        let reloaded = loaded.record_image_dimensions(10, 10).unwrap();
        assert_eq!(reloaded.images()[0].dimensions(), Some((1600, 1200)));
        assert!(state.record_image_dimensions(0, 10).is_err());
    }

    #[test]
    fn test_add_and_delete_annotation() {
        let state = three_images().set_body_part("chest").unwrap();
        let ann = Annotation::new("rib", vec![Point::new(1.0, 2.0)]);
        let added = state.add_annotation(ann.clone()).unwrap();
        assert_eq!(added.results()[0].annotations, vec![ann]);

        let deleted = added.delete_annotation(0).unwrap();
        assert!(deleted.results()[0].annotations.is_empty());
    }

    #[test]
    fn test_add_annotation_rejects_empty_name() {
        let state = three_images();
        assert!(matches!(
            state.add_annotation(Annotation::new("", vec![])),
            Err(ExamError::Validation(ValidationError::EmptyAnnotationName))
        ));
    }

    #[test]
    fn test_delete_out_of_range_fails() {
        let state = three_images();
        assert!(matches!(
            state.delete_annotation(0),
            Err(ExamError::Invariant(_))
        ));
    }

    #[test]
    fn test_go_to_bounds() {
        let state = three_images().set_body_part("chest").unwrap();
        let moved = state.go_to(2).unwrap();
        assert_eq!(moved.current_index(), 2);
        assert_eq!(moved.step(), Step::Draw);
        assert!(state.go_to(3).is_err());
        assert_invariants(&moved);
    }

    #[test]
    fn test_set_field_patches_together() {
        let state = three_images().set_body_part("chest").unwrap();
        let next = state
            .set_field(SessionPatch::new().index(1).step(Step::Label))
            .unwrap();
        assert_eq!(next.current_index(), 1);
        assert_eq!(next.step(), Step::Label);
        assert!(state.set_field(SessionPatch::new().index(9)).is_err());
    }

    #[test]
    fn test_updates_share_untouched_entries() {
        let state = three_images();
        let next = state.set_body_part("chest").unwrap();
        assert!(!Arc::ptr_eq(
            state.result_arc(0).unwrap(),
            next.result_arc(0).unwrap()
        ));
        assert!(Arc::ptr_eq(
            state.result_arc(1).unwrap(),
            next.result_arc(1).unwrap()
        ));
        for i in 0..3 {
            assert!(Arc::ptr_eq(
                state.image_arc(i).unwrap(),
                next.image_arc(i).unwrap()
            ));
        }
    }

    #[test]
    fn test_with_images_of_keeps_recorded_dimensions() {
        let before_load = three_images().set_body_part("chest").unwrap();
        let loaded = before_load.record_image_dimensions(1600, 1200).unwrap();
        let snapshot = three_images();

        let restored = snapshot.with_images_of(&loaded);
        assert_eq!(restored.images()[0].dimensions(), Some((1600, 1200)));
        assert_eq!(restored.step(), Step::Label);
        assert_eq!(restored.results()[0].body_part, "");
        assert!(Arc::ptr_eq(
            restored.image_arc(0).unwrap(),
            loaded.image_arc(0).unwrap()
        ));

        // Mismatched sessions are left alone
        let other = SessionState::init_from_fetch(&[raw(9, "z.png")], "https://example.org/");
        assert_eq!(snapshot.with_images_of(&other).len(), 3);
    }

    #[test]
    fn test_empty_session_has_no_current_image() {
        let state = SessionState::new();
        assert!(state.is_empty());
        assert!(!state.is_last());
        assert!(state.current_image().is_err());
        assert!(state.set_body_part("chest").is_err());
        assert_invariants(&state);
    }
}
