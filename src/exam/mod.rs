//! Exam flow controller.
//!
//! `ExamController` is the single owner of the session, the drawing surface
//! and the step/index pair. It is a synchronous reducer: user input and I/O
//! completions are fed in one at a time, and any outside work it needs (a
//! fetch, an image load, a submit, a notification, leaving the page) is
//! returned as an [`Effect`] for the host to perform.
//!
//! Every request carries a ticket (or, for image loads, a surface
//! generation). A completion whose ticket is no longer the one being
//! awaited belongs to an abandoned request and is dropped.

mod effect;


pub use effect::{Effect, Notification, NotificationKind, RequestTicket};

use web_time::Instant;

use crate::api::{FetchResponse, SubmitRequest, SubmitResponse};
use crate::canvas::{CanvasSurface, ClickOutcome, MarkerId, RenderFrame};
use crate::config::ExamConfig;
use crate::constants::STATUS_OK;
use crate::error::{ExamError, ValidationError};
use crate::geometry::Point;
use crate::history::{Edit, History};
use crate::model::Step;
use crate::session::{SessionPatch, SessionState};

/// Where the exam as a whole stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    /// Not started, or the last fetch failed
    Idle,
    /// Waiting for the image list
    Fetching,
    /// Images loaded, test-taker working
    Active,
    /// Waiting for the submit response
    Submitting,
    /// Submitted successfully; the session has been discarded
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: RequestTicket,
    issued_at: Instant,
}

/// Drives one exam session from fetch to submission.
#[derive(Debug)]
pub struct ExamController {
    config: ExamConfig,
    session: SessionState,
    surface: CanvasSurface,
    history: History,
    phase: ExamPhase,
    in_flight: Option<InFlight>,
    last_ticket: u64,
    label_prefill: String,
}

impl ExamController {
    pub fn new(config: ExamConfig) -> Self {
        let surface = CanvasSurface::new(config.display, config.marker.clone(), config.outline.clone());
        let history = History::new(config.history_limit);
        Self {
            config,
            session: SessionState::new(),
            surface,
            history,
            phase: ExamPhase::Idle,
            in_flight: None,
            last_ticket: 0,
            label_prefill: String::new(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn surface(&self) -> &CanvasSurface {
        &self.surface
    }

    pub fn phase(&self) -> ExamPhase {
        self.phase
    }

    pub fn step(&self) -> Step {
        self.session.step()
    }

    pub fn is_fetching(&self) -> bool {
        self.phase == ExamPhase::Fetching
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == ExamPhase::Submitting
    }

    /// `(question number, question count)` with the number starting at 1.
    pub fn progress(&self) -> (usize, usize) {
        if self.session.is_empty() {
            (0, 0)
        } else {
            (self.session.current_index() + 1, self.session.len())
        }
    }

    /// Body part to pre-fill the label input with; set when returning to an
    /// image that already has one.
    pub fn label_prefill(&self) -> &str {
        &self.label_prefill
    }

    /// Render description of the drawing surface.
    pub fn frame(&self) -> RenderFrame {
        self.surface.frame()
    }

    pub fn can_go_previous(&self) -> bool {
        self.phase == ExamPhase::Active && self.session.current_index() > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.phase == ExamPhase::Active && self.session.step() == Step::Draw && !self.session.is_last()
    }

    pub fn can_submit(&self) -> bool {
        self.phase == ExamPhase::Active && self.session.step() == Step::Draw && self.session.is_last()
    }

    pub fn can_undo(&self) -> bool {
        self.phase == ExamPhase::Active && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.phase == ExamPhase::Active && self.history.can_redo()
    }

    /// Tooltip text for the undo button.
    pub fn undo_description(&self) -> Option<String> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.history.redo_description()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    fn issue_ticket(&mut self) -> RequestTicket {
        self.last_ticket += 1;
        let ticket = RequestTicket(self.last_ticket);
        self.in_flight = Some(InFlight {
            ticket,
            issued_at: Instant::now(),
        });
        ticket
    }

    /// Take the in-flight request if `ticket` is the one awaited in `phase`.
    fn take_in_flight(&mut self, ticket: RequestTicket, phase: ExamPhase) -> Option<InFlight> {
        match self.in_flight {
            Some(in_flight) if self.phase == phase && in_flight.ticket == ticket => {
                self.in_flight = None;
                log::debug!(
                    "Request {} completed after {} ms",
                    ticket.0,
                    in_flight.issued_at.elapsed().as_millis()
                );
                Some(in_flight)
            }
            _ => {
                log::warn!("Ignoring stale response for request {}", ticket.0);
                None
            }
        }
    }

    fn require_active(&self) -> Result<(), ExamError> {
        match self.phase {
            ExamPhase::Active => Ok(()),
            ExamPhase::Submitting => Err(ValidationError::Busy.into()),
            _ => Err(ValidationError::NotActive.into()),
        }
    }

    /// Ask for the image list of an exam.
    ///
    /// A fetch that is still outstanding is superseded by the new one.
    pub fn start(&mut self, exam_id: u64) -> Result<Vec<Effect>, ExamError> {
        if matches!(self.phase, ExamPhase::Active | ExamPhase::Submitting) {
            return Err(ValidationError::AlreadyStarted.into());
        }
        let ticket = self.issue_ticket();
        self.phase = ExamPhase::Fetching;
        log::info!("Fetching images for exam {} (request {})", exam_id, ticket.0);
        Ok(vec![Effect::FetchImages { ticket, exam_id }])
    }

    /// Handle the image-list response, or a transport failure.
    pub fn on_fetch_response(
        &mut self,
        ticket: RequestTicket,
        response: Result<FetchResponse, String>,
    ) -> Result<Vec<Effect>, ExamError> {
        if self.take_in_flight(ticket, ExamPhase::Fetching).is_none() {
            return Ok(Vec::new());
        }
        self.phase = ExamPhase::Idle;

        let images = response.map_err(ExamError::Transport)?.into_result()?;
        if images.is_empty() {
            return Err(ExamError::upstream(STATUS_OK, "exam contains no images"));
        }

        self.session = SessionState::init_from_fetch(&images, &self.config.asset_base_url);
        self.surface.reset();
        self.history.clear();
        self.label_prefill.clear();
        self.phase = ExamPhase::Active;
        log::info!("Exam started with {} images", self.session.len());

        Ok(vec![self.enter_current_image()?])
    }

    fn enter_current_image(&mut self) -> Result<Effect, ExamError> {
        let index = self.session.current_index();
        let url = self.session.current_image()?.url.clone();
        let generation = self.surface.enter_image(index, url.clone());
        Ok(Effect::LoadImage { generation, url })
    }

    /// Handle an image asset finishing loading.
    ///
    /// The native size is recorded in the session before the surface
    /// becomes ready, so no point can be normalized without it.
    pub fn on_image_loaded(&mut self, generation: u64, width: u32, height: u32) -> Result<(), ExamError> {
        let Some(pending) = self.surface.pending(generation) else {
            log::warn!("Ignoring image load for stale generation {}", generation);
            return Ok(());
        };
        if pending.image_index != self.session.current_index() {
            return Err(ExamError::invariant(format!(
                "surface is loading image {} while the session is on image {}",
                pending.image_index,
                self.session.current_index()
            )));
        }

        self.session = self.session.record_image_dimensions(width, height)?;
        let (width, height) = self
            .session
            .current_image()?
            .dimensions()
            .ok_or_else(|| ExamError::invariant("image dimensions missing after load"))?;
        self.surface.finish_loading(generation, width, height)?;
        Ok(())
    }

    /// Handle an image asset failing to load. The surface keeps waiting;
    /// [`ExamController::reload_image`] retries.
    pub fn on_image_failed(&mut self, generation: u64, message: String) -> Result<(), ExamError> {
        if self.surface.pending(generation).is_none() {
            log::warn!("Ignoring image failure for stale generation {}", generation);
            return Ok(());
        }
        Err(ExamError::Transport(message))
    }

    /// Load the current image again.
    pub fn reload_image(&mut self) -> Result<Vec<Effect>, ExamError> {
        self.require_active()?;
        Ok(vec![self.enter_current_image()?])
    }

    // ========================================================================
    // Label and drawing
    // ========================================================================

    /// Replace the session with `next`, remembering the old one for undo.
    fn apply(&mut self, edit: Edit, next: SessionState) {
        let previous = std::mem::replace(&mut self.session, next);
        self.history.record(edit, previous);
    }

    /// Enter the body part of the current image and move to drawing.
    pub fn submit_body_part(&mut self, text: &str) -> Result<(), ExamError> {
        self.require_active()?;
        let next = self.session.set_body_part(text)?;
        self.apply(Edit::SetBodyPart(text.trim().to_string()), next);
        self.label_prefill.clear();
        Ok(())
    }

    /// Pointer click on the surface.
    pub fn click(&mut self, x: f32, y: f32) -> ClickOutcome {
        if self.phase != ExamPhase::Active {
            return ClickOutcome::Ignored;
        }
        self.surface.click(Point::new(x, y), self.session.step())
    }

    pub fn drag_start(&mut self, x: f32, y: f32) -> Option<MarkerId> {
        if self.phase != ExamPhase::Active {
            return None;
        }
        self.surface.drag_start(Point::new(x, y), self.session.step())
    }

    pub fn drag_move(&mut self, x: f32, y: f32) -> bool {
        self.phase == ExamPhase::Active && self.surface.drag_move(Point::new(x, y))
    }

    pub fn drag_end(&mut self, x: f32, y: f32) -> bool {
        self.phase == ExamPhase::Active && self.surface.drag_end(Point::new(x, y))
    }

    /// Remove the points drawn so far on the current image.
    pub fn clear_points(&mut self) {
        if self.phase == ExamPhase::Active {
            self.surface.clear_all();
        }
    }

    /// Save the drawn points as an annotation named `name`.
    pub fn save_annotation(&mut self, name: &str) -> Result<(), ExamError> {
        self.require_active()?;
        let next = self.surface.commit_annotation(name, &self.session)?;
        self.apply(Edit::AddAnnotation(name.trim().to_string()), next);
        Ok(())
    }

    /// Delete a saved annotation of the current image.
    pub fn delete_annotation(&mut self, index: usize) -> Result<(), ExamError> {
        self.require_active()?;
        let next = self.session.delete_annotation(index)?;
        let name = self
            .session
            .current_result()?
            .annotations
            .get(index)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        self.apply(Edit::DeleteAnnotation(name), next);
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        match self.history.undo(self.session.clone()) {
            Some(previous) => {
                self.session = previous.with_images_of(&self.session);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        match self.history.redo(self.session.clone()) {
            Some(next) => {
                self.session = next.with_images_of(&self.session);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    fn move_to(&mut self, index: usize) -> Result<Vec<Effect>, ExamError> {
        self.session = self
            .session
            .set_field(SessionPatch::new().index(index).step(Step::Label))?;
        self.label_prefill = self.session.current_result()?.body_part.clone();
        self.history.clear();
        log::debug!("Moved to image {} of {}", index + 1, self.session.len());
        Ok(vec![self.enter_current_image()?])
    }

    /// Go back one image. Its saved body part and annotations are kept; the
    /// step returns to labelling with the body part pre-filled.
    pub fn previous(&mut self) -> Result<Vec<Effect>, ExamError> {
        self.require_active()?;
        if !self.can_go_previous() {
            return Err(ValidationError::NavigationBlocked("already on the first image").into());
        }
        self.move_to(self.session.current_index() - 1)
    }

    /// Go forward one image. Only allowed once the current image is labelled.
    pub fn next(&mut self) -> Result<Vec<Effect>, ExamError> {
        self.require_active()?;
        if self.session.step() != Step::Draw {
            return Err(ValidationError::NavigationBlocked("enter the body part first").into());
        }
        if self.session.is_last() {
            return Err(ValidationError::NavigationBlocked("already on the last image").into());
        }
        self.move_to(self.session.current_index() + 1)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit every image result. Only available on the last image once its
    /// label is entered.
    pub fn submit(&mut self) -> Result<Vec<Effect>, ExamError> {
        if self.phase == ExamPhase::Submitting {
            return Err(ValidationError::Busy.into());
        }
        if !self.can_submit() {
            return Err(ValidationError::SubmitUnavailable.into());
        }
        let payload = SubmitRequest::from_session(&self.session);
        let ticket = self.issue_ticket();
        self.phase = ExamPhase::Submitting;
        log::info!(
            "Submitting {} images with {} annotations (request {})",
            payload.annotations.len(),
            self.session.annotation_count(),
            ticket.0
        );
        Ok(vec![Effect::Submit { ticket, payload }])
    }

    /// Handle the submit response. On failure the session is kept so the
    /// submission can be retried.
    pub fn on_submit_response(
        &mut self,
        ticket: RequestTicket,
        response: Result<SubmitResponse, String>,
    ) -> Result<Vec<Effect>, ExamError> {
        if self.take_in_flight(ticket, ExamPhase::Submitting).is_none() {
            return Ok(Vec::new());
        }
        self.phase = ExamPhase::Active;

        let response = response.map_err(ExamError::Transport)?;
        if !response.is_success() {
            return Err(ExamError::upstream(response.status, "submission was rejected"));
        }

        log::info!("Exam submitted");
        self.reset();
        self.phase = ExamPhase::Finished;
        Ok(vec![
            Effect::Notify(Notification::success("Exam submitted")),
            Effect::NavigateAway,
        ])
    }

    /// Discard the session without submitting. Outstanding responses are
    /// ignored when they arrive.
    pub fn abandon(&mut self) {
        log::info!("Exam abandoned");
        self.reset();
        self.phase = ExamPhase::Idle;
    }

    fn reset(&mut self) {
        self.session = SessionState::new();
        self.surface.reset();
        self.history.clear();
        self.in_flight = None;
        self.label_prefill.clear();
    }
}
