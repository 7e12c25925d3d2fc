//! Browser bindings.
//!
//! `WasmExam` wraps an [`ExamController`] for a JavaScript host. Structured
//! data crosses the boundary as JSON strings: effects and frames go out,
//! server responses come in. A rejected action throws a JSON notification.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::api::{FetchResponse, SubmitResponse};
use crate::canvas::ClickOutcome;
use crate::config::ExamConfig;
use crate::error::ExamError;
use crate::exam::{Effect, ExamController, Notification, RequestTicket};
use crate::logging;
use crate::model::Step;

#[wasm_bindgen(start)]
pub fn start() {
    let config = ExamConfig::load_from_local_storage();
    logging::init(config.log_level);
    log::info!("exam_canvas {} loaded", env!("CARGO_PKG_VERSION"));
}

fn to_js(err: ExamError) -> JsValue {
    let notification = Notification::from(&err);
    match serde_json::to_string(&notification) {
        Ok(json) => JsValue::from_str(&json),
        Err(_) => JsValue::from_str(&err.to_string()),
    }
}

fn effects_json(effects: Result<Vec<Effect>, ExamError>) -> Result<String, JsValue> {
    let effects = effects.map_err(to_js)?;
    serde_json::to_string(&effects).map_err(|e| to_js(e.into()))
}

/// Everything the page needs besides the canvas.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewState<'a> {
    current: usize,
    total: usize,
    step: Step,
    /// Position in the step indicator
    step_index: usize,
    step_title: &'static str,
    step_description: &'static str,
    label_prefill: &'a str,
    is_fetching: bool,
    is_submitting: bool,
    can_go_previous: bool,
    can_go_next: bool,
    can_submit: bool,
    can_undo: bool,
    can_redo: bool,
    undo_description: Option<String>,
    redo_description: Option<String>,
    /// Saved structure names on the current image
    annotations: Vec<&'a str>,
}

#[wasm_bindgen]
pub struct WasmExam {
    exam: ExamController,
}

#[wasm_bindgen]
impl WasmExam {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmExam {
        WasmExam {
            exam: ExamController::new(ExamConfig::load_from_local_storage()),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Begin an exam. Returns the effects to perform as JSON.
    pub fn start(&mut self, exam_id: u32) -> Result<String, JsValue> {
        effects_json(self.exam.start(u64::from(exam_id)))
    }

    /// Feed the raw body of the image-list response.
    #[wasm_bindgen(js_name = onFetchResponse)]
    pub fn on_fetch_response(&mut self, ticket: u32, body: &str) -> Result<String, JsValue> {
        let response = FetchResponse::from_json(body).map_err(to_js)?;
        effects_json(
            self.exam
                .on_fetch_response(RequestTicket(u64::from(ticket)), Ok(response)),
        )
    }

    #[wasm_bindgen(js_name = onFetchFailed)]
    pub fn on_fetch_failed(&mut self, ticket: u32, message: String) -> Result<String, JsValue> {
        effects_json(
            self.exam
                .on_fetch_response(RequestTicket(u64::from(ticket)), Err(message)),
        )
    }

    #[wasm_bindgen(js_name = onImageLoaded)]
    pub fn on_image_loaded(&mut self, generation: u32, width: u32, height: u32) -> Result<(), JsValue> {
        self.exam
            .on_image_loaded(u64::from(generation), width, height)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = onImageFailed)]
    pub fn on_image_failed(&mut self, generation: u32, message: String) -> Result<(), JsValue> {
        self.exam
            .on_image_failed(u64::from(generation), message)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = reloadImage)]
    pub fn reload_image(&mut self) -> Result<String, JsValue> {
        effects_json(self.exam.reload_image())
    }

    // ========================================================================
    // Input
    // ========================================================================

    #[wasm_bindgen(js_name = submitBodyPart)]
    pub fn submit_body_part(&mut self, text: &str) -> Result<(), JsValue> {
        self.exam.submit_body_part(text).map_err(to_js)
    }

    /// Returns whether a point was added.
    pub fn click(&mut self, x: f32, y: f32) -> bool {
        matches!(self.exam.click(x, y), ClickOutcome::Added(_))
    }

    /// Returns whether a marker was grabbed.
    #[wasm_bindgen(js_name = dragStart)]
    pub fn drag_start(&mut self, x: f32, y: f32) -> bool {
        self.exam.drag_start(x, y).is_some()
    }

    #[wasm_bindgen(js_name = dragMove)]
    pub fn drag_move(&mut self, x: f32, y: f32) -> bool {
        self.exam.drag_move(x, y)
    }

    #[wasm_bindgen(js_name = dragEnd)]
    pub fn drag_end(&mut self, x: f32, y: f32) -> bool {
        self.exam.drag_end(x, y)
    }

    #[wasm_bindgen(js_name = clearPoints)]
    pub fn clear_points(&mut self) {
        self.exam.clear_points();
    }

    #[wasm_bindgen(js_name = saveAnnotation)]
    pub fn save_annotation(&mut self, name: &str) -> Result<(), JsValue> {
        self.exam.save_annotation(name).map_err(to_js)
    }

    #[wasm_bindgen(js_name = deleteAnnotation)]
    pub fn delete_annotation(&mut self, index: usize) -> Result<(), JsValue> {
        self.exam.delete_annotation(index).map_err(to_js)
    }

    pub fn undo(&mut self) -> bool {
        self.exam.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.exam.redo()
    }

    // ========================================================================
    // Navigation and submission
    // ========================================================================

    pub fn previous(&mut self) -> Result<String, JsValue> {
        effects_json(self.exam.previous())
    }

    pub fn next(&mut self) -> Result<String, JsValue> {
        effects_json(self.exam.next())
    }

    pub fn submit(&mut self) -> Result<String, JsValue> {
        effects_json(self.exam.submit())
    }

    /// Feed the raw body of the submit response.
    #[wasm_bindgen(js_name = onSubmitResponse)]
    pub fn on_submit_response(&mut self, ticket: u32, body: &str) -> Result<String, JsValue> {
        let response: SubmitResponse =
            serde_json::from_str(body).map_err(|e| to_js(e.into()))?;
        effects_json(
            self.exam
                .on_submit_response(RequestTicket(u64::from(ticket)), Ok(response)),
        )
    }

    #[wasm_bindgen(js_name = onSubmitFailed)]
    pub fn on_submit_failed(&mut self, ticket: u32, message: String) -> Result<String, JsValue> {
        effects_json(
            self.exam
                .on_submit_response(RequestTicket(u64::from(ticket)), Err(message)),
        )
    }

    pub fn abandon(&mut self) {
        self.exam.abandon();
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render description of the canvas as JSON.
    pub fn frame(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.exam.frame()).map_err(|e| to_js(e.into()))
    }

    /// Page state (progress, step, button availability) as JSON.
    pub fn view(&self) -> Result<String, JsValue> {
        let (current, total) = self.exam.progress();
        let step = self.exam.step();
        let session = self.exam.session();
        let annotations = session
            .result(session.current_index())
            .map(|result| result.annotations.iter().map(|a| a.name.as_str()).collect())
            .unwrap_or_default();
        let view = ViewState {
            current,
            total,
            step,
            step_index: step.index(),
            step_title: step.title(),
            step_description: step.description(),
            label_prefill: self.exam.label_prefill(),
            is_fetching: self.exam.is_fetching(),
            is_submitting: self.exam.is_submitting(),
            can_go_previous: self.exam.can_go_previous(),
            can_go_next: self.exam.can_go_next(),
            can_submit: self.exam.can_submit(),
            can_undo: self.exam.can_undo(),
            can_redo: self.exam.can_redo(),
            undo_description: self.exam.undo_description(),
            redo_description: self.exam.redo_description(),
            annotations,
        };
        serde_json::to_string(&view).map_err(|e| to_js(e.into()))
    }
}

impl Default for WasmExam {
    fn default() -> Self {
        Self::new()
    }
}
