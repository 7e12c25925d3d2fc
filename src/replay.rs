//! Headless replay of a recorded exam session.
//!
//! A replay script holds the server's image-list response and the user's
//! input events. The replay plays the part of the host: it performs every
//! effect the controller asks for, answers image loads from recorded or
//! measured dimensions, and captures the submission payload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::api::{FetchResponse, SubmitRequest, SubmitResponse};
use crate::config::ExamConfig;
use crate::constants::STATUS_OK;
use crate::error::ExamError;
use crate::exam::{Effect, ExamController, NotificationKind};

/// Errors that stop a replay.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse replay script: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Exam error: {0}")]
    Exam(#[from] ExamError),

    #[error("No dimensions known for image {id} ({path})")]
    MissingDimensions { id: u64, path: String },

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

fn default_status() -> i32 {
    STATUS_OK
}

/// A recorded session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    #[serde(default)]
    pub exam_id: u64,
    /// Image-list response as returned by the server
    pub fetch: FetchResponse,
    /// Native `[width, height]` per image id
    #[serde(default)]
    pub dimensions: HashMap<u64, [u32; 2]>,
    /// Directory holding the image files, measured for images without
    /// recorded dimensions
    #[serde(default)]
    pub image_root: Option<PathBuf>,
    /// Status the simulated server answers a submission with
    #[serde(default = "default_status")]
    pub submit_status: i32,
    pub events: Vec<ReplayEvent>,
}

impl ReplayScript {
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let json = std::fs::read_to_string(path)?;
        let mut script = Self::from_json(&json)?;
        // Relative image roots are resolved against the script's directory
        if let (Some(root), Some(parent)) = (&script.image_root, path.parent()) {
            if root.is_relative() {
                script.image_root = Some(parent.join(root));
            }
        }
        Ok(script)
    }
}

/// One user action, in display pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ReplayEvent {
    BodyPart { text: String },
    Click { x: f32, y: f32 },
    Drag { from: [f32; 2], to: [f32; 2] },
    Save { name: String },
    Delete { index: usize },
    Clear,
    Next,
    Previous,
    Undo,
    Redo,
    Submit,
}

/// What happened during a replay.
#[derive(Debug, Default)]
pub struct ReplayOutcome {
    /// Last payload sent to the server, if any
    pub submission: Option<SubmitRequest>,
    /// Whether the exam finished with a successful submission
    pub finished: bool,
    /// Messages for every action that was rejected
    pub rejected: Vec<String>,
}

/// Plays a script against an [`ExamController`].
pub struct Replay {
    exam: ExamController,
    script: ReplayScript,
    paths: HashMap<u64, String>,
    outcome: ReplayOutcome,
}

impl Replay {
    pub fn new(config: ExamConfig, script: ReplayScript) -> Self {
        let paths = script
            .fetch
            .result
            .iter()
            .map(|raw| (raw.id, raw.image_path.clone()))
            .collect();
        Self {
            exam: ExamController::new(config),
            script,
            paths,
            outcome: ReplayOutcome::default(),
        }
    }

    pub fn exam(&self) -> &ExamController {
        &self.exam
    }

    /// Run every event and return the outcome.
    ///
    /// Rejected input is recorded and the replay carries on, like a user
    /// reading the warning and continuing. Anything else stops the replay.
    pub fn run(mut self) -> Result<ReplayOutcome, ReplayError> {
        let effects = self.exam.start(self.script.exam_id)?;
        self.perform(effects)?;

        let events = std::mem::take(&mut self.script.events);
        for (i, event) in events.iter().enumerate() {
            log::debug!("Event {}: {:?}", i, event);
            match self.dispatch(event) {
                Ok(effects) => self.perform(effects)?,
                Err(ReplayError::Exam(e)) if e.is_validation() => {
                    log::warn!("Event {} rejected: {}", i, e);
                    self.outcome.rejected.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        let (current, total) = self.exam.progress();
        log::info!(
            "Replayed {} events, on image {} of {}",
            events.len(),
            current,
            total
        );
        Ok(self.outcome)
    }

    fn dispatch(&mut self, event: &ReplayEvent) -> Result<Vec<Effect>, ReplayError> {
        let exam = &mut self.exam;
        let effects = match event {
            ReplayEvent::BodyPart { text } => {
                exam.submit_body_part(text)?;
                Vec::new()
            }
            ReplayEvent::Click { x, y } => {
                let outcome = exam.click(*x, *y);
                log::debug!("Click at ({}, {}): {:?}", x, y, outcome);
                Vec::new()
            }
            ReplayEvent::Drag { from, to } => {
                if exam.drag_start(from[0], from[1]).is_some() {
                    exam.drag_end(to[0], to[1]);
                } else {
                    log::debug!("No marker under ({}, {}) to drag", from[0], from[1]);
                }
                Vec::new()
            }
            ReplayEvent::Save { name } => {
                exam.save_annotation(name)?;
                Vec::new()
            }
            ReplayEvent::Delete { index } => {
                exam.delete_annotation(*index)?;
                Vec::new()
            }
            ReplayEvent::Clear => {
                exam.clear_points();
                Vec::new()
            }
            ReplayEvent::Next => exam.next()?,
            ReplayEvent::Previous => exam.previous()?,
            ReplayEvent::Undo => {
                exam.undo();
                Vec::new()
            }
            ReplayEvent::Redo => {
                exam.redo();
                Vec::new()
            }
            ReplayEvent::Submit => exam.submit()?,
        };
        Ok(effects)
    }

    /// Carry out effects until none are left.
    fn perform(&mut self, effects: Vec<Effect>) -> Result<(), ReplayError> {
        let mut queue = std::collections::VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::FetchImages { ticket, .. } => {
                    let response = Ok(self.script.fetch.clone());
                    queue.extend(self.exam.on_fetch_response(ticket, response)?);
                }
                Effect::LoadImage { generation, url } => {
                    let id = self.exam.session().current_image()?.id;
                    let (width, height) = self.dimensions_of(id)?;
                    log::debug!("Loaded {} as {}x{}", url, width, height);
                    self.exam.on_image_loaded(generation, width, height)?;
                }
                Effect::Submit { ticket, payload } => {
                    self.outcome.submission = Some(payload);
                    let response = SubmitResponse {
                        status: self.script.submit_status,
                    };
                    match self.exam.on_submit_response(ticket, Ok(response)) {
                        Ok(effects) => queue.extend(effects),
                        Err(e) => {
                            log::warn!("Submission failed: {}", e);
                            self.outcome.rejected.push(e.to_string());
                        }
                    }
                }
                Effect::Notify(notification) => match notification.kind {
                    NotificationKind::Success => log::info!("{}", notification.message),
                    _ => log::warn!("{}", notification.message),
                },
                Effect::NavigateAway => {
                    self.outcome.finished = true;
                }
            }
        }
        Ok(())
    }

    fn dimensions_of(&self, id: u64) -> Result<(u32, u32), ReplayError> {
        if let Some([width, height]) = self.script.dimensions.get(&id) {
            return Ok((*width, *height));
        }
        let path = self.paths.get(&id).cloned().unwrap_or_default();
        let Some(root) = &self.script.image_root else {
            return Err(ReplayError::MissingDimensions { id, path });
        };
        let file = root.join(path.trim_start_matches('/'));
        image::image_dimensions(&file).map_err(|source| ReplayError::Image { path: file, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "examId": 3,
        "fetch": {
            "status": 1,
            "result": [
                {"id": 11, "image_path": "hand.png"},
                {"id": 12, "image_path": "chest.png"}
            ]
        },
        "dimensions": {"11": [1600, 1200], "12": [400, 300]},
        "events": [
            {"action": "click", "x": 10, "y": 10},
            {"action": "bodyPart", "text": "hand"},
            {"action": "click", "x": 100, "y": 100},
            {"action": "click", "x": 200, "y": 100},
            {"action": "click", "x": 200, "y": 200},
            {"action": "save", "name": ""},
            {"action": "save", "name": "metacarpal"},
            {"action": "next"},
            {"action": "bodyPart", "text": "chest"},
            {"action": "click", "x": 100, "y": 100},
            {"action": "click", "x": 200, "y": 100},
            {"action": "drag", "from": [200, 100], "to": [200, 200]},
            {"action": "save", "name": "rib"},
            {"action": "submit"}
        ]
    }"#;

    #[test]
    fn test_replay_submits_normalized_annotations() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        let outcome = Replay::new(ExamConfig::default(), script).run().unwrap();

        assert!(outcome.finished);
        assert_eq!(outcome.rejected, vec!["Structure name must be filled in".to_string()]);

        let submission = outcome.submission.unwrap();
        assert_eq!(submission.annotations.len(), 2);
        assert_eq!(submission.annotations[0].id, 11);
        assert_eq!(submission.annotations[0].annotations[0].vertex, "200,200;400,200;400,400;");
        assert_eq!(submission.annotations[1].body_part, "chest");
        assert_eq!(submission.annotations[1].annotations[0].vertex, "50,50;100,100;");
    }

    #[test]
    fn test_replay_submit_failure_keeps_exam_open() {
        let mut script = ReplayScript::from_json(SCRIPT).unwrap();
        script.submit_status = 0;
        let replay = Replay::new(ExamConfig::default(), script);
        let outcome = replay.run().unwrap();
        assert!(!outcome.finished);
        assert!(outcome.submission.is_some());
        assert_eq!(outcome.rejected.len(), 2);
    }

    #[test]
    fn test_replay_missing_dimensions() {
        let mut script = ReplayScript::from_json(SCRIPT).unwrap();
        script.dimensions.clear();
        let err = Replay::new(ExamConfig::default(), script).run().unwrap_err();
        assert!(matches!(err, ReplayError::MissingDimensions { id: 11, .. }));
    }

    #[test]
    fn test_replay_reads_image_sizes_from_files() {
        let dir = std::env::temp_dir().join("exam_canvas_replay_images");
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbImage::new(1600, 1200).save(dir.join("hand.png")).unwrap();
        image::RgbImage::new(400, 300).save(dir.join("chest.png")).unwrap();

        let mut script = ReplayScript::from_json(SCRIPT).unwrap();
        script.dimensions.clear();
        script.image_root = Some(dir.clone());
        let outcome = Replay::new(ExamConfig::default(), script).run().unwrap();
        assert!(outcome.finished);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let json = r#"{"fetch": {"status": 1}, "events": [{"action": "zoom"}]}"#;
        assert!(matches!(
            ReplayScript::from_json(json),
            Err(ReplayError::ParseError(_))
        ));
    }
}
