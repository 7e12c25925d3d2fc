//! Wire types for the exam server.
//!
//! The server is reached by an external HTTP layer; this module only defines
//! the JSON shapes exchanged with it and how they map onto the session model.

use serde::{Deserialize, Serialize};

use crate::constants::STATUS_OK;
use crate::error::ExamError;
use crate::session::SessionState;

/// One image descriptor in the image-list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    pub id: u64,
    pub image_path: String,
}

/// Response of the image-list fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: i32,
    #[serde(default)]
    pub result: Vec<RawImage>,
    #[serde(default)]
    pub error: String,
}

impl FetchResponse {
    /// A successful response carrying the given images.
    pub fn ok(result: Vec<RawImage>) -> Self {
        Self {
            status: STATUS_OK,
            result,
            error: String::new(),
        }
    }

    /// Parse a response body.
    pub fn from_json(json: &str) -> Result<Self, ExamError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Unwrap the image list, turning a non-success status into an error.
    pub fn into_result(self) -> Result<Vec<RawImage>, ExamError> {
        if self.status == STATUS_OK {
            Ok(self.result)
        } else {
            Err(ExamError::upstream(self.status, self.error))
        }
    }
}

/// One saved annotation as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedAnnotation {
    pub name: String,
    /// Vertex string, see [`crate::geometry::serialize_vertices`]
    pub vertex: String,
}

/// Everything submitted for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedImage {
    pub id: u64,
    pub body_part: String,
    pub annotations: Vec<SubmittedAnnotation>,
}

/// Request body of the submit call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub annotations: Vec<SubmittedImage>,
}

impl SubmitRequest {
    /// Flatten every image result of a session into the submit body.
    pub fn from_session(session: &SessionState) -> Self {
        let annotations = session
            .images()
            .iter()
            .zip(session.results())
            .map(|(image, result)| SubmittedImage {
                id: image.id,
                body_part: result.body_part.clone(),
                annotations: result
                    .annotations
                    .iter()
                    .map(|ann| SubmittedAnnotation {
                        name: ann.name.clone(),
                        vertex: ann.vertex_string(),
                    })
                    .collect(),
            })
            .collect();
        Self { annotations }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ExamError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Response of the submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: i32,
}

impl SubmitResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Build the absolute URL of an image from its server path.
pub fn image_url(base: &str, image_path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        image_path.trim_start_matches('/')
    )
}
