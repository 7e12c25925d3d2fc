//! Outside work requested by the exam controller.

use serde::Serialize;

use crate::api::SubmitRequest;
use crate::error::ExamError;

/// Identifies one fetch or submit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestTicket(pub u64);

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    /// Rejected input, shown inline next to the control
    Warning,
    Error,
}

/// A message for the host's notification area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
            description: None,
        }
    }
}

impl From<&ExamError> for Notification {
    fn from(err: &ExamError) -> Self {
        match err {
            ExamError::Upstream { .. } | ExamError::Transport(_) => Self {
                kind: NotificationKind::Error,
                message: "Server did not complete the request".to_string(),
                description: Some(err.to_string()),
            },
            ExamError::Validation(validation) => Self {
                kind: NotificationKind::Warning,
                message: validation.to_string(),
                description: None,
            },
            ExamError::Invariant(_) | ExamError::Json(_) => Self {
                kind: NotificationKind::Error,
                message: "Something went wrong".to_string(),
                description: Some(err.to_string()),
            },
        }
    }
}

/// Work for the host to carry out, feeding the outcome back to the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Effect {
    /// Fetch the image list; answer with `on_fetch_response`
    FetchImages { ticket: RequestTicket, exam_id: u64 },
    /// Load an image asset; answer with `on_image_loaded` or `on_image_failed`
    LoadImage { generation: u64, url: String },
    /// Send the results; answer with `on_submit_response`
    Submit {
        ticket: RequestTicket,
        payload: SubmitRequest,
    },
    /// Show a notification
    Notify(Notification),
    /// Leave the exam page
    NavigateAway,
}
