//! Per-image exam step.

use serde::{Deserialize, Serialize};

/// The two steps every image goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Enter the body part shown in the image
    #[default]
    Label,
    /// Name structures and outline them on the image
    Draw,
}

impl Step {
    /// Get the display title for this step.
    pub fn title(&self) -> &'static str {
        match self {
            Step::Label => "Body part",
            Step::Draw => "Annotate",
        }
    }

    /// Get the instruction shown alongside this step.
    pub fn description(&self) -> &'static str {
        match self {
            Step::Label => "Enter the body part shown in the current image",
            Step::Draw => "Enter a structure name and outline it on the image",
        }
    }

    /// Zero-based position of this step in the step list.
    pub fn index(&self) -> usize {
        match self {
            Step::Label => 0,
            Step::Draw => 1,
        }
    }
}
