//! Undo/Redo for session edits.
//!
//! Session states are persistent values that share unchanged images and
//! results, so a snapshot is cheap. Each undoable edit pushes the state it
//! replaced together with a description of the edit.

use crate::session::SessionState;

// ============================================================================
// Entries
// ============================================================================

/// The kind of edit a snapshot reverses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Body part entered
    SetBodyPart(String),
    /// Annotation saved
    AddAnnotation(String),
    /// Annotation deleted
    DeleteAnnotation(String),
}

impl Edit {
    /// Get a human-readable description of this edit
    pub fn description(&self) -> String {
        match self {
            Edit::SetBodyPart(part) => format!("Set body part '{}'", part),
            Edit::AddAnnotation(name) => format!("Add annotation '{}'", name),
            Edit::DeleteAnnotation(name) => format!("Delete annotation '{}'", name),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    edit: Edit,
    state: SessionState,
}

// ============================================================================
// History Stack
// ============================================================================

/// The undo/redo history.
///
/// When an edit is recorded the redo stack is cleared. Undo swaps the current
/// state for the most recent snapshot and keeps the current one for redo.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Entry>,
    redo_stack: Vec<Entry>,
    max_history: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    /// Record that `edit` replaced `previous`.
    pub fn record(&mut self, edit: Edit, previous: SessionState) {
        log::debug!("Undo: pushed '{}'", edit.description());
        self.undo_stack.push(Entry {
            edit,
            state: previous,
        });
        self.redo_stack.clear();

        // Limit history size
        if self.undo_stack.len() > self.max_history {
            let excess = self.undo_stack.len() - self.max_history;
            self.undo_stack.drain(..excess);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Step back: returns the state to restore.
    pub fn undo(&mut self, current: SessionState) -> Option<SessionState> {
        let entry = self.undo_stack.pop()?;
        log::debug!("Undo: '{}'", entry.edit.description());
        self.redo_stack.push(Entry {
            edit: entry.edit,
            state: current,
        });
        Some(entry.state)
    }

    /// Step forward again: returns the state to restore.
    pub fn redo(&mut self, current: SessionState) -> Option<SessionState> {
        let entry = self.redo_stack.pop()?;
        log::debug!("Redo: '{}'", entry.edit.description());
        self.undo_stack.push(Entry {
            edit: entry.edit,
            state: current,
        });
        Some(entry.state)
    }

    /// Description of the edit that would be undone
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(|e| e.edit.description())
    }

    /// Description of the edit that would be redone
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(|e| e.edit.description())
    }

    /// Clear all history
    pub fn clear(&mut self) {
        if self.can_undo() || self.can_redo() {
            log::debug!("Undo history cleared");
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawImage;

    fn session() -> SessionState {
        SessionState::init_from_fetch(
            &[RawImage {
                id: 1,
                image_path: "a.png".to_string(),
            }],
            "/static",
        )
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut history = History::default();
        let before = session();
        let after = before.set_body_part("chest").unwrap();
        history.record(Edit::SetBodyPart("chest".into()), before);

        assert!(history.can_undo());
        assert_eq!(history.undo_description().as_deref(), Some("Set body part 'chest'"));

        let restored = history.undo(after).unwrap();
        assert_eq!(restored.results()[0].body_part, "");
        assert!(history.can_redo());

        let redone = history.redo(restored).unwrap();
        assert_eq!(redone.results()[0].body_part, "chest");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::default();
        history.record(Edit::SetBodyPart("a".into()), session());
        let restored = history.undo(session()).unwrap();
        assert!(history.can_redo());
        history.record(Edit::AddAnnotation("rib".into()), restored);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_limit() {
        let mut history = History::new(2);
        for name in ["a", "b", "c"] {
            history.record(Edit::AddAnnotation(name.into()), session());
        }
        assert_eq!(history.undo_description().as_deref(), Some("Add annotation 'c'"));
        assert!(history.undo(session()).is_some());
        assert!(history.undo(session()).is_some());
        assert!(history.undo(session()).is_none());
    }

    #[test]
    fn test_empty_history() {
        let mut history = History::default();
        assert!(history.undo(session()).is_none());
        assert!(history.redo(session()).is_none());
        history.clear();
        assert!(!history.can_undo());
    }
}
