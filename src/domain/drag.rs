//! Ephemeral state of an in-progress drag gesture.
//!
//! Pointer movement only updates the hover highlight held here. The board is
//! touched once, when `finish` hands back the drop to commit.

/// State of the drag gesture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        active_id: String,
        hover_id: Option<String>,
    },
}

/// A completed drop that should be committed to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub active_id: String,
    pub over_id: String,
}

#[derive(Debug, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Id of the item currently being dragged
    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { active_id, .. } => Some(active_id.as_str()),
            DragState::Idle => None,
        }
    }

    /// Id of the target currently under the pointer
    pub fn hover_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { hover_id, .. } => hover_id.as_deref(),
            DragState::Idle => None,
        }
    }

    /// Picks up an item. A gesture already in flight is abandoned.
    pub fn start(&mut self, active_id: impl Into<String>) {
        let active_id = active_id.into();
        if let Some(previous) = self.active_id() {
            tracing::debug!(previous, next = %active_id, "drag restarted before drop");
        }
        self.state = DragState::Dragging {
            active_id,
            hover_id: None,
        };
    }

    /// Records the target under the pointer. Ignored while idle.
    pub fn hover(&mut self, over_id: Option<&str>) {
        if let DragState::Dragging { hover_id, .. } = &mut self.state {
            *hover_id = over_id.map(str::to_string);
        }
    }

    /// Ends the gesture and returns the drop to commit, if the pointer was
    /// released over a target.
    pub fn finish(&mut self, over_id: Option<&str>) -> Option<DropTarget> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging { active_id, .. } => over_id.map(|over_id| DropTarget {
                active_id,
                over_id: over_id.to_string(),
            }),
            DragState::Idle => None,
        }
    }

    /// Abandons the gesture without producing a drop
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}
