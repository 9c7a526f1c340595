// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger selection with rectangular box selection.
//!
//! Confirmed triggers are what operations (drag, delete) act on. While a box
//! is being dragged, the triggers inside it are tracked separately and only
//! count as *visually* selected until the box is released.

use crate::sequence::TriggerSequence;
use crate::trigger::{PlacedTrigger, TriggerId};
use crate::view::TimelineView;
use egui::{Pos2, Rect};
use std::collections::HashSet;

/// In-progress selection rectangle; corners are unordered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionBox {
    /// Where the drag started
    pub anchor: Pos2,
    /// Current pointer position
    pub corner: Pos2,
}

impl SelectionBox {
    /// Normalized rectangle
    pub fn rect(&self) -> Rect {
        Rect::from_two_pos(self.anchor, self.corner)
    }
}

/// Selection state
#[derive(Debug, Clone, Default)]
pub struct Selection {
    confirmed: HashSet<TriggerId>,
    boxed: HashSet<TriggerId>,
    selection_box: Option<SelectionBox>,
}

impl Selection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a trigger is selected for operations
    pub fn is_selected(&self, id: TriggerId) -> bool {
        self.confirmed.contains(&id)
    }

    /// Whether a trigger should be drawn as selected
    pub fn is_visually_selected(&self, id: TriggerId) -> bool {
        self.confirmed.contains(&id) || self.boxed.contains(&id)
    }

    /// Confirmed triggers
    pub fn selected(&self) -> &HashSet<TriggerId> {
        &self.confirmed
    }

    /// Number of confirmed triggers
    pub fn len(&self) -> usize {
        self.confirmed.len()
    }

    /// Whether nothing is confirmed
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty()
    }

    /// Add a trigger
    pub fn add(&mut self, id: TriggerId) {
        self.confirmed.insert(id);
    }

    /// Remove a trigger
    pub fn remove(&mut self, id: TriggerId) {
        self.confirmed.remove(&id);
        self.boxed.remove(&id);
    }

    /// Replace the selection with a single trigger
    pub fn select_only(&mut self, id: TriggerId) {
        self.confirmed.clear();
        self.confirmed.insert(id);
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.confirmed.clear();
    }

    /// Drop IDs of triggers that no longer exist
    pub fn prune(&mut self, sequence: &TriggerSequence) {
        self.confirmed.retain(|id| sequence.trigger(*id).is_some());
        self.boxed.retain(|id| sequence.trigger(*id).is_some());
    }

    /// Active selection box
    pub fn selection_box(&self) -> Option<&SelectionBox> {
        self.selection_box.as_ref()
    }

    /// Triggers inside the active box
    pub fn boxed(&self) -> &HashSet<TriggerId> {
        &self.boxed
    }

    /// Start a box selection at `pos`.
    ///
    /// The confirmed selection is cleared unless `additive`.
    pub fn begin_selection(&mut self, pos: Pos2, additive: bool) {
        if !additive {
            self.confirmed.clear();
        }
        self.boxed.clear();
        self.selection_box = Some(SelectionBox { anchor: pos, corner: pos });
    }

    /// Move the box corner and recompute which triggers it covers
    pub fn update_selection(&mut self, pos: Pos2, sequence: &TriggerSequence, view: &TimelineView) {
        let Some(selection_box) = self.selection_box.as_mut() else {
            return;
        };
        selection_box.corner = pos;
        let rect = selection_box.rect();

        self.boxed.clear();
        let from = view.x_to_time(rect.min.x);
        let to = view.x_to_time(rect.max.x);
        let first = view.line_at_y(rect.min.y).max(0) as usize;
        let last = view.line_at_y(rect.max.y);
        if last < 0 {
            return;
        }
        let last = (last as usize).min(sequence.line_count().saturating_sub(1));

        for line in sequence.lines().iter().take(last + 1).skip(first) {
            self.boxed
                .extend(line.triggers_in_period(from, to, false).map(PlacedTrigger::id));
        }
    }

    /// Finish the box selection.
    ///
    /// With `additive` held and every boxed trigger already confirmed, the box
    /// deselects them; otherwise the boxed triggers join the selection.
    pub fn end_selection(&mut self, additive: bool) {
        if self.selection_box.take().is_none() {
            return;
        }
        let boxed = std::mem::take(&mut self.boxed);
        if additive && boxed.is_subset(&self.confirmed) {
            self.confirmed.retain(|id| !boxed.contains(id));
        } else {
            self.confirmed.extend(boxed);
        }
    }

    /// Abandon the box without changing the confirmed selection
    pub fn cancel_selection(&mut self) {
        self.selection_box = None;
        self.boxed.clear();
    }
}
