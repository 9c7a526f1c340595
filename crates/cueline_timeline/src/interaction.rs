// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer interaction: hover, drag-to-move, edge resizing, cross-line
//! relocation, box selection and keyframe dragging.
//!
//! The engine only keeps UI state (selection, hover, current drag). All
//! timing changes go through [`SequenceLine::set_trigger_span`] and
//! [`TriggerSequence::relocate`], so the non-overlap invariant holds after
//! every pointer event.

use crate::error::TimelineError;
use crate::line::SequenceLine;
use crate::selection::Selection;
use crate::sequence::{LineMove, TriggerSequence};
use crate::template::TriggerTemplate;
use crate::trigger::{PlacedTrigger, TriggerId, DEFAULT_TRIGGER_DURATION, MINIMUM_TRIGGER_DURATION};
use crate::view::{TimelineView, EDGE_GRAB_INSIDE, EDGE_GRAB_OUTSIDE, KEYFRAME_HANDLE_RADIUS};
use egui::{Modifiers, Pos2};
use std::collections::HashSet;
use std::sync::Arc;

/// Region of a trigger under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerPart {
    /// Left edge: resizes the start
    Start,
    /// Body: moves the trigger
    Middle,
    /// Right edge: resizes the end
    End,
}

/// Hovered trigger and the part under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hover {
    /// Hovered trigger
    pub trigger: TriggerId,
    /// Line holding it
    pub line: usize,
    /// Part under the pointer
    pub part: TriggerPart,
}

/// Drag operation state
#[derive(Debug, Clone, PartialEq)]
pub enum DragOperation {
    /// Not dragging
    None,
    /// Box selection
    BoxSelect,
    /// Moving or resizing the selected triggers
    Triggers {
        /// Part grabbed on the captain
        part: TriggerPart,
        /// Trigger under the pointer when the drag started
        captain: TriggerId,
        /// Anchor time (start, or end when resizing the end) minus the
        /// pointer time at drag start, sorted by start time
        offsets: Vec<(TriggerId, f64)>,
    },
    /// Dragging one keyframe handle
    Keyframe {
        /// Trigger owning the curve
        trigger: TriggerId,
        /// Keyframe index
        index: usize,
    },
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing was selected
    Nothing,
    /// More than one trigger selected; ask before deleting
    NeedsConfirmation(usize),
    /// Number of triggers deleted
    Deleted(usize),
}

/// Whether modifiers extend the selection instead of replacing it
pub fn is_additive(modifiers: Modifiers) -> bool {
    modifiers.shift || modifiers.command
}

/// Part of `trigger` under screen x, if within grabbing distance.
///
/// Inside the trigger the edges grab within [`EDGE_GRAB_INSIDE`] pixels
/// (the start wins when both are in reach); outside, within
/// [`EDGE_GRAB_OUTSIDE`] pixels.
pub fn part_at(view: &TimelineView, trigger: &PlacedTrigger, x: f32) -> Option<TriggerPart> {
    let start_x = view.time_to_x(trigger.start_time());
    let end_x = view.time_to_x(trigger.end_time());

    if x >= start_x && x < end_x {
        let to_start = x - start_x;
        let to_end = end_x - x;
        if to_start <= EDGE_GRAB_INSIDE && to_start <= to_end {
            Some(TriggerPart::Start)
        } else if to_end <= EDGE_GRAB_INSIDE {
            Some(TriggerPart::End)
        } else {
            Some(TriggerPart::Middle)
        }
    } else if x < start_x {
        (start_x - x <= EDGE_GRAB_OUTSIDE).then_some(TriggerPart::Start)
    } else {
        (x - end_x <= EDGE_GRAB_OUTSIDE).then_some(TriggerPart::End)
    }
}

/// Pointer-driven editing of a [`TriggerSequence`]
#[derive(Debug, Clone)]
pub struct InteractionEngine {
    /// Screen mapping
    pub view: TimelineView,
    selection: Selection,
    hover: Option<Hover>,
    drag: DragOperation,
}

impl InteractionEngine {
    /// Create an idle engine
    pub fn new(view: TimelineView) -> Self {
        Self {
            view,
            selection: Selection::new(),
            hover: None,
            drag: DragOperation::None,
        }
    }

    /// Current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Mutable selection (click selection from outside the engine)
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// Hovered trigger
    pub fn hover(&self) -> Option<Hover> {
        self.hover
    }

    /// Current drag operation
    pub fn drag_operation(&self) -> &DragOperation {
        &self.drag
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.drag != DragOperation::None
    }

    /// Trigger and part under `pos`
    pub fn hit_test(&self, sequence: &TriggerSequence, pos: Pos2) -> Option<Hover> {
        let line_index = usize::try_from(self.view.line_at_y(pos.y)).ok()?;
        let line = sequence.line(line_index)?;
        let trigger = line.closest_trigger_to(self.view.x_to_time(pos.x))?;
        let part = part_at(&self.view, trigger, pos.x)?;
        Some(Hover {
            trigger: trigger.id(),
            line: line_index,
            part,
        })
    }

    /// Keyframe handle under `pos`
    pub fn keyframe_at(&self, sequence: &TriggerSequence, pos: Pos2) -> Option<(TriggerId, usize)> {
        let line_index = usize::try_from(self.view.line_at_y(pos.y)).ok()?;
        let trigger = sequence
            .line(line_index)?
            .closest_trigger_to(self.view.x_to_time(pos.x))?;
        let curve = trigger.keyframes()?;

        curve
            .keyframes()
            .iter()
            .position(|keyframe| {
                let time = keyframe.time(trigger.start_time(), trigger.duration());
                let handle = self.view.keyframe_pos(line_index, time, keyframe.value);
                handle.distance(pos) <= KEYFRAME_HANDLE_RADIUS
            })
            .map(|index| (trigger.id(), index))
    }

    /// Update hover; ignored while dragging
    pub fn pointer_moved(&mut self, sequence: &TriggerSequence, pos: Pos2) -> Option<Hover> {
        if !self.is_dragging() {
            self.hover = self.hit_test(sequence, pos);
        }
        self.hover
    }

    /// Pointer left the timeline area
    pub fn pointer_left(&mut self) {
        self.hover = None;
    }

    /// Start a drag at `pos`.
    ///
    /// A keyframe handle takes priority, then a trigger part; anywhere else a
    /// box selection starts. Grabbing an unselected trigger selects it,
    /// replacing the selection unless the modifiers are additive.
    pub fn drag_started(&mut self, sequence: &TriggerSequence, pos: Pos2, modifiers: Modifiers) {
        let additive = is_additive(modifiers);

        if let Some((trigger, index)) = self.keyframe_at(sequence, pos) {
            tracing::debug!("Dragging keyframe {index} of {trigger:?}");
            self.drag = DragOperation::Keyframe { trigger, index };
            return;
        }

        let Some(hit) = self.hit_test(sequence, pos) else {
            self.selection.begin_selection(pos, additive);
            self.drag = DragOperation::BoxSelect;
            return;
        };

        if !self.selection.is_selected(hit.trigger) {
            if !additive {
                self.selection.clear();
            }
            self.selection.add(hit.trigger);
        }

        let pointer_time = self.view.x_to_time(pos.x);
        let mut anchors: Vec<(f64, TriggerId, f64)> = self
            .selection
            .selected()
            .iter()
            .filter_map(|&id| sequence.trigger(id))
            .map(|trigger| {
                let anchor = match hit.part {
                    TriggerPart::End => trigger.end_time(),
                    TriggerPart::Start | TriggerPart::Middle => trigger.start_time(),
                };
                (trigger.start_time(), trigger.id(), anchor - pointer_time)
            })
            .collect();
        anchors.sort_by(|a, b| a.0.total_cmp(&b.0));

        tracing::debug!("Dragging {:?} of {} triggers", hit.part, anchors.len());
        self.hover = Some(hit);
        self.drag = DragOperation::Triggers {
            part: hit.part,
            captain: hit.trigger,
            offsets: anchors.into_iter().map(|(_, id, offset)| (id, offset)).collect(),
        };
    }

    /// Apply a pointer position to the current drag
    pub fn dragged(&mut self, sequence: &mut TriggerSequence, pos: Pos2) -> Result<(), TimelineError> {
        match &self.drag {
            DragOperation::None => Ok(()),
            DragOperation::BoxSelect => {
                self.selection.update_selection(pos, sequence, &self.view);
                Ok(())
            }
            DragOperation::Triggers { part, captain, offsets } => {
                if *part == TriggerPart::Middle {
                    if let Err(err) = relocate_group(sequence, &self.view, pos, *captain, offsets) {
                        self.selection.prune(sequence);
                        return Err(err);
                    }
                }
                move_group(sequence, *part, *captain, self.view.x_to_time(pos.x), offsets)
            }
            DragOperation::Keyframe { trigger, index } => {
                drag_keyframe(sequence, &self.view, *trigger, *index, pos)
            }
        }
    }

    /// Finish the drag: apply the final position once more, then go idle
    pub fn drag_stopped(
        &mut self,
        sequence: &mut TriggerSequence,
        pos: Pos2,
        modifiers: Modifiers,
    ) -> Result<(), TimelineError> {
        let result = self.dragged(sequence, pos);
        if self.drag == DragOperation::BoxSelect {
            self.selection.end_selection(is_additive(modifiers));
        }
        self.drag = DragOperation::None;
        self.hover = self.hit_test(sequence, pos);
        result
    }

    /// Abandon the drag, keeping whatever it already applied
    pub fn cancel_drag(&mut self) {
        if self.drag == DragOperation::BoxSelect {
            self.selection.cancel_selection();
        }
        self.drag = DragOperation::None;
    }

    /// Delete the selected triggers.
    ///
    /// Deleting more than one trigger needs `confirmed`. Active triggers are
    /// switched off at `now` first when a play-head time is given.
    pub fn delete_selected(
        &mut self,
        sequence: &mut TriggerSequence,
        confirmed: bool,
        now: Option<f64>,
    ) -> DeleteOutcome {
        let count = self.selection.len();
        if count == 0 {
            return DeleteOutcome::Nothing;
        }
        if count > 1 && !confirmed {
            return DeleteOutcome::NeedsConfirmation(count);
        }

        self.cancel_drag();
        let ids: Vec<TriggerId> = self.selection.selected().iter().copied().collect();
        let mut deleted = 0;
        for id in ids {
            let Some(line_index) = sequence.line_index_of(id) else {
                continue;
            };
            if let (Some(time), Some(line)) = (now, sequence.line_mut(line_index)) {
                line.release_trigger(id, time);
            }
            if sequence.remove_trigger(id).is_some() {
                deleted += 1;
            }
        }

        self.selection.clear();
        self.forget_missing(sequence);
        tracing::info!("Deleted {deleted} triggers");
        DeleteOutcome::Deleted(deleted)
    }

    /// Drop selection and hover entries for triggers that left `sequence`
    /// or changed line
    pub fn forget_missing(&mut self, sequence: &TriggerSequence) {
        self.selection.prune(sequence);
        self.hover = self
            .hover
            .filter(|hover| sequence.line_index_of(hover.trigger) == Some(hover.line));
    }

    /// Place a new trigger at `pos`.
    ///
    /// The trigger gets the default duration, shortened to the free space
    /// after the pointer. Returns `None` when the pointer is on a trigger,
    /// off the lines, or the free space is below the minimum duration.
    pub fn place_trigger(
        &mut self,
        sequence: &mut TriggerSequence,
        template: Arc<dyn TriggerTemplate>,
        pos: Pos2,
    ) -> Result<Option<TriggerId>, TimelineError> {
        let Ok(line_index) = usize::try_from(self.view.line_at_y(pos.y)) else {
            return Ok(None);
        };
        let Some(line) = sequence.line(line_index) else {
            return Ok(None);
        };

        let time = self.view.x_to_time(pos.x).max(0.0);
        let room = line.free_duration_from(time, false);
        if room < MINIMUM_TRIGGER_DURATION {
            tracing::debug!("No room for a trigger at {time:.3}s on line {line_index}");
            return Ok(None);
        }

        let trigger = PlacedTrigger::from_template(template, time, DEFAULT_TRIGGER_DURATION.min(room));
        let id = sequence.add_trigger(line_index, trigger)?;
        self.selection.select_only(id);
        Ok(Some(id))
    }
}

impl Default for InteractionEngine {
    fn default() -> Self {
        Self::new(TimelineView::default())
    }
}

/// Move the dragged group to the pointer's line, backing off towards the
/// current line until every member fits
fn relocate_group(
    sequence: &mut TriggerSequence,
    view: &TimelineView,
    pos: Pos2,
    captain: TriggerId,
    offsets: &[(TriggerId, f64)],
) -> Result<(), TimelineError> {
    let Some(current) = sequence.line_index_of(captain) else {
        return Ok(());
    };
    let mut delta = view.line_at_y(pos.y) - current as isize;
    if delta == 0 {
        return Ok(());
    }

    let group: HashSet<TriggerId> = offsets.iter().map(|(id, _)| *id).collect();
    while delta != 0 {
        if let Some(moves) = plan_relocation(sequence, &group, delta) {
            sequence.relocate(&moves)?;
            tracing::debug!("Relocated {} triggers by {delta} lines", moves.len());
            return Ok(());
        }
        delta -= delta.signum();
    }
    Ok(())
}

/// Line moves shifting every group member by `delta`, if all destinations
/// exist and are free apart from the group itself
fn plan_relocation(sequence: &TriggerSequence, group: &HashSet<TriggerId>, delta: isize) -> Option<Vec<LineMove>> {
    group
        .iter()
        .map(|&id| {
            let from = sequence.line_index_of(id)?;
            let to = from.checked_add_signed(delta)?;
            let trigger = sequence.trigger(id)?;
            sequence
                .line(to)?
                .is_period_free(trigger.start_time(), trigger.end_time(), group)
                .then_some(LineMove { trigger: id, from, to })
        })
        .collect()
}

/// Apply the pointer time to every trigger in the group.
///
/// Triggers are processed front to back in the direction of travel so a
/// member never blocks one that is about to make room.
fn move_group(
    sequence: &mut TriggerSequence,
    part: TriggerPart,
    captain: TriggerId,
    pointer_time: f64,
    offsets: &[(TriggerId, f64)],
) -> Result<(), TimelineError> {
    let rightward = offsets
        .iter()
        .find(|(id, _)| *id == captain)
        .and_then(|(id, offset)| {
            let trigger = sequence.trigger(*id)?;
            let anchor = match part {
                TriggerPart::End => trigger.end_time(),
                TriggerPart::Start | TriggerPart::Middle => trigger.start_time(),
            };
            Some(pointer_time + offset > anchor)
        })
        .unwrap_or(false);

    let mut order: Vec<&(TriggerId, f64)> = offsets.iter().collect();
    if rightward {
        order.reverse();
    }

    for &&(id, offset) in &order {
        let Some(line_index) = sequence.line_index_of(id) else {
            continue;
        };
        let Some(line) = sequence.line_mut(line_index) else {
            continue;
        };
        if let Some((start, duration)) = target_span(line, id, part, pointer_time + offset) {
            line.set_trigger_span(id, start, duration)?;
        }
    }
    Ok(())
}

/// New `(start, duration)` for one trigger, or `None` if unchanged.
///
/// Start resizing is bounded by the previous trigger and the minimum
/// duration, end resizing by the next trigger (or the sequence end) and the
/// minimum duration. Moving is bounded by the free space on the side it
/// moves towards.
fn target_span(line: &SequenceLine, id: TriggerId, part: TriggerPart, desired: f64) -> Option<(f64, f64)> {
    let trigger = line.trigger(id)?;
    let start = trigger.start_time();
    let end = trigger.end_time();
    let duration = trigger.duration();

    let span = match part {
        TriggerPart::Start => {
            let earliest = start - line.free_duration_until(start, true);
            let latest = end - MINIMUM_TRIGGER_DURATION;
            let new_start = desired.max(earliest).min(latest);
            (new_start, end - new_start)
        }
        TriggerPart::End => {
            let latest = end + line.free_duration_from(end, false);
            let new_end = desired.min(latest).max(start + MINIMUM_TRIGGER_DURATION);
            (start, new_end - start)
        }
        TriggerPart::Middle => {
            let new_start = if desired > start {
                let room = line.free_duration_from(end, false);
                if desired - start <= room { desired } else { start + room }
            } else {
                let room = line.free_duration_until(start, true);
                if start - desired <= room { desired } else { start - room }
            };
            (new_start, duration)
        }
    };

    (span != (start, duration)).then_some(span)
}

fn drag_keyframe(
    sequence: &mut TriggerSequence,
    view: &TimelineView,
    id: TriggerId,
    index: usize,
    pos: Pos2,
) -> Result<(), TimelineError> {
    let line_index = sequence.line_index_of(id).ok_or(TimelineError::UnknownTrigger(id))?;
    let trigger = sequence.trigger_mut(id).ok_or(TimelineError::UnknownTrigger(id))?;
    let position = (view.x_to_time(pos.x) - trigger.start_time()) / trigger.duration();
    let value = view.value_at_y(line_index, pos.y);
    if let Some(curve) = trigger.keyframes_mut() {
        curve.drag_to(index, position, value)?;
    }
    Ok(())
}
