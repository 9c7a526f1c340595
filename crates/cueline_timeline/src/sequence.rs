// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger sequence: the ordered list of lines played against one audio track.

use crate::error::TimelineError;
use crate::line::SequenceLine;
use crate::trigger::{PlacedTrigger, TriggerId};

/// A single trigger transfer between two lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMove {
    /// Trigger to move
    pub trigger: TriggerId,
    /// Current line index
    pub from: usize,
    /// Destination line index
    pub to: usize,
}

/// Ordered lines sharing one total duration.
///
/// Line order is the vertical display order and defines adjacency for
/// cross-line relocation. There is always at least one line.
#[derive(Debug)]
pub struct TriggerSequence {
    /// Sequence duration (normally the audio length)
    duration: f64,
    lines: Vec<SequenceLine>,
}

impl TriggerSequence {
    /// Create a sequence with a single empty line
    pub fn new(duration: f64) -> Self {
        let duration = duration.max(0.0);
        Self {
            duration,
            lines: vec![SequenceLine::new(default_line_name(0), duration)],
        }
    }

    /// Assemble a sequence from prepared lines; an empty list yields one
    /// empty line
    pub fn from_lines(duration: f64, lines: Vec<SequenceLine>) -> Self {
        let mut sequence = Self {
            duration: duration.max(0.0),
            lines,
        };
        if sequence.lines.is_empty() {
            sequence.lines.push(SequenceLine::new(default_line_name(0), sequence.duration));
        }
        sequence.set_duration(sequence.duration);
        sequence
    }

    /// Sequence duration
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Change the sequence duration.
    ///
    /// Triggers past the new end are kept; they only stop bounding free
    /// space queries.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        for line in &mut self.lines {
            line.set_end_time(self.duration);
        }
    }

    /// Get all lines
    pub fn lines(&self) -> &[SequenceLine] {
        &self.lines
    }

    /// Get line count
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Get a line
    pub fn line(&self, index: usize) -> Option<&SequenceLine> {
        self.lines.get(index)
    }

    /// Get a mutable line
    pub fn line_mut(&mut self, index: usize) -> Option<&mut SequenceLine> {
        self.lines.get_mut(index)
    }

    /// Append an empty line, returning its index
    pub fn add_line(&mut self, name: impl Into<String>) -> usize {
        self.lines.push(SequenceLine::new(name, self.duration));
        self.lines.len() - 1
    }

    /// Insert an empty line at `index`
    pub fn insert_line(&mut self, index: usize, name: impl Into<String>) -> Result<(), TimelineError> {
        if index > self.lines.len() {
            return Err(TimelineError::UnknownLine(index));
        }
        self.lines.insert(index, SequenceLine::new(name, self.duration));
        Ok(())
    }

    /// Remove a line with all its triggers.
    ///
    /// Its active trigger is switched off at the line's last tick time.
    /// Removing the last remaining line replaces it with a fresh empty one.
    pub fn remove_line(&mut self, index: usize) -> Result<SequenceLine, TimelineError> {
        if index >= self.lines.len() {
            return Err(TimelineError::UnknownLine(index));
        }
        let mut removed = self.lines.remove(index);
        if let Some(time) = removed.last_tick() {
            removed.release(time);
        }
        if self.lines.is_empty() {
            self.lines.push(SequenceLine::new(default_line_name(0), self.duration));
        }
        tracing::debug!("Removed line {} ({} triggers)", removed.name(), removed.len());
        Ok(removed)
    }

    /// Add a trigger to a line
    pub fn add_trigger(&mut self, line: usize, trigger: PlacedTrigger) -> Result<TriggerId, TimelineError> {
        self.lines
            .get_mut(line)
            .ok_or(TimelineError::UnknownLine(line))?
            .add_trigger(trigger)
    }

    /// Remove a trigger from whichever line holds it
    pub fn remove_trigger(&mut self, id: TriggerId) -> Option<PlacedTrigger> {
        let line = self.line_index_of(id)?;
        self.lines[line].remove_trigger(id)
    }

    /// Index of the line holding a trigger
    pub fn line_index_of(&self, id: TriggerId) -> Option<usize> {
        self.lines.iter().position(|line| line.trigger(id).is_some())
    }

    /// Get a trigger by ID
    pub fn trigger(&self, id: TriggerId) -> Option<&PlacedTrigger> {
        self.lines.iter().find_map(|line| line.trigger(id))
    }

    /// Get a mutable trigger by ID
    pub fn trigger_mut(&mut self, id: TriggerId) -> Option<&mut PlacedTrigger> {
        self.lines.iter_mut().find_map(|line| line.trigger_mut(id))
    }

    /// Total trigger count across lines
    pub fn trigger_count(&self) -> usize {
        self.lines.iter().map(SequenceLine::len).sum()
    }

    /// Advance every line to `time`, top to bottom
    pub fn tick(&mut self, time: f64) {
        for line in &mut self.lines {
            line.tick(time);
        }
    }

    /// Switch off every active trigger (stop, pause, seek)
    pub fn release_all(&mut self, time: f64) {
        for line in &mut self.lines {
            line.release(time);
        }
    }

    /// Transfer triggers between lines as one step.
    ///
    /// Every trigger is removed first and only then added to its destination,
    /// so siblings moving together never collide halfway. If any addition
    /// fails, every trigger is put back on its original line.
    ///
    /// A playing trigger is switched off at its line's last tick time before
    /// it leaves; the destination's next tick switches it on again if the
    /// play-head is still inside it.
    pub fn relocate(&mut self, moves: &[LineMove]) -> Result<(), TimelineError> {
        for m in moves {
            if m.to >= self.lines.len() {
                return Err(TimelineError::UnknownLine(m.to));
            }
            if self.lines.get(m.from).and_then(|line| line.trigger(m.trigger)).is_none() {
                return Err(TimelineError::UnknownTrigger(m.trigger));
            }
        }

        let mut removed = Vec::with_capacity(moves.len());
        for m in moves {
            let line = &mut self.lines[m.from];
            if let Some(time) = line.last_tick() {
                line.release_trigger(m.trigger, time);
            }
            if let Some(trigger) = line.remove_trigger(m.trigger) {
                removed.push((*m, trigger));
            }
        }

        let mut failure = None;
        let mut placed = Vec::with_capacity(removed.len());
        let mut pending = removed.into_iter();
        for (m, trigger) in pending.by_ref() {
            match self.lines[m.to].try_add_trigger(trigger) {
                Ok(_) => placed.push(m),
                Err((err, trigger)) => {
                    failure = Some((m, trigger, err));
                    break;
                }
            }
        }

        let Some((failed, trigger, err)) = failure else {
            return Ok(());
        };

        tracing::error!("Relocation of {:?} to line {} failed: {err}", failed.trigger, failed.to);
        let mut restore = vec![(failed, trigger)];
        restore.extend(pending);
        for m in placed {
            if let Some(trigger) = self.lines[m.to].remove_trigger(m.trigger) {
                restore.push((m, trigger));
            }
        }
        for (m, trigger) in restore {
            if let Err(restore_err) = self.lines[m.from].add_trigger(trigger) {
                tracing::error!("Could not restore {:?} to line {}: {restore_err}", m.trigger, m.from);
            }
        }
        Err(err)
    }
}

impl Default for TriggerSequence {
    fn default() -> Self {
        Self::new(60.0)
    }
}

/// Name given to lines created without one
pub fn default_line_name(index: usize) -> String {
    format!("Line {}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TriggerKind;
    use crate::test_support::{recording_template, trigger, Recorded};

    #[test]
    fn test_new_sequence_has_one_line() {
        let sequence = TriggerSequence::new(30.0);
        assert_eq!(sequence.line_count(), 1);
        assert_eq!(sequence.line(0).map(SequenceLine::end_time), Some(30.0));
    }

    #[test]
    fn test_removing_last_line_inserts_replacement() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(30.0);
        sequence.add_trigger(0, trigger(&template, 0.0, 1.0)).unwrap();

        let removed = sequence.remove_line(0).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(sequence.line_count(), 1);
        assert!(sequence.lines()[0].is_empty());
        assert!(matches!(sequence.remove_line(3), Err(TimelineError::UnknownLine(3))));
    }

    #[test]
    fn test_removed_line_switches_off_active() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(30.0);
        sequence.add_line("Second");
        let a = sequence.add_trigger(0, trigger(&template, 0.0, 2.0)).unwrap();

        sequence.tick(0.5);
        let removed = sequence.remove_line(0).unwrap();
        assert!(removed.active_trigger().is_none());
        assert_eq!(
            log.events(),
            vec![
                Recorded::On { trigger: a, time: 0.5 },
                Recorded::Off { trigger: a, time: 0.5 },
            ]
        );

        // An idle line goes without callbacks
        sequence.remove_line(0).unwrap();
        assert_eq!(log.events().len(), 2);
    }

    #[test]
    fn test_set_duration_propagates_to_lines() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        sequence.add_line("Second");
        sequence.add_trigger(1, trigger(&template, 0.0, 2.0)).unwrap();

        sequence.set_duration(4.0);
        assert_eq!(sequence.line(1).map(|l| l.free_duration_from(2.0, false)), Some(2.0));
        assert_eq!(sequence.line(0).map(SequenceLine::end_time), Some(4.0));
    }

    #[test]
    fn test_tick_drives_all_lines() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        sequence.add_line("Second");
        let a = sequence.add_trigger(0, trigger(&template, 0.0, 1.0)).unwrap();
        let b = sequence.add_trigger(1, trigger(&template, 0.5, 2.0)).unwrap();

        sequence.tick(0.6);
        sequence.release_all(0.7);

        assert_eq!(
            log.events(),
            vec![
                Recorded::On { trigger: a, time: 0.6 },
                Recorded::On { trigger: b, time: 0.6 },
                Recorded::Off { trigger: a, time: 0.7 },
                Recorded::Off { trigger: b, time: 0.7 },
            ]
        );
    }

    #[test]
    fn test_relocate_swaps_lines_atomically() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        sequence.add_line("Second");
        let a = sequence.add_trigger(0, trigger(&template, 0.0, 2.0)).unwrap();
        let b = sequence.add_trigger(1, trigger(&template, 1.0, 3.0)).unwrap();

        // Each destination is occupied by the other trigger until it leaves
        sequence
            .relocate(&[
                LineMove { trigger: a, from: 0, to: 1 },
                LineMove { trigger: b, from: 1, to: 0 },
            ])
            .unwrap();

        assert_eq!(sequence.line_index_of(a), Some(1));
        assert_eq!(sequence.line_index_of(b), Some(0));
        assert_eq!(sequence.trigger(a).map(PlacedTrigger::start_time), Some(0.0));
        assert_eq!(sequence.trigger(b).map(PlacedTrigger::end_time), Some(3.0));
    }

    #[test]
    fn test_relocate_switches_off_playing_trigger() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        sequence.add_line("Second");
        let a = sequence.add_trigger(0, trigger(&template, 0.0, 2.0)).unwrap();

        sequence.tick(1.0);
        sequence.relocate(&[LineMove { trigger: a, from: 0, to: 1 }]).unwrap();
        assert!(sequence.line(0).and_then(SequenceLine::active_trigger).is_none());
        sequence.tick(1.1);
        sequence.release_all(1.2);

        assert_eq!(
            log.events(),
            vec![
                Recorded::On { trigger: a, time: 1.0 },
                Recorded::Off { trigger: a, time: 1.0 },
                Recorded::On { trigger: a, time: 1.1 },
                Recorded::Off { trigger: a, time: 1.2 },
            ]
        );
    }

    #[test]
    fn test_relocate_rejects_unknown_targets() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        let a = sequence.add_trigger(0, trigger(&template, 0.0, 2.0)).unwrap();

        let result = sequence.relocate(&[LineMove { trigger: a, from: 0, to: 4 }]);
        assert!(matches!(result, Err(TimelineError::UnknownLine(4))));
        assert_eq!(sequence.line_index_of(a), Some(0));
    }

    #[test]
    fn test_relocate_restores_on_collision() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        sequence.add_line("Second");
        let a = sequence.add_trigger(0, trigger(&template, 0.0, 2.0)).unwrap();
        let b = sequence.add_trigger(0, trigger(&template, 5.0, 6.0)).unwrap();
        sequence.add_trigger(1, trigger(&template, 5.5, 7.0)).unwrap();

        let result = sequence.relocate(&[
            LineMove { trigger: a, from: 0, to: 1 },
            LineMove { trigger: b, from: 0, to: 1 },
        ]);

        assert!(matches!(result, Err(TimelineError::Overlap { .. })));
        assert_eq!(sequence.line_index_of(a), Some(0));
        assert_eq!(sequence.line_index_of(b), Some(0));
        assert_eq!(sequence.line(1).map(SequenceLine::len), Some(1));
    }
}
