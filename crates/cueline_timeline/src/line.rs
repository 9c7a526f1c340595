// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequence lines: ordered, non-overlapping trigger stores.
//!
//! Triggers on a line are kept sorted by start time with
//! `triggers[i].end_time() <= triggers[i + 1].start_time()`. Every lookup is a
//! binary search over that order, using a comparator that reports a trigger
//! as equal to a time it contains.

use crate::error::TimelineError;
use crate::trigger::{PlacedTrigger, TriggerId, MINIMUM_TRIGGER_DURATION};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Tolerance used when checking durations against the minimum
const DURATION_EPSILON: f64 = 1e-9;

/// One track of non-overlapping triggers
#[derive(Debug)]
pub struct SequenceLine {
    name: String,
    triggers: Vec<PlacedTrigger>,
    /// End of the owning sequence, bounding free space after the last trigger
    end_time: f64,
    /// Trigger considered on during playback
    active: Option<TriggerId>,
    /// Index found by the previous tick, valid until the next structural change
    cursor: Option<usize>,
    /// Time of the previous tick
    last_tick: Option<f64>,
}

impl SequenceLine {
    /// Create an empty line bounded by `end_time`
    pub fn new(name: impl Into<String>, end_time: f64) -> Self {
        Self {
            name: name.into(),
            triggers: Vec::new(),
            end_time,
            active: None,
            cursor: None,
            last_tick: None,
        }
    }

    /// Line name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the line
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// End of the owning sequence
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub(crate) fn set_end_time(&mut self, end_time: f64) {
        self.end_time = end_time;
    }

    /// Get all triggers, sorted by start time
    pub fn triggers(&self) -> &[PlacedTrigger] {
        &self.triggers
    }

    /// Get trigger count
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Whether the line holds no trigger
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Trigger currently considered on by playback
    pub fn active_trigger(&self) -> Option<TriggerId> {
        self.active
    }

    /// Time of the previous tick, if playback has reached this line since
    /// the last release
    pub fn last_tick(&self) -> Option<f64> {
        self.last_tick
    }

    /// Index of a trigger by identity
    pub fn position_of(&self, id: TriggerId) -> Option<usize> {
        self.triggers.iter().position(|t| t.id() == id)
    }

    /// Get a trigger by ID
    pub fn trigger(&self, id: TriggerId) -> Option<&PlacedTrigger> {
        self.triggers.iter().find(|t| t.id() == id)
    }

    /// Get a mutable trigger by ID.
    ///
    /// Timing can't be changed through this reference; use
    /// [`SequenceLine::set_trigger_span`].
    pub fn trigger_mut(&mut self, id: TriggerId) -> Option<&mut PlacedTrigger> {
        self.triggers.iter_mut().find(|t| t.id() == id)
    }

    /// Binary search for `time`.
    ///
    /// Returns `Ok(index)` of the trigger containing `time`, or
    /// `Err(insertion_index)`: the index of the first trigger starting after
    /// `time`.
    pub fn index_at(&self, time: f64) -> Result<usize, usize> {
        if time.is_nan() {
            return Err(self.triggers.len());
        }
        self.triggers.binary_search_by(|t| {
            if t.end_time() <= time {
                Ordering::Less
            } else if t.start_time() > time {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
    }

    /// Trigger containing `time` (`start <= time < end`)
    pub fn trigger_at(&self, time: f64) -> Option<&PlacedTrigger> {
        self.index_at(time).ok().map(|i| &self.triggers[i])
    }

    /// Trigger containing `time`, or else the first one starting after it
    pub fn trigger_at_or_after(&self, time: f64) -> Option<&PlacedTrigger> {
        match self.index_at(time) {
            Ok(i) | Err(i) => self.triggers.get(i),
        }
    }

    /// Trigger containing `time`, or else the nearer of its two neighbours.
    ///
    /// Ties go to the trigger after `time`.
    pub fn closest_trigger_to(&self, time: f64) -> Option<&PlacedTrigger> {
        match self.index_at(time) {
            Ok(i) => Some(&self.triggers[i]),
            Err(i) => {
                let prev = i.checked_sub(1).map(|j| &self.triggers[j]);
                let next = self.triggers.get(i);
                match (prev, next) {
                    (Some(prev), Some(next)) => {
                        if time - prev.end_time() < next.start_time() - time {
                            Some(prev)
                        } else {
                            Some(next)
                        }
                    }
                    (Some(t), None) | (None, Some(t)) => Some(t),
                    (None, None) => None,
                }
            }
        }
    }

    /// Free time from `time` up to the next trigger.
    ///
    /// Without a following trigger the gap runs to the end of the sequence,
    /// or is unbounded when `allow_past_end` is set. Returns `0` when `time`
    /// lies inside a trigger.
    pub fn free_duration_from(&self, time: f64, allow_past_end: bool) -> f64 {
        match self.index_at(time) {
            Ok(_) => 0.0,
            Err(i) => match self.triggers.get(i) {
                Some(next) => next.start_time() - time,
                None if allow_past_end => f64::INFINITY,
                None => (self.end_time - time).max(0.0),
            },
        }
    }

    /// Free time from the previous trigger's end (or zero) up to `time`.
    ///
    /// With `allow_start_at_time`, a trigger starting exactly at `time` is
    /// treated as absent, which is what resizing that trigger's start needs.
    pub fn free_duration_until(&self, time: f64, allow_start_at_time: bool) -> f64 {
        let before = match self.index_at(time) {
            Ok(i) if allow_start_at_time && self.triggers[i].start_time() == time => i,
            Ok(_) => return 0.0,
            Err(i) => i,
        };

        match before.checked_sub(1) {
            Some(prev) => (time - self.triggers[prev].end_time()).max(0.0),
            None => time.max(0.0),
        }
    }

    /// Triggers from the first one at or after `from` whose start is before
    /// `to` (or at `to` unless `exclude_to_time`)
    pub fn triggers_in_period(&self, from: f64, to: f64, exclude_to_time: bool) -> impl Iterator<Item = &PlacedTrigger> + '_ {
        let first = match self.index_at(from) {
            Ok(i) | Err(i) => i,
        };
        self.triggers[first..].iter().take_while(move |t| {
            if exclude_to_time {
                t.start_time() < to
            } else {
                t.start_time() <= to
            }
        })
    }

    /// Whether no trigger outside `ignoring` intersects `[from, to)`
    pub fn is_period_free(&self, from: f64, to: f64, ignoring: &HashSet<TriggerId>) -> bool {
        self.triggers_in_period(from, to, true)
            .all(|t| ignoring.contains(&t.id()))
    }

    /// Insert a trigger at its sorted position.
    ///
    /// Fails with [`TimelineError::Overlap`] if a trigger already occupies the
    /// start time or the new trigger would run into the following one.
    pub fn add_trigger(&mut self, trigger: PlacedTrigger) -> Result<TriggerId, TimelineError> {
        self.try_add_trigger(trigger).map_err(|(err, _)| err)
    }

    /// Like [`SequenceLine::add_trigger`], handing the trigger back on failure
    pub(crate) fn try_add_trigger(&mut self, trigger: PlacedTrigger) -> Result<TriggerId, (TimelineError, PlacedTrigger)> {
        if trigger.duration() < MINIMUM_TRIGGER_DURATION - DURATION_EPSILON {
            let err = TimelineError::DurationTooShort { duration: trigger.duration() };
            return Err((err, trigger));
        }

        let overlap = TimelineError::Overlap {
            start: trigger.start_time(),
            end: trigger.end_time(),
        };
        let index = match self.index_at(trigger.start_time()) {
            Ok(_) => return Err((overlap, trigger)),
            Err(i) => i,
        };
        if self.triggers.get(index).is_some_and(|next| trigger.end_time() > next.start_time()) {
            return Err((overlap, trigger));
        }

        let id = trigger.id();
        self.triggers.insert(index, trigger);
        self.cursor = None;
        Ok(id)
    }

    /// Remove a trigger by identity, clearing the active reference if it
    /// pointed at it
    pub fn remove_trigger(&mut self, id: TriggerId) -> Option<PlacedTrigger> {
        let index = self.position_of(id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        self.cursor = None;
        Some(self.triggers.remove(index))
    }

    /// Change a trigger's start and duration in place.
    ///
    /// The new span must respect the minimum duration and stay between the
    /// trigger's current neighbours.
    pub fn set_trigger_span(&mut self, id: TriggerId, start_time: f64, duration: f64) -> Result<(), TimelineError> {
        let index = self.position_of(id).ok_or(TimelineError::UnknownTrigger(id))?;
        if duration < MINIMUM_TRIGGER_DURATION - DURATION_EPSILON {
            return Err(TimelineError::DurationTooShort { duration });
        }

        let prev_end = index.checked_sub(1).map_or(0.0, |i| self.triggers[i].end_time());
        let next_start = self.triggers.get(index + 1).map_or(f64::INFINITY, PlacedTrigger::start_time);

        // Spans computed from free durations can miss a neighbour by rounding
        let start_time = if start_time < prev_end && prev_end - start_time <= DURATION_EPSILON {
            prev_end
        } else {
            start_time
        };
        let mut end_time = start_time + duration;
        if end_time > next_start && end_time - next_start <= DURATION_EPSILON {
            end_time = next_start;
        }
        if start_time < prev_end || end_time > next_start {
            return Err(TimelineError::Overlap { start: start_time, end: end_time });
        }

        let mut duration = (end_time - start_time)
            .max(MINIMUM_TRIGGER_DURATION)
            .min(next_start - start_time);
        // start + duration may still round one ulp past the next start
        while start_time + duration > next_start {
            duration = f64::from_bits(duration.to_bits() - 1);
        }
        self.triggers[index].set_span(start_time, duration);
        self.cursor = None;
        Ok(())
    }

    /// Advance playback to `time`, firing on/update/off callbacks
    pub fn tick(&mut self, time: f64) {
        let found = self.locate_for_tick(time);
        let target = found.ok();
        let target_id = target.map(|i| self.triggers[i].id());

        if target_id == self.active {
            if let Some(i) = target {
                self.triggers[i].update(time);
            }
        } else {
            if let Some(previous) = self.active.and_then(|id| self.position_of(id)) {
                self.triggers[previous].off(time);
            }
            if let Some(i) = target {
                self.triggers[i].on(time);
            }
            self.active = target_id;
        }

        self.cursor = Some(match found {
            Ok(i) | Err(i) => i,
        });
        self.last_tick = Some(time);
    }

    /// Lookup for sequential playback.
    ///
    /// While time moves forward the previously found trigger and its
    /// successor are checked before searching; any backward step forces a
    /// full search.
    fn locate_for_tick(&self, time: f64) -> Result<usize, usize> {
        let forward = self.last_tick.is_some_and(|last| time >= last);
        if let (true, Some(cursor)) = (forward, self.cursor) {
            for candidate in [cursor, cursor + 1] {
                if self.triggers.get(candidate).is_some_and(|t| t.contains(time)) {
                    return Ok(candidate);
                }
            }
        }
        self.index_at(time)
    }

    /// Switch off the active trigger, if any, and forget the playback position
    pub fn release(&mut self, time: f64) {
        if let Some(index) = self.active.and_then(|id| self.position_of(id)) {
            self.triggers[index].off(time);
        }
        self.active = None;
        self.cursor = None;
        self.last_tick = None;
    }

    /// Switch off one trigger if it is the active one
    pub fn release_trigger(&mut self, id: TriggerId, time: f64) -> bool {
        if self.active != Some(id) {
            return false;
        }
        if let Some(index) = self.position_of(id) {
            self.triggers[index].off(time);
        }
        self.active = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{TriggerKind, TriggerTemplate};
    use crate::test_support::{recording_template, trigger, Recorded};
    use std::sync::Arc;

    fn line_with(template: &Arc<dyn TriggerTemplate>, spans: &[(f64, f64)]) -> SequenceLine {
        let mut line = SequenceLine::new("Line", 20.0);
        for &(start, end) in spans {
            line.add_trigger(trigger(template, start, end)).unwrap();
        }
        line
    }

    fn assert_non_overlapping(line: &SequenceLine) {
        for pair in line.triggers().windows(2) {
            assert!(pair[0].end_time() <= pair[1].start_time());
        }
    }

    /// Small deterministic generator for sweep tests
    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    #[test]
    fn test_scenario_free_duration_and_overlap() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(0.0, 2.0), (5.0, 7.0)]);

        assert_eq!(line.free_duration_from(2.0, false), 3.0);
        assert!(matches!(
            line.add_trigger(trigger(&template, 1.0, 3.0)),
            Err(TimelineError::Overlap { .. })
        ));
        assert!(line.add_trigger(trigger(&template, 2.0, 5.0)).is_ok());
        assert_eq!(line.len(), 3);
        assert_non_overlapping(&line);
    }

    #[test]
    fn test_add_rejects_running_into_next() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(5.0, 7.0)]);
        assert!(line.add_trigger(trigger(&template, 4.0, 5.5)).is_err());
        assert!(line.add_trigger(trigger(&template, 6.0, 6.5)).is_err());
        assert!(line.add_trigger(trigger(&template, 4.0, 5.0)).is_ok());
        assert!(line.add_trigger(trigger(&template, 7.0, 9.0)).is_ok());
        assert_non_overlapping(&line);
    }

    #[test]
    fn test_trigger_at_matches_linear_scan() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut rng = Lcg(42);

        for _ in 0..20 {
            let mut line = SequenceLine::new("Line", 100.0);
            let mut cursor = 0.0;
            while cursor < 90.0 {
                let gap = rng.next_f64() * 3.0;
                let length = MINIMUM_TRIGGER_DURATION + rng.next_f64() * 4.0;
                let start = cursor + gap;
                line.add_trigger(trigger(&template, start, start + length)).unwrap();
                cursor = start + length;
            }

            for step in 0..2000 {
                let time = step as f64 * 0.05 - 1.0;
                let expected = line.triggers().iter().find(|t| t.contains(time)).map(PlacedTrigger::id);
                assert_eq!(line.trigger_at(time).map(PlacedTrigger::id), expected, "time {time}");
            }
        }
    }

    #[test]
    fn test_at_or_after_and_closest() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let line = line_with(&template, &[(0.0, 2.0), (5.0, 7.0)]);
        let a = line.triggers()[0].id();
        let b = line.triggers()[1].id();

        assert_eq!(line.trigger_at_or_after(1.0).map(PlacedTrigger::id), Some(a));
        assert_eq!(line.trigger_at_or_after(3.0).map(PlacedTrigger::id), Some(b));
        assert!(line.trigger_at_or_after(7.0).is_none());

        assert_eq!(line.closest_trigger_to(2.5).map(PlacedTrigger::id), Some(a));
        assert_eq!(line.closest_trigger_to(4.0).map(PlacedTrigger::id), Some(b));
        // Equidistant: the trigger after wins
        assert_eq!(line.closest_trigger_to(3.5).map(PlacedTrigger::id), Some(b));
        assert_eq!(line.closest_trigger_to(50.0).map(PlacedTrigger::id), Some(b));
        assert!(SequenceLine::new("empty", 10.0).closest_trigger_to(1.0).is_none());
    }

    #[test]
    fn test_free_duration_queries() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let line = line_with(&template, &[(1.0, 2.0), (5.0, 7.0)]);

        assert_eq!(line.free_duration_from(1.5, false), 0.0);
        assert_eq!(line.free_duration_from(8.0, false), 12.0);
        assert_eq!(line.free_duration_from(8.0, true), f64::INFINITY);
        assert_eq!(line.free_duration_from(25.0, false), 0.0);

        assert_eq!(line.free_duration_until(4.0, false), 2.0);
        assert_eq!(line.free_duration_until(0.5, false), 0.5);
        assert_eq!(line.free_duration_until(6.0, false), 0.0);
        assert_eq!(line.free_duration_until(5.0, false), 0.0);
        assert_eq!(line.free_duration_until(5.0, true), 3.0);
        assert_eq!(line.free_duration_until(1.0, true), 1.0);
    }

    #[test]
    fn test_triggers_in_period_and_free_period() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let line = line_with(&template, &[(0.0, 2.0), (3.0, 4.0), (6.0, 8.0)]);
        let ids: Vec<_> = line.triggers().iter().map(PlacedTrigger::id).collect();

        let found: Vec<_> = line.triggers_in_period(1.0, 6.0, false).map(PlacedTrigger::id).collect();
        assert_eq!(found, ids);
        let found: Vec<_> = line.triggers_in_period(1.0, 6.0, true).map(PlacedTrigger::id).collect();
        assert_eq!(found, ids[..2]);
        let found: Vec<_> = line.triggers_in_period(2.0, 2.9, false).collect();
        assert!(found.is_empty());

        let mut ignoring = HashSet::new();
        assert!(line.is_period_free(4.0, 6.0, &ignoring));
        assert!(!line.is_period_free(3.5, 6.0, &ignoring));
        ignoring.insert(ids[1]);
        assert!(line.is_period_free(2.0, 6.0, &ignoring));
        assert!(!line.is_period_free(2.0, 6.5, &ignoring));
    }

    #[test]
    fn test_remove_clears_active() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(0.0, 2.0)]);
        let id = line.triggers()[0].id();

        line.tick(0.5);
        assert_eq!(line.active_trigger(), Some(id));

        let removed = line.remove_trigger(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(line.active_trigger().is_none());
        assert!(line.remove_trigger(id).is_none());

        line.tick(1.0);
        assert_eq!(log.events(), vec![Recorded::On { trigger: id, time: 0.5 }]);
    }

    #[test]
    fn test_tick_state_machine() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(0.0, 1.0), (1.0, 2.0), (3.0, 4.0)]);
        let ids: Vec<_> = line.triggers().iter().map(PlacedTrigger::id).collect();

        for time in [0.2, 0.6, 1.0, 1.5, 2.5, 3.2] {
            line.tick(time);
        }

        assert_eq!(
            log.events(),
            vec![
                Recorded::On { trigger: ids[0], time: 0.2 },
                Recorded::Update { trigger: ids[0], time: 0.6 },
                Recorded::Off { trigger: ids[0], time: 1.0 },
                Recorded::On { trigger: ids[1], time: 1.0 },
                Recorded::Update { trigger: ids[1], time: 1.5 },
                Recorded::Off { trigger: ids[1], time: 2.5 },
                Recorded::On { trigger: ids[2], time: 3.2 },
            ]
        );
    }

    #[test]
    fn test_tick_backward_jump_searches_again() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(0.0, 1.0), (5.0, 6.0)]);
        let ids: Vec<_> = line.triggers().iter().map(PlacedTrigger::id).collect();

        line.tick(5.5);
        line.tick(0.5);
        line.tick(0.7);

        assert_eq!(
            log.events(),
            vec![
                Recorded::On { trigger: ids[1], time: 5.5 },
                Recorded::Off { trigger: ids[1], time: 0.5 },
                Recorded::On { trigger: ids[0], time: 0.5 },
                Recorded::Update { trigger: ids[0], time: 0.7 },
            ]
        );
    }

    #[test]
    fn test_tick_fast_path_agrees_with_search() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut line = SequenceLine::new("Line", 60.0);
        let mut start = 0.0;
        while start < 50.0 {
            line.add_trigger(trigger(&template, start, start + 0.7)).unwrap();
            start += 1.0;
        }

        for step in 0..1200 {
            let time = step as f64 * 0.05;
            line.tick(time);
            assert_eq!(line.active_trigger(), line.trigger_at(time).map(PlacedTrigger::id));
        }
    }

    #[test]
    fn test_set_trigger_span_guards_neighbours() {
        let (template, _log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(0.0, 2.0), (5.0, 7.0)]);
        let a = line.triggers()[0].id();

        assert!(line.set_trigger_span(a, 0.0, 5.0).is_ok());
        assert!(matches!(line.set_trigger_span(a, 0.0, 5.5), Err(TimelineError::Overlap { .. })));
        assert!(matches!(
            line.set_trigger_span(a, 0.0, 0.01),
            Err(TimelineError::DurationTooShort { .. })
        ));
        assert_eq!(line.triggers()[0].end_time(), 5.0);
    }

    #[test]
    fn test_release_switches_off_active() {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut line = line_with(&template, &[(0.0, 2.0)]);
        let id = line.triggers()[0].id();

        line.tick(1.0);
        line.release(1.2);
        assert!(line.active_trigger().is_none());
        assert_eq!(log.events().last(), Some(&Recorded::Off { trigger: id, time: 1.2 }));
    }
}
