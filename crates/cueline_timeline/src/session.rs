// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing session: one sequence, its interaction state, the transport and
//! the ticker, wired together.
//!
//! The sequence and the interaction engine live behind a single lock so the
//! ticker never observes a half-applied drag.

use crate::error::TimelineError;
use crate::interaction::{DeleteOutcome, Hover, InteractionEngine};
use crate::line::SequenceLine;
use crate::playback::{PlaybackTicker, TickDriver, TickOutcome, TickerConfig, Transport};
use crate::sequence::TriggerSequence;
use crate::template::{TemplateId, TemplateRegistry};
use crate::trigger::TriggerId;
use egui::{Modifiers, Pos2};
use parking_lot::Mutex;
use std::sync::Arc;

/// State shared between the UI thread and the ticker
#[derive(Debug)]
pub struct Timeline {
    /// Edited sequence
    pub sequence: TriggerSequence,
    /// Pointer interaction state
    pub interaction: InteractionEngine,
}

impl Timeline {
    /// Bundle a sequence with an interaction engine
    pub fn new(sequence: TriggerSequence, interaction: InteractionEngine) -> Self {
        Self { sequence, interaction }
    }
}

/// Application context for one open sequence
pub struct TimelineSession {
    timeline: Arc<Mutex<Timeline>>,
    transport: Arc<dyn Transport>,
    registry: TemplateRegistry,
    driver: TickDriver,
    ticker: Option<PlaybackTicker>,
}

impl TimelineSession {
    /// Create a session; the ticker is not started
    pub fn new(timeline: Timeline, registry: TemplateRegistry, transport: Arc<dyn Transport>) -> Self {
        let timeline = Arc::new(Mutex::new(timeline));
        let driver = TickDriver::new(Arc::clone(&timeline), Arc::clone(&transport));
        Self {
            timeline,
            transport,
            registry,
            driver,
            ticker: None,
        }
    }

    /// Shared timeline, for painting
    pub fn timeline(&self) -> &Arc<Mutex<Timeline>> {
        &self.timeline
    }

    /// Run `f` with the timeline locked
    pub fn with_timeline<R>(&self, f: impl FnOnce(&mut Timeline) -> R) -> R {
        f(&mut self.timeline.lock())
    }

    /// Registered templates
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Mutable template registry
    pub fn registry_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.registry
    }

    /// Play-head source
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Start the background ticker if it is not running
    pub fn start_ticker(&mut self, config: TickerConfig) -> std::io::Result<()> {
        if self.ticker.as_ref().is_some_and(PlaybackTicker::is_running) {
            return Ok(());
        }
        let driver = TickDriver::new(Arc::clone(&self.timeline), Arc::clone(&self.transport));
        self.ticker = Some(PlaybackTicker::spawn(config, driver)?);
        tracing::info!("Ticker running every {} ms", config.period.as_millis());
        Ok(())
    }

    /// Stop the background ticker
    pub fn stop_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    /// Step playback on the calling thread
    pub fn tick(&mut self) -> TickOutcome {
        self.driver.step()
    }

    /// Start playback
    pub fn play(&self) {
        self.transport.play();
        tracing::info!("Playback started at {:.3}s", self.transport.position());
    }

    /// Pause playback, switching off active triggers
    pub fn pause(&self) {
        self.transport.pause();
        let time = self.transport.position();
        self.timeline.lock().sequence.release_all(time);
        tracing::info!("Playback paused at {time:.3}s");
    }

    /// Toggle between playing and paused
    pub fn toggle_playback(&self) {
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the play-head, switching off active triggers
    pub fn seek(&self, time: f64) {
        self.transport.seek(time);
        let time = self.transport.position();
        self.timeline.lock().sequence.release_all(time);
        tracing::debug!("Seeked to {time:.3}s");
    }

    /// Pointer moved over the timeline
    pub fn pointer_moved(&self, pos: Pos2) -> Option<Hover> {
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        interaction.pointer_moved(sequence, pos)
    }

    /// Pointer left the timeline
    pub fn pointer_left(&self) {
        self.timeline.lock().interaction.pointer_left();
    }

    /// Drag started
    pub fn drag_started(&self, pos: Pos2, modifiers: Modifiers) {
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        interaction.drag_started(sequence, pos, modifiers);
    }

    /// Drag moved
    pub fn dragged(&self, pos: Pos2) -> Result<(), TimelineError> {
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        interaction.dragged(sequence, pos)
    }

    /// Drag released
    pub fn drag_stopped(&self, pos: Pos2, modifiers: Modifiers) -> Result<(), TimelineError> {
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        interaction.drag_stopped(sequence, pos, modifiers)
    }

    /// Drag cancelled (escape, focus loss)
    pub fn cancel_drag(&self) {
        self.timeline.lock().interaction.cancel_drag();
    }

    /// Delete the selection; more than one trigger needs `confirmed`
    pub fn delete_selected(&self, confirmed: bool) -> DeleteOutcome {
        let now = self.transport.position();
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        interaction.delete_selected(sequence, confirmed, Some(now))
    }

    /// Remove a line, switching off its playing trigger and dropping its
    /// triggers from the selection
    pub fn remove_line(&self, index: usize) -> Result<SequenceLine, TimelineError> {
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        let removed = sequence.remove_line(index)?;
        interaction.forget_missing(sequence);
        Ok(removed)
    }

    /// Place a trigger of a registered template at `pos`
    pub fn place_trigger(&self, template: &TemplateId, pos: Pos2) -> Result<Option<TriggerId>, TimelineError> {
        let template = self
            .registry
            .get(template)
            .cloned()
            .ok_or_else(|| TimelineError::UnknownTemplate(template.clone()))?;
        let mut guard = self.timeline.lock();
        let Timeline { sequence, interaction } = &mut *guard;
        interaction.place_trigger(sequence, template, pos)
    }

    /// Insert a keyframe into a trigger's curve
    pub fn insert_keyframe(&self, trigger: TriggerId, index: usize) -> Result<(), TimelineError> {
        let mut timeline = self.timeline.lock();
        let trigger = timeline
            .sequence
            .trigger_mut(trigger)
            .ok_or(TimelineError::UnknownTrigger(trigger))?;
        if let Some(curve) = trigger.keyframes_mut() {
            curve.insert_at(index)?;
        }
        Ok(())
    }

    /// Remove an interior keyframe from a trigger's curve
    pub fn remove_keyframe(&self, trigger: TriggerId, index: usize) -> Result<(), TimelineError> {
        let mut timeline = self.timeline.lock();
        let trigger = timeline
            .sequence
            .trigger_mut(trigger)
            .ok_or(TimelineError::UnknownTrigger(trigger))?;
        if let Some(curve) = trigger.keyframes_mut() {
            curve.remove_at(index)?;
        }
        Ok(())
    }
}

impl Drop for TimelineSession {
    fn drop(&mut self) {
        self.stop_ticker();
        self.timeline.lock().sequence.release_all(self.transport.position());
    }
}
