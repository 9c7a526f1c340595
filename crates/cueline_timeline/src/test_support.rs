// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recording template shared by unit tests.

use crate::playback::Transport;
use crate::template::{TemplateId, TriggerBehavior, TriggerEvent, TriggerKind, TriggerTemplate};
use crate::trigger::{PlacedTrigger, TriggerId};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Recorded {
    On { trigger: TriggerId, time: f64 },
    Update { trigger: TriggerId, time: f64 },
    Off { trigger: TriggerId, time: f64 },
}

#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: Mutex<Vec<(Recorded, Option<f64>)>>,
}

impl EventLog {
    pub(crate) fn events(&self) -> Vec<Recorded> {
        self.events.lock().iter().map(|(e, _)| *e).collect()
    }

    pub(crate) fn intensities(&self) -> Vec<Option<f64>> {
        self.events.lock().iter().map(|(_, i)| *i).collect()
    }

    fn push(&self, event: Recorded, intensity: Option<f64>) {
        self.events.lock().push((event, intensity));
    }
}

#[derive(Debug)]
pub(crate) struct RecordingTemplate {
    id: TemplateId,
    kind: TriggerKind,
    log: Arc<EventLog>,
}

impl TriggerTemplate for RecordingTemplate {
    fn id(&self) -> &TemplateId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id.0
    }

    fn kind(&self) -> TriggerKind {
        self.kind
    }

    fn create_behavior(&self) -> Box<dyn TriggerBehavior> {
        Box::new(RecordingBehavior { log: Arc::clone(&self.log) })
    }
}

struct RecordingBehavior {
    log: Arc<EventLog>,
}

impl TriggerBehavior for RecordingBehavior {
    fn on(&mut self, event: &TriggerEvent<'_>) {
        self.log.push(Recorded::On { trigger: event.trigger, time: event.time }, event.intensity);
    }

    fn update(&mut self, event: &TriggerEvent<'_>) {
        self.log.push(Recorded::Update { trigger: event.trigger, time: event.time }, event.intensity);
    }

    fn off(&mut self, event: &TriggerEvent<'_>) {
        self.log.push(Recorded::Off { trigger: event.trigger, time: event.time }, event.intensity);
    }
}

pub(crate) fn recording_template(id: &str, kind: TriggerKind) -> (Arc<dyn TriggerTemplate>, Arc<EventLog>) {
    let log = Arc::new(EventLog::default());
    let template = Arc::new(RecordingTemplate {
        id: TemplateId::new(id),
        kind,
        log: Arc::clone(&log),
    });
    (template, log)
}

/// Build a pulse trigger spanning `[start, end)`
pub(crate) fn trigger(template: &Arc<dyn TriggerTemplate>, start: f64, end: f64) -> PlacedTrigger {
    PlacedTrigger::from_template(Arc::clone(template), start, end - start)
}

/// Transport moved by hand
#[derive(Debug, Default)]
pub(crate) struct ManualTransport {
    state: Mutex<(f64, bool)>,
}

impl ManualTransport {
    pub(crate) fn set(&self, time: f64, playing: bool) {
        *self.state.lock() = (time, playing);
    }
}

impl Transport for ManualTransport {
    fn position(&self) -> f64 {
        self.state.lock().0
    }

    fn is_playing(&self) -> bool {
        self.state.lock().1
    }

    fn play(&self) {
        self.state.lock().1 = true;
    }

    fn pause(&self) {
        self.state.lock().1 = false;
    }

    fn seek(&self, time: f64) {
        self.state.lock().0 = time;
    }
}
