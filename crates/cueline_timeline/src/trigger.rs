// SPDX-License-Identifier: MIT OR Apache-2.0
//! Placed triggers: timed events living on a sequence line.

use crate::config::{ConfigError, ConfigValue, TriggerConfig};
use crate::keyframe::KeyframeCurve;
use crate::template::{TriggerBehavior, TriggerEvent, TriggerKind, TriggerTemplate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Shortest duration a trigger may have (seconds)
pub const MINIMUM_TRIGGER_DURATION: f64 = 0.1;

/// Duration given to newly placed triggers (seconds)
pub const DEFAULT_TRIGGER_DURATION: f64 = 1.0;

/// Unique identifier for a placed trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub Uuid);

impl TriggerId {
    /// Create a new random trigger ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TriggerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    On,
    Update,
    Off,
}

/// A timed event placed on a line.
///
/// Start time and duration are only changed through the owning line or the
/// interaction engine, which keep the line's non-overlap invariant.
pub struct PlacedTrigger {
    id: TriggerId,
    start_time: f64,
    duration: f64,
    template: Arc<dyn TriggerTemplate>,
    config: Option<TriggerConfig>,
    keyframes: Option<KeyframeCurve>,
    behavior: Box<dyn TriggerBehavior>,
}

impl PlacedTrigger {
    /// Instantiate a trigger from its template.
    ///
    /// Negative start times are moved to zero and durations below
    /// [`MINIMUM_TRIGGER_DURATION`] are raised to it.
    pub fn from_template(template: Arc<dyn TriggerTemplate>, start_time: f64, duration: f64) -> Self {
        let config = template.config_schema().map(|schema| schema.defaults());
        let keyframes = (template.kind() == TriggerKind::Intensity).then(KeyframeCurve::default);
        let behavior = template.create_behavior();

        Self {
            id: TriggerId::new(),
            start_time: start_time.max(0.0),
            duration: duration.max(MINIMUM_TRIGGER_DURATION),
            template,
            config,
            keyframes,
            behavior,
        }
    }

    /// Replace the configuration payload
    pub fn with_config(mut self, config: TriggerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the keyframe curve
    pub fn with_keyframes(mut self, keyframes: KeyframeCurve) -> Self {
        self.keyframes = Some(keyframes);
        self
    }

    /// Trigger ID
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// Start time in seconds
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// End time in seconds (exclusive)
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Template this trigger was created from
    pub fn template(&self) -> &Arc<dyn TriggerTemplate> {
        &self.template
    }

    /// Configuration payload
    pub fn config(&self) -> Option<&TriggerConfig> {
        self.config.as_ref()
    }

    /// Set a configuration value through the template's schema
    pub fn set_config_value(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        let Some(schema) = self.template.config_schema() else {
            return Err(ConfigError::UnknownField(key.to_string()));
        };
        let config = self.config.get_or_insert_with(|| schema.defaults());
        schema.set(config, key, value)
    }

    /// Intensity curve, for intensity triggers
    pub fn keyframes(&self) -> Option<&KeyframeCurve> {
        self.keyframes.as_ref()
    }

    /// Mutable intensity curve
    pub fn keyframes_mut(&mut self) -> Option<&mut KeyframeCurve> {
        self.keyframes.as_mut()
    }

    /// Whether `time` falls inside `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time < self.end_time()
    }

    /// Whether the trigger intersects `[from, to)`
    pub fn overlaps(&self, from: f64, to: f64) -> bool {
        self.start_time < to && from < self.end_time()
    }

    pub(crate) fn set_span(&mut self, start_time: f64, duration: f64) {
        debug_assert!(duration >= MINIMUM_TRIGGER_DURATION - 1e-9);
        self.start_time = start_time;
        self.duration = duration;
    }

    /// Progress through the trigger at `time`, in `[0, 1]`
    pub fn progress_at(&self, time: f64) -> f64 {
        ((time - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    pub(crate) fn on(&mut self, time: f64) {
        self.fire(Phase::On, time);
    }

    pub(crate) fn update(&mut self, time: f64) {
        self.fire(Phase::Update, time);
    }

    pub(crate) fn off(&mut self, time: f64) {
        self.fire(Phase::Off, time);
    }

    fn fire(&mut self, phase: Phase, time: f64) {
        let progress = self.progress_at(time);
        let event = TriggerEvent {
            trigger: self.id,
            template: self.template.id(),
            time,
            start_time: self.start_time,
            duration: self.duration,
            progress,
            intensity: self.keyframes.as_ref().map(|curve| curve.value_at(progress)),
            config: self.config.as_ref(),
        };

        match phase {
            Phase::On => self.behavior.on(&event),
            Phase::Update => self.behavior.update(&event),
            Phase::Off => self.behavior.off(&event),
        }
    }
}

impl fmt::Debug for PlacedTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacedTrigger")
            .field("id", &self.id)
            .field("start_time", &self.start_time)
            .field("duration", &self.duration)
            .field("template", self.template.id())
            .field("config", &self.config)
            .field("keyframes", &self.keyframes)
            .finish_non_exhaustive()
    }
}
