// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger templates and the on/update/off behaviours they create.
//!
//! A template is the shared, immutable definition many placed triggers refer
//! to. It decides what a trigger *does*; the engine only decides *when*.

use crate::config::{ConfigSchema, TriggerConfig};
use crate::error::TimelineError;
use crate::trigger::{PlacedTrigger, TriggerId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a template, stable across saves
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub String);

impl TemplateId {
    /// Create a template ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Class of trigger a template produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TriggerKind {
    /// Plain on/off trigger
    #[default]
    Pulse,
    /// Trigger carrying an intensity keyframe curve
    Intensity,
}

impl TriggerKind {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pulse => "Pulse",
            Self::Intensity => "Intensity",
        }
    }
}

/// Snapshot of a trigger handed to its behaviour
#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent<'a> {
    /// Trigger being driven
    pub trigger: TriggerId,
    /// Template of the trigger
    pub template: &'a TemplateId,
    /// Play-head time
    pub time: f64,
    /// Trigger start time
    pub start_time: f64,
    /// Trigger duration
    pub duration: f64,
    /// Progress through the trigger, in `[0, 1]`
    pub progress: f64,
    /// Curve value at `progress`, for intensity triggers
    pub intensity: Option<f64>,
    /// Configuration payload
    pub config: Option<&'a TriggerConfig>,
}

/// Trigger-type specific lifecycle callbacks
pub trait TriggerBehavior: Send {
    /// Called when playback enters the trigger
    fn on(&mut self, event: &TriggerEvent<'_>);

    /// Called on every tick while the trigger stays active
    fn update(&mut self, _event: &TriggerEvent<'_>) {}

    /// Called when playback leaves the trigger
    fn off(&mut self, event: &TriggerEvent<'_>);
}

/// Shared definition placed triggers are instantiated from
pub trait TriggerTemplate: Send + Sync + fmt::Debug {
    /// Template ID
    fn id(&self) -> &TemplateId;

    /// Display name
    fn name(&self) -> &str;

    /// Kind of trigger produced
    fn kind(&self) -> TriggerKind;

    /// Editable configuration fields, if the template has any
    fn config_schema(&self) -> Option<&ConfigSchema> {
        None
    }

    /// Create the behaviour of a new placed trigger
    fn create_behavior(&self) -> Box<dyn TriggerBehavior>;
}

/// Lookup of templates by ID
#[derive(Debug, Default, Clone)]
pub struct TemplateRegistry {
    templates: IndexMap<TemplateId, Arc<dyn TriggerTemplate>>,
}

impl TemplateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, returning the one it replaces
    pub fn register(&mut self, template: Arc<dyn TriggerTemplate>) -> Option<Arc<dyn TriggerTemplate>> {
        self.templates.insert(template.id().clone(), template)
    }

    /// Get a template
    pub fn get(&self, id: &TemplateId) -> Option<&Arc<dyn TriggerTemplate>> {
        self.templates.get(id)
    }

    /// Get all templates in registration order
    pub fn templates(&self) -> impl Iterator<Item = &Arc<dyn TriggerTemplate>> {
        self.templates.values()
    }

    /// Get template count
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no template is registered
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Instantiate a placed trigger from a registered template
    pub fn create_placed(&self, id: &TemplateId, start_time: f64, duration: f64) -> Result<PlacedTrigger, TimelineError> {
        let template = self
            .get(id)
            .ok_or_else(|| TimelineError::UnknownTemplate(id.clone()))?;
        Ok(PlacedTrigger::from_template(Arc::clone(template), start_time, duration))
    }
}

/// Template whose triggers report their lifecycle through `tracing`
#[derive(Debug, Clone)]
pub struct LoggingTemplate {
    id: TemplateId,
    name: String,
    kind: TriggerKind,
    schema: Option<ConfigSchema>,
}

impl LoggingTemplate {
    /// Create a logging template
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: TriggerKind) -> Self {
        Self {
            id: TemplateId::new(id),
            name: name.into(),
            kind,
            schema: None,
        }
    }

    /// Attach a configuration schema
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl TriggerTemplate for LoggingTemplate {
    fn id(&self) -> &TemplateId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TriggerKind {
        self.kind
    }

    fn config_schema(&self) -> Option<&ConfigSchema> {
        self.schema.as_ref()
    }

    fn create_behavior(&self) -> Box<dyn TriggerBehavior> {
        Box::new(LoggingBehavior { name: self.name.clone() })
    }
}

struct LoggingBehavior {
    name: String,
}

impl TriggerBehavior for LoggingBehavior {
    fn on(&mut self, event: &TriggerEvent<'_>) {
        tracing::info!(
            trigger = ?event.trigger,
            time = event.time,
            intensity = ?event.intensity,
            "{} on",
            self.name
        );
    }

    fn update(&mut self, event: &TriggerEvent<'_>) {
        tracing::trace!(
            trigger = ?event.trigger,
            progress = event.progress,
            intensity = ?event.intensity,
            "{} update",
            self.name
        );
    }

    fn off(&mut self, event: &TriggerEvent<'_>) {
        tracing::info!(trigger = ?event.trigger, time = event.time, "{} off", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;

    #[test]
    fn test_registry_creates_placed_triggers() {
        let mut registry = TemplateRegistry::new();
        registry.register(Arc::new(LoggingTemplate::new("strobe", "Strobe", TriggerKind::Pulse)));

        let trigger = registry.create_placed(&TemplateId::new("strobe"), 2.0, 1.5).unwrap();
        assert_eq!(trigger.start_time(), 2.0);
        assert_eq!(trigger.end_time(), 3.5);
        assert!(trigger.keyframes().is_none());

        let missing = registry.create_placed(&TemplateId::new("fog"), 0.0, 1.0);
        assert!(matches!(missing, Err(TimelineError::UnknownTemplate(_))));
    }

    #[test]
    fn test_intensity_template_attaches_curve_and_config() {
        let schema = ConfigSchema::new().with_field(FieldSpec::int("channel", "Channel", 1, 512, 7));
        let template = LoggingTemplate::new("dimmer", "Dimmer", TriggerKind::Intensity).with_schema(schema);
        let trigger = PlacedTrigger::from_template(Arc::new(template), 0.0, 2.0);

        assert_eq!(trigger.keyframes().map(|c| c.keyframe_count()), Some(2));
        assert_eq!(
            trigger.config().and_then(|c| c.get("channel")).and_then(|v| v.as_int()),
            Some(7)
        );
    }

    #[test]
    fn test_re_registering_replaces() {
        let mut registry = TemplateRegistry::new();
        assert!(registry
            .register(Arc::new(LoggingTemplate::new("a", "A", TriggerKind::Pulse)))
            .is_none());
        let replaced = registry.register(Arc::new(LoggingTemplate::new("a", "A2", TriggerKind::Pulse)));
        assert_eq!(replaced.map(|t| t.name().to_string()), Some("A".to_string()));
        assert_eq!(registry.len(), 1);
    }
}
