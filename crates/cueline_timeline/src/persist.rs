// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON persistence of trigger sequences.
//!
//! Records carry line names and, per trigger, the template reference, timing,
//! and the optional configuration payload and keyframe curve. Behaviours are
//! not stored; they are recreated from the template registry on load.

use crate::config::{ConfigError, TriggerConfig};
use crate::error::TimelineError;
use crate::keyframe::KeyframeCurve;
use crate::line::SequenceLine;
use crate::sequence::TriggerSequence;
use crate::template::{TemplateId, TemplateRegistry};
use crate::trigger::PlacedTrigger;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error when saving or loading a sequence
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or an invalid keyframe curve
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored triggers violate the line invariants or reference an unknown
    /// template
    #[error("Invalid sequence: {0}")]
    Timeline(#[from] TimelineError),

    /// Stored configuration does not match the template schema
    #[error("Invalid trigger configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Stored sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Sequence duration (seconds)
    pub duration: f64,
    /// Lines in display order
    #[serde(default)]
    pub lines: Vec<LineRecord>,
}

/// Stored line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    /// Line name
    pub name: String,
    /// Triggers sorted by start time
    #[serde(default)]
    pub triggers: Vec<TriggerRecord>,
}

/// Stored trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    /// Template reference
    pub template: TemplateId,
    /// Start time (seconds)
    pub start_time: f64,
    /// Duration (seconds)
    pub duration: f64,
    /// Configuration payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<TriggerConfig>,
    /// Intensity curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframes: Option<KeyframeCurve>,
}

impl TriggerRecord {
    fn from_trigger(trigger: &PlacedTrigger) -> Self {
        Self {
            template: trigger.template().id().clone(),
            start_time: trigger.start_time(),
            duration: trigger.duration(),
            config: trigger.config().cloned(),
            keyframes: trigger.keyframes().cloned(),
        }
    }

    fn instantiate(&self, registry: &TemplateRegistry) -> Result<PlacedTrigger, PersistError> {
        let mut trigger = registry.create_placed(&self.template, self.start_time, self.duration)?;

        if let Some(config) = &self.config {
            match trigger.template().config_schema() {
                Some(schema) => {
                    let mut config = config.clone();
                    schema.validate(&mut config)?;
                    trigger = trigger.with_config(config);
                }
                None => tracing::warn!("Template {} takes no configuration; payload dropped", self.template),
            }
        }

        if let Some(curve) = &self.keyframes {
            if trigger.keyframes().is_some() {
                trigger = trigger.with_keyframes(curve.clone());
            } else {
                tracing::warn!("Template {} is not an intensity template; keyframes dropped", self.template);
            }
        }

        Ok(trigger)
    }
}

impl SequenceRecord {
    /// Template IDs referenced by the record, in first-use order
    pub fn template_ids(&self) -> Vec<&TemplateId> {
        let mut ids: Vec<&TemplateId> = Vec::new();
        for trigger in self.lines.iter().flat_map(|line| &line.triggers) {
            if !ids.contains(&&trigger.template) {
                ids.push(&trigger.template);
            }
        }
        ids
    }
}

impl TriggerSequence {
    /// Snapshot the sequence as a serializable record
    pub fn to_record(&self) -> SequenceRecord {
        SequenceRecord {
            duration: self.duration(),
            lines: self
                .lines()
                .iter()
                .map(|line| LineRecord {
                    name: line.name().to_string(),
                    triggers: line.triggers().iter().map(TriggerRecord::from_trigger).collect(),
                })
                .collect(),
        }
    }

    /// Rebuild a sequence, resolving templates through `registry`.
    ///
    /// Triggers are added through the normal line checks, so overlapping
    /// records are rejected.
    pub fn from_record(record: &SequenceRecord, registry: &TemplateRegistry) -> Result<Self, PersistError> {
        let mut lines = Vec::with_capacity(record.lines.len());
        for line_record in &record.lines {
            let mut line = SequenceLine::new(line_record.name.clone(), record.duration);
            for trigger_record in &line_record.triggers {
                line.add_trigger(trigger_record.instantiate(registry)?)?;
            }
            lines.push(line);
        }
        Ok(Self::from_lines(record.duration, lines))
    }
}

/// Parse a sequence record from JSON text
pub fn parse_record(content: &str) -> Result<SequenceRecord, PersistError> {
    Ok(serde_json::from_str(content)?)
}

/// Read a sequence record without resolving templates
pub fn read_record(path: impl AsRef<Path>) -> Result<SequenceRecord, PersistError> {
    parse_record(&std::fs::read_to_string(path)?)
}

/// Save a sequence as pretty-printed JSON
pub fn save_json(sequence: &TriggerSequence, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(&sequence.to_record())?;
    std::fs::write(path, content)?;
    tracing::info!("Saved sequence ({} triggers) to {:?}", sequence.trigger_count(), path);
    Ok(())
}

/// Load a sequence saved by [`save_json`]
pub fn load_json(path: impl AsRef<Path>, registry: &TemplateRegistry) -> Result<TriggerSequence, PersistError> {
    let path = path.as_ref();
    let record = read_record(path)?;
    let sequence = TriggerSequence::from_record(&record, registry)?;
    tracing::info!(
        "Loaded sequence from {:?}: {} lines, {} triggers",
        path,
        sequence.line_count(),
        sequence.trigger_count()
    );
    Ok(sequence)
}
