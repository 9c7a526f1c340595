// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player configuration, stored as RON.

use crate::error::PlayerError;
use cueline_timeline::persist::SequenceRecord;
use cueline_timeline::{ConfigSchema, FieldSpec, LoggingTemplate, TemplateRegistry, TickerConfig, TriggerKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "player.ron";

/// Log directives used unless `RUST_LOG` is set
pub const DEFAULT_LOG_FILTER: &str = "cueline_timeline=info,cueline_player=info";

/// Template declared in the player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Template ID referenced by sequence files
    pub id: String,
    /// Display name, used in log lines
    pub name: String,
    /// Trigger kind
    #[serde(default)]
    pub kind: TriggerKind,
    /// Configuration fields
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl TemplateConfig {
    fn to_template(&self) -> LoggingTemplate {
        let template = LoggingTemplate::new(self.id.clone(), self.name.clone(), self.kind);
        if self.fields.is_empty() {
            return template;
        }
        let schema = self
            .fields
            .iter()
            .cloned()
            .fold(ConfigSchema::new(), ConfigSchema::with_field);
        template.with_schema(schema)
    }
}

/// Headless player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Sequence file (JSON)
    pub sequence: PathBuf,
    /// Ticker period in milliseconds
    pub tick_period_ms: u64,
    /// `tracing` filter directives
    pub log_filter: String,
    /// Play-head start (seconds)
    pub start_time: f64,
    /// Playback rate
    pub speed: f64,
    /// Templates to register before loading
    pub templates: Vec<TemplateConfig>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sequence: PathBuf::from("sequence.json"),
            tick_period_ms: 50,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            start_time: 0.0,
            speed: 1.0,
            templates: Vec::new(),
        }
    }
}

impl PlayerConfig {
    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self, PlayerError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load from a RON file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, PlayerError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse RON text
    pub fn parse(content: &str) -> Result<Self, PlayerError> {
        Ok(ron::from_str(content)?)
    }

    /// Ticker settings; a zero period is raised to one millisecond
    pub fn ticker(&self) -> TickerConfig {
        TickerConfig {
            period: Duration::from_millis(self.tick_period_ms.max(1)),
        }
    }

    /// Build the template registry for a sequence.
    ///
    /// Configured templates are registered first; any other template the
    /// sequence references gets a logging template, intensity when one of its
    /// triggers carries keyframes.
    pub fn registry_for(&self, record: &SequenceRecord) -> TemplateRegistry {
        let mut registry = TemplateRegistry::new();
        for template in &self.templates {
            registry.register(Arc::new(template.to_template()));
        }

        for id in record.template_ids() {
            if registry.get(id).is_some() {
                continue;
            }
            let has_keyframes = record
                .lines
                .iter()
                .flat_map(|line| &line.triggers)
                .any(|trigger| &trigger.template == id && trigger.keyframes.is_some());
            let kind = if has_keyframes { TriggerKind::Intensity } else { TriggerKind::Pulse };
            tracing::info!("Using logging {} template for {id}", kind.name());
            registry.register(Arc::new(LoggingTemplate::new(id.0.clone(), id.0.clone(), kind)));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cueline_timeline::persist::parse_record;
    use cueline_timeline::{ConfigValue, TemplateId, TriggerSequence};

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = PlayerConfig::parse(r#"(sequence: "show.json", speed: 2.0)"#).unwrap();
        assert_eq!(config.sequence, PathBuf::from("show.json"));
        assert_eq!(config.speed, 2.0);
        assert_eq!(config.tick_period_ms, 50);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.ticker().period, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_ron_rejected() {
        assert!(matches!(PlayerConfig::parse("(speed: \"fast\")"), Err(PlayerError::Config(_))));
    }

    #[test]
    fn test_registry_covers_sequence_templates() {
        let config = PlayerConfig::parse(
            r#"(
                templates: [
                    (id: "dim", name: "Dimmer", kind: Intensity, fields: [
                        (key: "channel", label: "Channel", kind: Int(min: 1, max: 512), default: Int(1)),
                    ]),
                ],
            )"#,
        )
        .unwrap();

        let record = parse_record(
            r#"{ "duration": 10.0, "lines": [{ "name": "A", "triggers": [
                { "template": "dim", "start_time": 0.0, "duration": 1.0, "config": { "channel": { "Int": 7 } } },
                { "template": "strobe", "start_time": 2.0, "duration": 1.0 },
                { "template": "fade", "start_time": 4.0, "duration": 1.0,
                  "keyframes": [{ "position": 0.0, "value": 0.0 }, { "position": 1.0, "value": 1.0 }] }
            ]}]}"#,
        )
        .unwrap();

        let registry = config.registry_for(&record);
        assert_eq!(registry.len(), 3);
        let kind = |id: &str| registry.get(&TemplateId::new(id)).map(|t| t.kind());
        assert_eq!(kind("dim"), Some(TriggerKind::Intensity));
        assert_eq!(kind("strobe"), Some(TriggerKind::Pulse));
        assert_eq!(kind("fade"), Some(TriggerKind::Intensity));

        let sequence = TriggerSequence::from_record(&record, &registry).unwrap();
        let dim = &sequence.lines()[0].triggers()[0];
        assert_eq!(dim.config().and_then(|c| c.get("channel")), Some(&ConfigValue::Int(7)));
    }
}
