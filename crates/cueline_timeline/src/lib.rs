// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger sequence timeline engine.
//!
//! This crate schedules timed triggers against an audio track:
//! - Lines of non-overlapping triggers with binary-search lookups
//! - Playback ticking with on/update/off callbacks
//! - Pointer interaction: move, edge resize, cross-line relocation
//! - Box selection and keyframe intensity curves
//!
//! ## Architecture
//!
//! The engine is built on:
//! - [`TriggerSequence`] owning ordered [`SequenceLine`]s of [`PlacedTrigger`]s
//! - Trigger templates resolving behaviours and configuration schemas
//! - [`InteractionEngine`] translating pointer events into model edits
//! - [`TimelineSession`] sharing the model with the [`PlaybackTicker`]

pub mod config;
pub mod error;
pub mod interaction;
pub mod keyframe;
pub mod line;
pub mod persist;
pub mod playback;
pub mod selection;
pub mod sequence;
pub mod session;
pub mod template;
pub mod trigger;
pub mod view;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, ConfigSchema, ConfigValue, FieldKind, FieldSpec, TriggerConfig};
pub use error::TimelineError;
pub use interaction::{DeleteOutcome, DragOperation, Hover, InteractionEngine, TriggerPart};
pub use keyframe::{Keyframe, KeyframeCurve, KeyframeError, MINIMUM_KEYFRAME_SPACING};
pub use line::SequenceLine;
pub use persist::{load_json, save_json, PersistError, SequenceRecord};
pub use playback::{ClockTransport, PlaybackTicker, TickDriver, TickOutcome, TickerConfig, Transport};
pub use selection::Selection;
pub use sequence::{LineMove, TriggerSequence};
pub use session::{Timeline, TimelineSession};
pub use template::{LoggingTemplate, TemplateId, TemplateRegistry, TriggerBehavior, TriggerEvent, TriggerKind, TriggerTemplate};
pub use trigger::{PlacedTrigger, TriggerId, DEFAULT_TRIGGER_DURATION, MINIMUM_TRIGGER_DURATION};
pub use view::TimelineView;
