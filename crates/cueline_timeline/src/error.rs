// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the trigger sequence model.

use crate::keyframe::KeyframeError;
use crate::template::TemplateId;
use crate::trigger::TriggerId;

/// Error when mutating or querying lines and sequences
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    /// Placement collides with an existing trigger
    #[error("Trigger [{start}, {end}) overlaps an existing trigger")]
    Overlap {
        /// Requested start time
        start: f64,
        /// Requested end time
        end: f64,
    },

    /// Duration below the minimum trigger duration
    #[error("Trigger duration {duration} is below the minimum")]
    DurationTooShort {
        /// Requested duration
        duration: f64,
    },

    /// Trigger not found
    #[error("Trigger not found: {0:?}")]
    UnknownTrigger(TriggerId),

    /// Line index out of range
    #[error("Line not found: {0}")]
    UnknownLine(usize),

    /// Template not registered
    #[error("Template not found: {0}")]
    UnknownTemplate(TemplateId),

    /// Keyframe edit rejected
    #[error(transparent)]
    Keyframe(#[from] KeyframeError),
}
