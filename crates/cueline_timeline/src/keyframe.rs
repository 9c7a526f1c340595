// SPDX-License-Identifier: MIT OR Apache-2.0
//! Intensity keyframe curves attached to intensity triggers.
//!
//! A curve is a short list of control points sorted by `position`, which is
//! the proportional progress through the owning trigger (`0.0` at its start,
//! `1.0` at its end). The first and last keyframes are fixed at positions
//! `0.0` and `1.0`: they can never be removed, and nothing can be inserted
//! before the first or after the last.

use serde::{Deserialize, Serialize};

/// Minimum absolute time (seconds) between a newly inserted keyframe and
/// either of its neighbours.
pub const MINIMUM_KEYFRAME_SPACING: f64 = 0.05;

/// Value given to both boundary keyframes of a fresh curve.
pub const DEFAULT_INTENSITY: f64 = 1.0;

/// A single control point of an intensity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Progress through the trigger, in `[0, 1]`
    pub position: f64,
    /// Intensity, in `[0, 1]`
    pub value: f64,
}

impl Keyframe {
    /// Create a new keyframe
    pub fn new(position: f64, value: f64) -> Self {
        Self { position, value }
    }

    /// Absolute time of this keyframe for a trigger spanning `start..start + duration`
    pub fn time(&self, start: f64, duration: f64) -> f64 {
        start + self.position * duration
    }
}

/// Errors raised by keyframe curve edits
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyframeError {
    /// Attempt to remove a boundary keyframe or insert outside them
    #[error("Keyframe index {index} touches a fixed boundary keyframe")]
    BoundaryViolation {
        /// Offending index
        index: usize,
    },

    /// Index past the end of the curve
    #[error("Keyframe index {index} is out of range")]
    OutOfRange {
        /// Offending index
        index: usize,
    },

    /// Curve data does not satisfy the curve invariants
    #[error("Invalid keyframe curve: {0}")]
    InvalidCurve(String),
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two values
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }
}

/// Ordered intensity curve with fixed boundary keyframes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct KeyframeCurve {
    keyframes: Vec<Keyframe>,
}

impl KeyframeCurve {
    /// Create a flat curve holding only the two boundary keyframes
    pub fn new(value: f64) -> Self {
        let value = value.clamp(0.0, 1.0);
        Self {
            keyframes: vec![Keyframe::new(0.0, value), Keyframe::new(1.0, value)],
        }
    }

    /// Build a curve from stored keyframes, checking every curve invariant
    pub fn from_keyframes(keyframes: Vec<Keyframe>) -> Result<Self, KeyframeError> {
        if keyframes.len() < 2 {
            return Err(KeyframeError::InvalidCurve(format!(
                "expected at least 2 keyframes, found {}",
                keyframes.len()
            )));
        }

        let first = keyframes[0];
        let last = keyframes[keyframes.len() - 1];
        if first.position != 0.0 || last.position != 1.0 {
            return Err(KeyframeError::InvalidCurve(
                "boundary keyframes must sit at positions 0 and 1".to_string(),
            ));
        }

        for kf in &keyframes {
            if !(0.0..=1.0).contains(&kf.value) || !(0.0..=1.0).contains(&kf.position) {
                return Err(KeyframeError::InvalidCurve(format!(
                    "keyframe ({}, {}) lies outside the unit square",
                    kf.position, kf.value
                )));
            }
        }

        if keyframes.windows(2).any(|w| w[0].position > w[1].position) {
            return Err(KeyframeError::InvalidCurve(
                "keyframes are not sorted by position".to_string(),
            ));
        }

        Ok(Self { keyframes })
    }

    /// Get all keyframes
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Get a keyframe by index
    pub fn get(&self, index: usize) -> Option<&Keyframe> {
        self.keyframes.get(index)
    }

    /// Get keyframe count (never less than two)
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Index of the trailing boundary keyframe
    pub fn last_index(&self) -> usize {
        self.keyframes.len() - 1
    }

    /// Whether `index` is an insertion slot strictly between the boundaries.
    ///
    /// Inserting at `index` places the new keyframe between the current
    /// keyframes `index - 1` and `index`.
    fn is_interior_slot(&self, index: usize) -> bool {
        index > 0 && index < self.keyframes.len()
    }

    /// Check whether a keyframe may be inserted at `index` for a trigger of
    /// the given duration (seconds)
    pub fn can_insert_at(&self, index: usize, trigger_duration: f64) -> bool {
        if !self.is_interior_slot(index) || trigger_duration <= 0.0 {
            return false;
        }

        let prev = self.keyframes[index - 1];
        let next = self.keyframes[index];
        let half_gap = (next.position - prev.position) / 2.0;
        half_gap > MINIMUM_KEYFRAME_SPACING / trigger_duration
    }

    /// Insert a keyframe midway between its two future neighbours
    pub fn insert_at(&mut self, index: usize) -> Result<&Keyframe, KeyframeError> {
        if index > self.keyframes.len() {
            return Err(KeyframeError::OutOfRange { index });
        }
        if !self.is_interior_slot(index) {
            return Err(KeyframeError::BoundaryViolation { index });
        }

        let prev = self.keyframes[index - 1];
        let next = self.keyframes[index];
        let keyframe = Keyframe::new(
            (prev.position + next.position) / 2.0,
            (prev.value + next.value) / 2.0,
        );
        self.keyframes.insert(index, keyframe);
        Ok(&self.keyframes[index])
    }

    /// Check whether the keyframe at `index` may be removed
    pub fn can_remove_at(&self, index: usize) -> bool {
        index > 0 && index < self.last_index()
    }

    /// Remove an interior keyframe
    pub fn remove_at(&mut self, index: usize) -> Result<Keyframe, KeyframeError> {
        if index > self.last_index() {
            return Err(KeyframeError::OutOfRange { index });
        }
        if !self.can_remove_at(index) {
            return Err(KeyframeError::BoundaryViolation { index });
        }
        Ok(self.keyframes.remove(index))
    }

    /// Move a keyframe towards `(position, value)`.
    ///
    /// Interior keyframes are clamped to the positions of their immediate
    /// neighbours (not the midpoints between them), so a keyframe can travel
    /// the whole gap and the list stays sorted. Boundary keyframes keep their
    /// position and only take the new value. Values are clamped to `[0, 1]`.
    pub fn drag_to(&mut self, index: usize, position: f64, value: f64) -> Result<Keyframe, KeyframeError> {
        let last = self.last_index();
        if index > last {
            return Err(KeyframeError::OutOfRange { index });
        }

        let position = if index == 0 {
            0.0
        } else if index == last {
            1.0
        } else {
            let min = self.keyframes[index - 1].position;
            let max = self.keyframes[index + 1].position;
            position.clamp(min, max)
        };

        let keyframe = &mut self.keyframes[index];
        keyframe.position = position;
        keyframe.value = value.clamp(0.0, 1.0);
        Ok(*keyframe)
    }

    /// Evaluate the curve at a progress position
    pub fn value_at(&self, position: f64) -> f64 {
        let position = position.clamp(0.0, 1.0);
        let next = self
            .keyframes
            .partition_point(|k| k.position < position)
            .min(self.last_index());

        if next == 0 {
            return self.keyframes[0].value;
        }

        let a = self.keyframes[next - 1];
        let b = self.keyframes[next];
        let span = b.position - a.position;
        if span.abs() < f64::EPSILON {
            return b.value;
        }
        Interpolation::lerp(a.value, b.value, (position - a.position) / span)
    }
}

impl Default for KeyframeCurve {
    fn default() -> Self {
        Self::new(DEFAULT_INTENSITY)
    }
}

impl TryFrom<Vec<Keyframe>> for KeyframeCurve {
    type Error = KeyframeError;

    fn try_from(keyframes: Vec<Keyframe>) -> Result<Self, Self::Error> {
        Self::from_keyframes(keyframes)
    }
}

impl From<KeyframeCurve> for Vec<Keyframe> {
    fn from(curve: KeyframeCurve) -> Self {
        curve.keyframes
    }
}
