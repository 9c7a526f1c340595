// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mapping between screen space and timeline space.

use egui::{Pos2, Rect};

/// Edge grab width (pixels) when the pointer is inside a trigger
pub const EDGE_GRAB_INSIDE: f32 = 4.0;
/// Edge grab width (pixels) when the pointer is just outside a trigger
pub const EDGE_GRAB_OUTSIDE: f32 = 8.0;
/// Pick radius of keyframe handles (pixels)
pub const KEYFRAME_HANDLE_RADIUS: f32 = 5.0;
/// Default height of a line (pixels)
pub const DEFAULT_LINE_HEIGHT: f32 = 40.0;

const MIN_ZOOM: f32 = 5.0;
const MAX_ZOOM: f32 = 2000.0;

/// Viewport over the sequence: horizontal zoom/scroll and line geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineView {
    /// Top-left corner of the first line at zero scroll
    pub origin: Pos2,
    /// Horizontal zoom level (pixels per second)
    pub pixels_per_second: f32,
    /// Time at the left edge (seconds)
    pub scroll_offset: f64,
    /// Vertical scroll offset (pixels)
    pub vertical_scroll: f32,
    /// Height of each line (pixels)
    pub line_height: f32,
}

impl TimelineView {
    /// Create a view with the given zoom, scrolled to the start
    pub fn new(origin: Pos2, pixels_per_second: f32) -> Self {
        Self {
            origin,
            pixels_per_second: pixels_per_second.clamp(MIN_ZOOM, MAX_ZOOM),
            ..Self::default()
        }
    }

    /// Convert time to x position
    pub fn time_to_x(&self, time: f64) -> f32 {
        ((time - self.scroll_offset) * f64::from(self.pixels_per_second)) as f32 + self.origin.x
    }

    /// Convert x position to time
    pub fn x_to_time(&self, x: f32) -> f64 {
        f64::from(x - self.origin.x) / f64::from(self.pixels_per_second) + self.scroll_offset
    }

    /// Line index under a y position; negative above the first line
    pub fn line_at_y(&self, y: f32) -> isize {
        ((y - self.origin.y + self.vertical_scroll) / self.line_height).floor() as isize
    }

    /// Top y of a line
    pub fn line_top(&self, index: usize) -> f32 {
        self.origin.y + index as f32 * self.line_height - self.vertical_scroll
    }

    /// Screen rectangle of a span on a line
    pub fn span_rect(&self, line: usize, start: f64, end: f64) -> Rect {
        let top = self.line_top(line);
        Rect::from_min_max(
            Pos2::new(self.time_to_x(start), top),
            Pos2::new(self.time_to_x(end), top + self.line_height),
        )
    }

    /// Screen position of a keyframe handle
    pub fn keyframe_pos(&self, line: usize, time: f64, value: f64) -> Pos2 {
        let top = self.line_top(line);
        Pos2::new(self.time_to_x(time), top + (1.0 - value as f32) * self.line_height)
    }

    /// Intensity value for a y position on a line, clamped to `[0, 1]`
    pub fn value_at_y(&self, line: usize, y: f32) -> f64 {
        let top = self.line_top(line);
        f64::from(1.0 - (y - top) / self.line_height).clamp(0.0, 1.0)
    }

    /// Zoom by `factor`, keeping the time under `anchor_x` fixed
    pub fn zoom_at(&mut self, factor: f32, anchor_x: f32) {
        let anchor_time = self.x_to_time(anchor_x);
        self.pixels_per_second = (self.pixels_per_second * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.scroll_offset = anchor_time - f64::from(anchor_x - self.origin.x) / f64::from(self.pixels_per_second);
    }
}

impl Default for TimelineView {
    fn default() -> Self {
        Self {
            origin: Pos2::ZERO,
            pixels_per_second: 100.0,
            scroll_offset: 0.0,
            vertical_scroll: 0.0,
            line_height: DEFAULT_LINE_HEIGHT,
        }
    }
}
