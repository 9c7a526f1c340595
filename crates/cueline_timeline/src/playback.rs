// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback: the play-head source and the periodic ticker driving the
//! sequence.

use crate::session::Timeline;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default interval between ticks
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(50);

/// Source of the play-head position (normally the audio player)
pub trait Transport: Send + Sync {
    /// Current play-head time in seconds
    fn position(&self) -> f64;

    /// Whether the play-head is advancing
    fn is_playing(&self) -> bool;

    /// Start or resume
    fn play(&self);

    /// Pause at the current position
    fn pause(&self);

    /// Jump to `time`
    fn seek(&self, time: f64);
}

#[derive(Debug)]
struct ClockState {
    /// Position when the clock was last started, paused or seeked
    base: f64,
    /// Wall time the clock started running, while playing
    running_since: Option<Instant>,
}

/// Wall-clock transport for headless playback
#[derive(Debug)]
pub struct ClockTransport {
    duration: f64,
    speed: f64,
    state: Mutex<ClockState>,
}

impl ClockTransport {
    /// Create a paused clock over `duration` seconds
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            speed: 1.0,
            state: Mutex::new(ClockState {
                base: 0.0,
                running_since: None,
            }),
        }
    }

    /// Set the playback rate
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    /// Length of the clock
    pub fn duration(&self) -> f64 {
        self.duration
    }

    fn position_of(&self, state: &ClockState) -> f64 {
        let elapsed = state
            .running_since
            .map_or(0.0, |since| since.elapsed().as_secs_f64() * self.speed);
        (state.base + elapsed).clamp(0.0, self.duration)
    }
}

impl Transport for ClockTransport {
    fn position(&self) -> f64 {
        let state = self.state.lock();
        self.position_of(&state)
    }

    fn is_playing(&self) -> bool {
        let state = self.state.lock();
        state.running_since.is_some() && self.position_of(&state) < self.duration
    }

    fn play(&self) {
        let mut state = self.state.lock();
        if state.running_since.is_none() {
            state.running_since = Some(Instant::now());
        }
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.base = self.position_of(&state);
        state.running_since = None;
    }

    fn seek(&self, time: f64) {
        let mut state = self.state.lock();
        state.base = time.clamp(0.0, self.duration);
        if state.running_since.is_some() {
            state.running_since = Some(Instant::now());
        }
    }
}

/// Ticker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerConfig {
    /// Interval between ticks
    pub period: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_TICK_PERIOD,
        }
    }
}

/// What one ticker step did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Sequence advanced to this time
    Ticked(f64),
    /// Playback stopped since the last step; active triggers switched off
    Released(f64),
    /// A drag is in progress; the step was skipped
    Suspended,
    /// Not playing
    Idle,
}

/// One step of the playback loop, shared by the ticker thread and manual
/// driving
pub struct TickDriver {
    timeline: Arc<Mutex<Timeline>>,
    transport: Arc<dyn Transport>,
    was_playing: bool,
}

impl TickDriver {
    /// Create a driver over a shared timeline
    pub fn new(timeline: Arc<Mutex<Timeline>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            timeline,
            transport,
            was_playing: false,
        }
    }

    /// Advance the sequence to the transport position
    pub fn step(&mut self) -> TickOutcome {
        let mut timeline = self.timeline.lock();
        if timeline.interaction.is_dragging() {
            return TickOutcome::Suspended;
        }

        let time = self.transport.position();
        if self.transport.is_playing() {
            timeline.sequence.tick(time);
            self.was_playing = true;
            TickOutcome::Ticked(time)
        } else if self.was_playing {
            timeline.sequence.release_all(time);
            self.was_playing = false;
            tracing::debug!("Playback stopped at {time:.3}s");
            TickOutcome::Released(time)
        } else {
            TickOutcome::Idle
        }
    }
}

/// Background thread stepping a [`TickDriver`] at a fixed period.
///
/// Stopped and joined on drop.
pub struct PlaybackTicker {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackTicker {
    /// Start the ticker thread
    pub fn spawn(config: TickerConfig, mut driver: TickDriver) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let period = config.period;

        let handle = thread::Builder::new()
            .name("cueline-ticker".to_string())
            .spawn(move || {
                tracing::debug!("Ticker started ({} ms)", period.as_millis());
                while !flag.load(Ordering::Acquire) {
                    driver.step();
                    thread::park_timeout(period);
                }
                tracing::debug!("Ticker stopped");
            })?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the thread and wait for it
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("Ticker thread panicked");
            }
        }
    }
}

impl Drop for PlaybackTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::InteractionEngine;
    use crate::sequence::TriggerSequence;
    use crate::template::TriggerKind;
    use crate::test_support::{recording_template, trigger, EventLog, ManualTransport, Recorded};
    use crate::trigger::TriggerId;
    use egui::{Modifiers, Pos2};

    fn shared_timeline() -> (Arc<Mutex<Timeline>>, Arc<EventLog>, TriggerId) {
        let (template, log) = recording_template("t", TriggerKind::Pulse);
        let mut sequence = TriggerSequence::new(10.0);
        let id = sequence.add_trigger(0, trigger(&template, 1.0, 3.0)).unwrap();
        let timeline = Timeline::new(sequence, InteractionEngine::default());
        (Arc::new(Mutex::new(timeline)), log, id)
    }

    #[test]
    fn test_clock_pause_and_seek() {
        let clock = ClockTransport::new(10.0);
        assert!(!clock.is_playing());
        assert_eq!(clock.position(), 0.0);

        clock.seek(4.0);
        assert_eq!(clock.position(), 4.0);
        clock.seek(25.0);
        assert_eq!(clock.position(), 10.0);
        assert!(!clock.is_playing());

        clock.seek(2.0);
        clock.play();
        assert!(clock.is_playing());
        clock.pause();
        let paused = clock.position();
        assert!(paused >= 2.0 && paused < 3.0);
        assert!(!clock.is_playing());
    }

    #[test]
    fn test_clock_stops_at_end() {
        let clock = ClockTransport::new(0.0);
        clock.play();
        assert!(!clock.is_playing());
        assert_eq!(clock.position(), 0.0);
    }

    #[test]
    fn test_driver_ticks_and_releases() {
        let (timeline, log, id) = shared_timeline();
        let transport = Arc::new(ManualTransport::default());
        let mut driver = TickDriver::new(Arc::clone(&timeline), transport.clone());

        assert_eq!(driver.step(), TickOutcome::Idle);
        transport.set(1.5, true);
        assert_eq!(driver.step(), TickOutcome::Ticked(1.5));
        transport.set(2.0, false);
        assert_eq!(driver.step(), TickOutcome::Released(2.0));
        assert_eq!(driver.step(), TickOutcome::Idle);

        assert_eq!(
            log.events(),
            vec![
                Recorded::On { trigger: id, time: 1.5 },
                Recorded::Off { trigger: id, time: 2.0 },
            ]
        );
    }

    #[test]
    fn test_driver_suspended_while_dragging() {
        let (timeline, log, _id) = shared_timeline();
        let transport = Arc::new(ManualTransport::default());
        let mut driver = TickDriver::new(Arc::clone(&timeline), transport.clone());
        transport.set(1.5, true);

        {
            let mut guard = timeline.lock();
            let Timeline { sequence, interaction } = &mut *guard;
            interaction.drag_started(sequence, Pos2::new(150.0, 20.0), Modifiers::NONE);
        }
        assert_eq!(driver.step(), TickOutcome::Suspended);
        assert!(log.events().is_empty());

        timeline.lock().interaction.cancel_drag();
        assert_eq!(driver.step(), TickOutcome::Ticked(1.5));
    }

    #[test]
    fn test_ticker_thread_drives_sequence() {
        let (timeline, log, id) = shared_timeline();
        let transport = Arc::new(ManualTransport::default());
        transport.set(2.0, true);

        let config = TickerConfig {
            period: Duration::from_millis(1),
        };
        let mut ticker = PlaybackTicker::spawn(config, TickDriver::new(timeline, transport)).unwrap();
        assert!(ticker.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while log.events().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        ticker.stop();
        assert!(!ticker.is_running());
        assert_eq!(log.events().first(), Some(&Recorded::On { trigger: id, time: 2.0 }));
    }
}
