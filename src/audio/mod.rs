mod fetch;
mod output;

pub use fetch::{Fetcher, is_remote};
pub use output::{AudioOutput, RodioHandle};

use anyhow::{Result, bail};
use rodio::{Decoder, Source};
use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

/// Notification raised by a handle and drained through [`PlaybackHandle::poll_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEvent {
    Ended,
    TimeUpdate(f64),
    MetadataLoaded(f64),
    /// A start request accepted by `play` could not be completed.
    Failed(String),
}

/// Receiver side of [`HandleEvent`]s.
pub trait PlaybackEvents {
    fn on_ended(&mut self);
    fn on_time_update(&mut self, elapsed: f64);
    fn on_metadata_loaded(&mut self, duration: f64);
    fn on_failed(&mut self, message: &str);
}

impl HandleEvent {
    pub fn dispatch<T: PlaybackEvents + ?Sized>(self, target: &mut T) {
        match self {
            Self::Ended => target.on_ended(),
            Self::TimeUpdate(elapsed) => target.on_time_update(elapsed),
            Self::MetadataLoaded(duration) => target.on_metadata_loaded(duration),
            Self::Failed(message) => target.on_failed(&message),
        }
    }
}

/// A controllable playback resource for a single source.
///
/// Positions and durations are in seconds. `duration` is NaN until the
/// source is loaded or when it cannot be determined. Events are only queued
/// while the handle is subscribed.
pub trait PlaybackHandle {
    /// Replaces the source; the next `play` loads it from the start.
    fn set_source(&mut self, location: &str);
    fn source(&self) -> Option<&str>;
    /// Takes effect when the source is next loaded.
    fn set_looping(&mut self, looping: bool);
    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;
    fn seek(&mut self, position: f64) -> Result<()>;
    /// Loads the source if needed and starts or resumes playback.
    ///
    /// `Ok` means the request was accepted. A load that completes later
    /// reports its failure as [`HandleEvent::Failed`].
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn position(&self) -> f64;
    fn duration(&self) -> f64;
    fn subscribe(&mut self);
    fn unsubscribe(&mut self);
    fn poll_events(&mut self) -> Vec<HandleEvent>;
}

/// Silent handle driven by the wall clock, used when no output device is available.
pub struct NullHandle {
    source: Option<String>,
    looping: bool,
    volume: f32,
    paused: bool,
    loaded: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    pinned_duration: Option<Duration>,
    listening: bool,
    metadata_pending: bool,
    last_reported: Option<Duration>,
}

impl NullHandle {
    pub fn new() -> Self {
        Self {
            source: None,
            looping: false,
            volume: 1.0,
            paused: true,
            loaded: false,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            pinned_duration: None,
            listening: false,
            metadata_pending: false,
            last_reported: None,
        }
    }

    /// Pins the duration reported after the next load, instead of probing the file.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.pinned_duration = Some(duration);
        self.track_duration = Some(duration);
        self
    }

    fn estimate_duration(location: &str) -> Option<Duration> {
        if is_remote(location) {
            return None;
        }
        let file = File::open(Path::new(location)).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        match self.track_duration {
            Some(duration) if self.looping && !duration.is_zero() => {
                Duration::from_secs_f64(position.as_secs_f64() % duration.as_secs_f64())
            }
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        !self.looping && !self.paused && self.current_position() >= duration
    }
}

impl Default for NullHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackHandle for NullHandle {
    fn set_source(&mut self, location: &str) {
        self.source = Some(location.to_string());
        self.loaded = false;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = self.pinned_duration;
        self.metadata_pending = false;
        self.last_reported = None;
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        if !position.is_finite() || position < 0.0 {
            bail!("invalid seek position {position}");
        }
        let target = Duration::from_secs_f64(position);
        self.position_offset = self
            .track_duration
            .map_or(target, |duration| target.min(duration));
        self.started_at = (!self.paused).then(Instant::now);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let Some(location) = self.source.as_deref() else {
            bail!("no source set");
        };
        if !self.loaded {
            if self.track_duration.is_none() {
                self.track_duration = Self::estimate_duration(location);
            }
            self.loaded = true;
            self.metadata_pending = true;
        }
        let at_end = self
            .track_duration
            .is_some_and(|duration| self.position_offset >= duration);
        if self.paused && at_end {
            self.position_offset = Duration::ZERO;
        }
        if self.paused {
            self.paused = false;
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn position(&self) -> f64 {
        self.current_position().as_secs_f64()
    }

    fn duration(&self) -> f64 {
        match self.track_duration {
            Some(duration) if self.loaded => duration.as_secs_f64(),
            _ => f64::NAN,
        }
    }

    fn subscribe(&mut self) {
        self.listening = true;
    }

    fn unsubscribe(&mut self) {
        self.listening = false;
    }

    fn poll_events(&mut self) -> Vec<HandleEvent> {
        let mut events = Vec::new();
        let ended = self.finished();
        if ended {
            self.pause();
        }
        if !self.listening {
            return events;
        }

        if self.metadata_pending {
            self.metadata_pending = false;
            events.push(HandleEvent::MetadataLoaded(self.duration()));
        }

        let position = self.current_position();
        if self.loaded && self.last_reported != Some(position) {
            self.last_reported = Some(position);
            events.push(HandleEvent::TimeUpdate(position.as_secs_f64()));
        }

        if ended {
            events.push(HandleEvent::Ended);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::{HandleEvent, NullHandle, PlaybackEvents, PlaybackHandle};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        ended: usize,
        elapsed: Vec<f64>,
        durations: Vec<f64>,
        failures: Vec<String>,
    }

    impl PlaybackEvents for Recorder {
        fn on_ended(&mut self) {
            self.ended += 1;
        }

        fn on_time_update(&mut self, elapsed: f64) {
            self.elapsed.push(elapsed);
        }

        fn on_metadata_loaded(&mut self, duration: f64) {
            self.durations.push(duration);
        }

        fn on_failed(&mut self, message: &str) {
            self.failures.push(message.to_string());
        }
    }

    #[test]
    fn play_without_source_fails() {
        let mut handle = NullHandle::new();
        assert!(handle.play().is_err());
        assert!(handle.is_paused());
    }

    #[test]
    fn position_advances_only_while_playing() {
        let mut handle = NullHandle::new();
        handle.set_source("nonexistent-track.mp3");
        handle.play().expect("null play should succeed");
        thread::sleep(Duration::from_millis(20));

        handle.pause();
        let paused = handle.position();
        assert!(paused > 0.0, "position should advance while playing");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.position(), paused, "position should freeze while paused");

        handle.play().expect("resume");
        thread::sleep(Duration::from_millis(20));
        assert!(handle.position() > paused);
    }

    #[test]
    fn seek_moves_position_and_rejects_non_finite() {
        let mut handle = NullHandle::new();
        handle.set_source("nonexistent-track.mp3");
        handle.seek(12.0).expect("seek");
        assert!(handle.position() >= 12.0);
        assert!(handle.seek(f64::NAN).is_err());
    }

    #[test]
    fn unknown_duration_is_nan() {
        let mut handle = NullHandle::new();
        handle.set_source("https://example.test/a.mp3");
        handle.play().expect("play");
        assert!(handle.duration().is_nan());
    }

    #[test]
    fn events_are_routed_to_callbacks() {
        let mut handle = NullHandle::new().with_duration(Duration::from_millis(30));
        handle.subscribe();
        handle.set_source("a.mp3");
        handle.play().expect("play");

        let mut recorder = Recorder::default();
        for event in handle.poll_events() {
            event.dispatch(&mut recorder);
        }
        assert_eq!(recorder.durations, vec![0.03]);
        assert_eq!(recorder.elapsed.len(), 1);

        thread::sleep(Duration::from_millis(50));
        let events = handle.poll_events();
        assert_eq!(events.last(), Some(&HandleEvent::Ended));
        assert!(handle.is_paused(), "ended handle reports paused");
    }

    #[test]
    fn failure_events_carry_their_message() {
        let mut recorder = Recorder::default();
        HandleEvent::Failed(String::from("failed to request a.mp3")).dispatch(&mut recorder);
        assert_eq!(recorder.failures, vec![String::from("failed to request a.mp3")]);
        assert_eq!(recorder.ended, 0);
    }

    #[test]
    fn looping_handle_never_ends() {
        let mut handle = NullHandle::new().with_duration(Duration::from_millis(10));
        handle.subscribe();
        handle.set_looping(true);
        handle.set_source("noise.mp3");
        handle.play().expect("play");
        thread::sleep(Duration::from_millis(30));

        assert!(!handle.poll_events().contains(&HandleEvent::Ended));
        assert!(!handle.is_paused());
        assert!(handle.position() < 0.01);
    }

    #[test]
    fn unsubscribed_handle_stays_silent() {
        let mut handle = NullHandle::new().with_duration(Duration::from_millis(5));
        handle.set_source("a.mp3");
        handle.play().expect("play");
        thread::sleep(Duration::from_millis(20));

        assert!(handle.poll_events().is_empty());
        assert!(handle.is_paused(), "handle still stops at the end");
    }
}
