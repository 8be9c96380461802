use crate::audio::{PlaybackEvents, PlaybackHandle};
use crate::catalog::{self, Catalog};
use crate::model::TransportState;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IteratorRandom;

/// Random-track player with a back-history of visited tracks.
///
/// Every action runs on the UI loop and reports its outcome through
/// `status`; playback failures never escape an action.
pub struct Player {
    catalog: Catalog,
    handle: Box<dyn PlaybackHandle>,
    rng: SmallRng,
    state: TransportState,
    current_index: Option<usize>,
    history: Vec<usize>,
    volume: f32,
    previous_volume: f32,
    elapsed: f64,
    duration: f64,
    current_song_name: String,
    pub status: String,
    pub dirty: bool,
}

impl Player {
    pub fn new(catalog: Catalog, handle: Box<dyn PlaybackHandle>) -> Self {
        Self::with_rng(catalog, handle, rand::make_rng::<SmallRng>())
    }

    pub fn with_rng(catalog: Catalog, handle: Box<dyn PlaybackHandle>, rng: SmallRng) -> Self {
        let mut player = Self {
            catalog,
            handle,
            rng,
            state: TransportState::Idle,
            current_index: None,
            history: Vec::new(),
            volume: 1.0,
            previous_volume: 1.0,
            elapsed: 0.0,
            duration: 0.0,
            current_song_name: String::new(),
            status: String::from("Ready"),
            dirty: true,
        };
        player.handle.set_volume(player.volume);
        if !player.set_random_song() {
            player.set_status("Catalog is empty");
        }
        player.handle.subscribe();
        player
    }

    pub fn toggle_play(&mut self) {
        if self.state == TransportState::Playing {
            self.handle.pause();
            self.state = TransportState::Paused;
            self.set_status("Paused");
            return;
        }

        if self.current_index.is_none() {
            self.set_status("Catalog is empty");
            return;
        }
        self.start_playback();
    }

    pub fn next_song(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Loaded;
        }
        if !self.set_random_song() {
            self.set_status("Catalog is empty");
            return;
        }
        self.start_playback();
    }

    pub fn previous_song(&mut self) {
        let Some(index) = self.history.pop() else {
            tracing::info!("no previous song in history");
            self.set_status("No previous song in history.");
            return;
        };
        self.load_track(index);
        self.start_playback();
    }

    pub fn update_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.handle.set_volume(self.volume);
        self.dirty = true;
    }

    pub fn toggle_mute(&mut self) {
        if self.volume == 0.0 {
            self.volume = self.previous_volume;
        } else {
            self.previous_volume = self.volume;
            self.volume = 0.0;
        }
        self.handle.set_volume(self.volume);
        self.dirty = true;
    }

    /// Drains pending handle events into the callbacks below.
    pub fn pump(&mut self) {
        for event in self.handle.poll_events() {
            event.dispatch(self);
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn handle(&self) -> &dyn PlaybackHandle {
        &*self.handle
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.volume == 0.0
    }

    pub fn is_previous_disabled(&self) -> bool {
        self.history.is_empty()
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn current_song_name(&self) -> &str {
        &self.current_song_name
    }

    pub fn current_time_display(&self) -> String {
        format_time(self.elapsed)
    }

    pub fn duration_display(&self) -> String {
        format_time(self.duration)
    }

    /// Picks a track uniformly, never the current one unless it is the only track.
    fn random_index(&mut self) -> Option<usize> {
        let len = self.catalog.len();
        let current = self.current_index;
        (0..len)
            .filter(|idx| len == 1 || Some(*idx) != current)
            .choose(&mut self.rng)
    }

    fn set_random_song(&mut self) -> bool {
        let Some(index) = self.random_index() else {
            return false;
        };
        if let Some(previous) = self.current_index {
            self.history.push(previous);
        }
        self.load_track(index);
        true
    }

    fn load_track(&mut self, index: usize) {
        let (Some(path), Some(location)) = (self.catalog.get(index), self.catalog.location(index))
        else {
            return;
        };
        self.current_song_name = catalog::song_name(path);
        self.handle.set_source(&location);
        self.current_index = Some(index);
        self.state = TransportState::Loaded;
        self.elapsed = 0.0;
        self.duration = 0.0;
        self.dirty = true;
        tracing::info!(index, song = %self.current_song_name, "track loaded");
    }

    fn start_playback(&mut self) {
        match self.handle.play() {
            Ok(()) => {
                self.state = TransportState::Playing;
                let message = format!("Playing {}", self.current_song_name);
                self.set_status(&message);
            }
            Err(err) => {
                tracing::warn!("failed to start {}: {err:#}", self.current_song_name);
                self.set_status(&format!("playback error: {err:#}"));
            }
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

impl PlaybackEvents for Player {
    fn on_ended(&mut self) {
        tracing::debug!(index = ?self.current_index, "track ended, advancing");
        self.next_song();
    }

    fn on_time_update(&mut self, elapsed: f64) {
        self.elapsed = elapsed;
        self.dirty = true;
    }

    fn on_metadata_loaded(&mut self, duration: f64) {
        self.duration = duration;
        self.dirty = true;
    }

    fn on_failed(&mut self, message: &str) {
        tracing::warn!("failed to start {}: {message}", self.current_song_name);
        if self.state == TransportState::Playing {
            self.state = TransportState::Loaded;
        }
        self.set_status(&format!("playback error: {message}"));
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.handle.pause();
        self.handle.unsubscribe();
    }
}

/// `M:SS` with unbounded minutes; anything non-finite or negative shows `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return String::from("0:00");
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
