use super::{Fetcher, HandleEvent, PlaybackHandle, is_remote};
use anyhow::{Context, Result, anyhow, bail};
use rodio::mixer::Mixer;
use rodio::{Decoder, DeviceSinkBuilder, MixerDeviceSink, Player, Source};
#[cfg(unix)]
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

/// The system output stream shared by every handle of a session.
pub struct AudioOutput {
    sink: MixerDeviceSink,
    fetcher: Fetcher,
}

impl AudioOutput {
    pub fn open_default(fetcher: Fetcher) -> Result<Self> {
        let mut sink = with_silenced_stderr(|| {
            DeviceSinkBuilder::from_default_device()
                .context("failed to open default system output stream")?
                .with_error_callback(|err| tracing::debug!("output stream error: {err}"))
                .open_sink_or_fallback()
                .context("failed to start default output stream")
        })?;
        sink.log_on_drop(false);
        Ok(Self { sink, fetcher })
    }

    pub fn handle(&self) -> RodioHandle {
        RodioHandle::new(self.sink.mixer().clone(), self.fetcher.clone())
    }
}

type Download = Receiver<Result<Vec<u8>>>;

/// One rodio [`Player`] on the shared mixer.
///
/// Local files are read inline by `play`; remote locations are downloaded on
/// a worker thread and picked up by `poll_events`. The fetched bytes are kept
/// so seeks and replays rebuild the decoder without fetching again.
pub struct RodioHandle {
    mixer: Mixer,
    fetcher: Fetcher,
    player: Option<Player>,
    source: Option<String>,
    data: Option<Arc<[u8]>>,
    download: Option<Download>,
    play_when_loaded: bool,
    looping: bool,
    volume: f32,
    track_duration: Option<Duration>,
    pending_seek: Option<Duration>,
    seek_base: Duration,
    listening: bool,
    metadata_pending: bool,
    last_reported: Option<Duration>,
    was_playing: bool,
}

impl RodioHandle {
    pub fn new(mixer: Mixer, fetcher: Fetcher) -> Self {
        Self {
            mixer,
            fetcher,
            player: None,
            source: None,
            data: None,
            download: None,
            play_when_loaded: false,
            looping: false,
            volume: 1.0,
            track_duration: None,
            pending_seek: None,
            seek_base: Duration::ZERO,
            listening: false,
            metadata_pending: false,
            last_reported: None,
            was_playing: false,
        }
    }

    fn start_download(&mut self, location: String) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let fetcher = self.fetcher.clone();
        thread::Builder::new()
            .name(String::from("lofi-fetch"))
            .spawn(move || {
                let _ = tx.send(fetcher.fetch(&location));
            })
            .context("failed to start download worker")?;
        self.download = Some(rx);
        Ok(())
    }

    /// Collects a finished download. Returns the failure message, if any.
    fn finish_download(&mut self) -> Option<String> {
        let rx = self.download.as_ref()?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(anyhow!("download worker stopped")),
        };
        self.download = None;

        match outcome.and_then(|bytes| {
            self.data = Some(Arc::from(bytes));
            self.build_player()
        }) {
            Ok(()) => {
                if self.play_when_loaded {
                    self.start();
                }
                None
            }
            Err(err) => {
                self.play_when_loaded = false;
                self.was_playing = false;
                Some(format!("{err:#}"))
            }
        }
    }

    /// Builds a fresh player over the fetched bytes, positioned at the pending seek.
    fn build_player(&mut self) -> Result<()> {
        let Some(data) = self.data.clone() else {
            bail!("no source loaded");
        };
        let location = self.source.clone().unwrap_or_default();
        let start = self.pending_seek.take().unwrap_or(Duration::ZERO);
        let len = data.len() as u64;

        let player = Player::connect_new(&self.mixer);
        player.pause();
        player.set_volume(self.volume);
        if self.looping {
            let mut decoder = Decoder::builder()
                .with_data(Cursor::new(data))
                .with_byte_len(len)
                .build_looped()
                .with_context(|| format!("failed to decode {location}"))?;
            start_at(&mut decoder, start)
                .with_context(|| format!("failed to seek {location}"))?;
            player.append(decoder);
        } else {
            let mut decoder = Decoder::builder()
                .with_data(Cursor::new(data))
                .with_byte_len(len)
                .build()
                .with_context(|| format!("failed to decode {location}"))?;
            self.track_duration = decoder
                .total_duration()
                .filter(|duration| !duration.is_zero());
            start_at(&mut decoder, start)
                .with_context(|| format!("failed to seek {location}"))?;
            player.append(decoder);
        }

        tracing::debug!(location = %location, duration = ?self.track_duration, "source loaded");
        if let Some(previous) = self.player.replace(player) {
            previous.stop();
        }
        self.seek_base = start;
        self.metadata_pending = true;
        Ok(())
    }

    fn start(&mut self) {
        if let Some(player) = &self.player {
            player.play();
        }
        self.play_when_loaded = false;
        self.was_playing = true;
    }
}

/// Seeking a fresh decoder happens before any sample is pulled, so no audio thread is involved.
fn start_at(source: &mut impl Source, position: Duration) -> Result<()> {
    if position.is_zero() {
        return Ok(());
    }
    source
        .try_seek(position)
        .map_err(|err| anyhow!("seek to {position:?} rejected: {err:?}"))
}

impl PlaybackHandle for RodioHandle {
    fn set_source(&mut self, location: &str) {
        if let Some(player) = self.player.take() {
            player.stop();
        }
        self.source = Some(location.to_string());
        self.data = None;
        self.download = None;
        self.play_when_loaded = false;
        self.track_duration = None;
        self.pending_seek = None;
        self.seek_base = Duration::ZERO;
        self.metadata_pending = false;
        self.last_reported = None;
        self.was_playing = false;
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(player) = &self.player {
            player.set_volume(self.volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        if !position.is_finite() || position < 0.0 {
            bail!("invalid seek position {position}");
        }
        self.pending_seek = Some(Duration::from_secs_f64(position));
        if self.player.is_none() || self.data.is_none() {
            return Ok(());
        }

        let resume = self.was_playing;
        self.build_player()?;
        if resume {
            self.start();
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.player.as_ref().is_some_and(|player| !player.empty()) {
            self.start();
            return Ok(());
        }
        if self.download.is_some() {
            self.play_when_loaded = true;
            return Ok(());
        }

        if self.data.is_none() {
            let Some(location) = self.source.clone() else {
                bail!("no source set");
            };
            if is_remote(&location) {
                self.start_download(location)?;
                self.play_when_loaded = true;
                return Ok(());
            }
            self.data = Some(Arc::from(self.fetcher.fetch(&location)?));
        }
        self.build_player()?;
        self.start();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(player) = &self.player {
            player.pause();
        }
        self.play_when_loaded = false;
        self.was_playing = false;
    }

    fn is_paused(&self) -> bool {
        !self.play_when_loaded
            && self
                .player
                .as_ref()
                .is_none_or(|player| player.is_paused() || player.empty())
    }

    fn position(&self) -> f64 {
        self.player.as_ref().map_or(0.0, |player| {
            (self.seek_base + player.get_pos()).as_secs_f64()
        })
    }

    fn duration(&self) -> f64 {
        match (&self.player, self.track_duration) {
            (Some(_), Some(duration)) => duration.as_secs_f64(),
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
        let failure = self.finish_download();
        if self.listening
            && let Some(message) = failure
        {
            events.push(HandleEvent::Failed(message));
        }

        let Some(player) = &self.player else {
            return events;
        };
        let ended = self.was_playing && !self.looping && player.empty();
        let position = self.seek_base + player.get_pos();
        if ended {
            self.was_playing = false;
        }
        if !self.listening {
            return events;
        }

        if self.metadata_pending {
            self.metadata_pending = false;
            events.push(HandleEvent::MetadataLoaded(self.duration()));
        }
        if self.last_reported != Some(position) {
            self.last_reported = Some(position);
            events.push(HandleEvent::TimeUpdate(position.as_secs_f64()));
        }
        if ended {
            events.push(HandleEvent::Ended);
        }
        events
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        if let Some(player) = self.player.take() {
            player.stop();
        }
    }
}

/// Runs `operation` with stderr pointed at /dev/null so ALSA/JACK probing
/// noise does not corrupt the terminal UI.
#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::mixer::{self, MixerSource};
    use std::fs;
    use std::num::NonZero;
    use tempfile::{TempDir, tempdir};

    const RATE: u32 = 8_000;

    /// Mixer with nothing pulling samples, so nothing depends on an audio thread.
    fn detached_mixer() -> (Mixer, MixerSource) {
        mixer::mixer(
            NonZero::new(1).expect("channels"),
            NonZero::new(RATE).expect("rate"),
        )
    }

    /// Writes a mono 16-bit PCM WAV of `millis` milliseconds of a low ramp.
    fn write_wav(dir: &TempDir, name: &str, millis: u32) -> String {
        let samples = RATE * millis / 1000;
        let data_len = samples * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&RATE.to_le_bytes());
        bytes.extend_from_slice(&(RATE * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for n in 0..samples {
            bytes.extend_from_slice(&((n % 64) as i16 * 16).to_le_bytes());
        }

        let path = dir.path().join(name);
        fs::write(&path, bytes).expect("write wav");
        path.to_string_lossy().into_owned()
    }

    fn handle(mixer: &Mixer) -> RodioHandle {
        RodioHandle::new(mixer.clone(), Fetcher::new(1 << 20, Duration::from_secs(5)))
    }

    #[test]
    fn looping_source_rewinds_and_starts() {
        let dir = tempdir().expect("tempdir");
        let location = write_wav(&dir, "brown_noise.wav", 200);
        let (mixer, _output) = detached_mixer();
        let mut noise = handle(&mixer);
        noise.set_looping(true);
        noise.set_source(&location);

        noise.seek(0.0).expect("rewind before first load");
        noise.play().expect("looping source starts");
        assert!(!noise.is_paused());

        noise.pause();
        noise.seek(0.0).expect("rewind a loaded loop");
        noise.play().expect("restart");
        assert!(!noise.is_paused());
        assert_eq!(noise.position(), 0.0);
    }

    #[test]
    fn pending_seek_positions_a_fresh_track() {
        let dir = tempdir().expect("tempdir");
        let location = write_wav(&dir, "a.wav", 500);
        let (mixer, _output) = detached_mixer();
        let mut track = handle(&mixer);
        track.subscribe();
        track.set_source(&location);

        track.seek(0.25).expect("seek before load");
        track.play().expect("play");
        assert!((track.position() - 0.25).abs() < 1e-9);

        let events = track.poll_events();
        assert!(matches!(events.first(), Some(HandleEvent::MetadataLoaded(d)) if (d - 0.5).abs() < 0.01));
    }

    #[test]
    fn undecodable_local_file_fails_the_start() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.mp3");
        fs::write(&path, b"not audio at all").expect("write");
        let (mixer, _output) = detached_mixer();
        let mut track = handle(&mixer);
        track.set_source(&path.to_string_lossy());

        let err = track.play().expect_err("decode failure");
        assert!(format!("{err:#}").contains("failed to decode"));
        assert!(track.is_paused());
    }

    #[test]
    fn remote_failure_arrives_as_an_event() {
        let (mixer, _output) = detached_mixer();
        let mut track = RodioHandle::new(mixer.clone(), Fetcher::new(1024, Duration::from_millis(300)));
        track.subscribe();
        // Port 9 on loopback has no listener, so the worker fails quickly.
        track.set_source("http://127.0.0.1:9/a.mp3");

        track.play().expect("download accepted");
        assert!(!track.is_paused(), "start is pending, not refused");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let failure = loop {
            let events = track.poll_events();
            if let Some(HandleEvent::Failed(message)) = events.into_iter().next() {
                break message;
            }
            assert!(std::time::Instant::now() < deadline, "download never settled");
            thread::sleep(Duration::from_millis(10));
        };
        assert!(failure.contains("failed to request"));
        assert!(track.is_paused());
    }
}
