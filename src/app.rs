use crate::audio::{AudioOutput, Fetcher, NullHandle, PlaybackHandle};
use crate::catalog::Catalog;
use crate::config;
use crate::dropdown::NoiseDropdown;
use crate::logging;
use crate::model::Settings;
use crate::noise::{NoiseMixer, NoiseVariant};
use crate::player::Player;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub catalog_path: Option<PathBuf>,
    pub folder: Option<PathBuf>,
    pub base_url: Option<String>,
    pub noise_base: Option<String>,
    pub null_audio: bool,
}

/// Everything the screen shows and the keys act on.
pub struct Session {
    pub player: Player,
    pub noise: NoiseMixer,
    pub dropdown: NoiseDropdown,
}

impl Session {
    pub fn new(
        catalog: Catalog,
        noise_base: &str,
        settings: &Settings,
        make_handle: impl Fn() -> Box<dyn PlaybackHandle>,
    ) -> Self {
        let mut player = Player::new(catalog, make_handle());
        player.update_volume(settings.volume);
        let mut noise = NoiseMixer::new(noise_base, |_| make_handle());
        noise.update_volume(settings.noise_volume);
        Self {
            player,
            noise,
            dropdown: NoiseDropdown::default(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.player.dirty || self.noise.dirty
    }

    pub fn mark_drawn(&mut self) {
        self.player.dirty = false;
        self.noise.dirty = false;
    }
}

enum Backend {
    Device(AudioOutput),
    Silent,
}

impl Backend {
    fn open(null_audio: bool, fetcher: Fetcher) -> Self {
        if null_audio {
            tracing::info!("audio output disabled by flag");
            return Self::Silent;
        }
        match AudioOutput::open_default(fetcher) {
            Ok(output) => Self::Device(output),
            Err(err) => {
                tracing::warn!("falling back to silent playback: {err:#}");
                Self::Silent
            }
        }
    }

    fn handle(&self) -> Box<dyn PlaybackHandle> {
        match self {
            Self::Device(output) => Box::new(output.handle()),
            Self::Silent => Box::new(NullHandle::new()),
        }
    }
}

pub fn run(options: AppOptions) -> Result<()> {
    let settings = config::load_settings()?;
    let log_path = logging::init(&settings.log_level)?;
    tracing::info!(log = %log_path.display(), "starting lofi");

    let catalog = load_catalog(&options, &settings)?;
    tracing::info!(tracks = catalog.len(), base = catalog.base(), "catalog ready");
    let noise_base = match options.noise_base.clone().or_else(|| settings.noise_base.clone()) {
        Some(base) => base,
        None => config::default_noise_base()?,
    };

    let fetcher = Fetcher::new(settings.fetch_limit_bytes, settings.fetch_timeout());
    let backend = Backend::open(options.null_audio, fetcher);
    let mut session = Session::new(catalog, &noise_base, &settings, || backend.handle());

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let terminal_backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(terminal_backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut session);

    // Restore the terminal even when the loop failed.
    let restored = restore_terminal(&mut terminal);
    drop(session);
    tracing::info!("stopped");
    result.and(restored)
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, session: &mut Session) -> Result<()> {
    let mut last_tick = Instant::now();
    loop {
        session.player.pump();
        session.noise.pump();

        if session.is_dirty() || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| crate::ui::draw(frame, session))?;
            session.mark_drawn();
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if handle_key(session, key) {
            return Ok(());
        }
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let cursor = terminal.show_cursor();
    raw?;
    screen?;
    cursor?;
    Ok(())
}

pub fn load_catalog(options: &AppOptions, settings: &Settings) -> Result<Catalog> {
    if let Some(folder) = &options.folder {
        return Ok(Catalog::scan_folder(folder));
    }

    let base = options.base_url.as_deref().unwrap_or(&settings.base_url);
    match options.catalog_path.as_ref().or(settings.catalog_path.as_ref()) {
        Some(path) => Catalog::from_json_file(path, base),
        None => Catalog::bundled(base),
    }
}

/// Applies one key press; returns `true` when the session should end.
pub fn handle_key(session: &mut Session, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Char('q') => return true,
        KeyCode::Char(' ') => session.player.toggle_play(),
        KeyCode::Char('n') => session.player.next_song(),
        KeyCode::Char('p') => session.player.previous_song(),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let next = session.player.volume() + VOLUME_STEP;
            session.player.update_volume(next);
        }
        KeyCode::Char('-') => {
            let next = session.player.volume() - VOLUME_STEP;
            session.player.update_volume(next);
        }
        KeyCode::Char('m') => session.player.toggle_mute(),
        KeyCode::Char('d') => {
            session.dropdown.toggle();
            session.player.dirty = true;
        }
        KeyCode::Esc => {
            session.dropdown.hide();
            session.player.dirty = true;
        }
        KeyCode::Char('1') => session.noise.toggle_noise(NoiseVariant::Brown),
        KeyCode::Char('2') => session.noise.toggle_noise(NoiseVariant::Green),
        KeyCode::Char('3') => session.noise.toggle_noise(NoiseVariant::White),
        KeyCode::Char(']') => {
            let next = session.noise.volume() + VOLUME_STEP;
            session.noise.update_volume(next);
        }
        KeyCode::Char('[') => {
            let next = session.noise.volume() - VOLUME_STEP;
            session.noise.update_volume(next);
        }
        KeyCode::Char('M') => session.noise.toggle_mute(),
        _ => {}
    }
    false
}
