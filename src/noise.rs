use crate::audio::{HandleEvent, PlaybackHandle};
use crate::catalog;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoiseVariant {
    Brown,
    Green,
    White,
}

impl NoiseVariant {
    pub const ALL: [Self; 3] = [Self::Brown, Self::Green, Self::White];

    pub fn label(self) -> &'static str {
        match self {
            Self::Brown => "Brown",
            Self::Green => "Green",
            Self::White => "White",
        }
    }

    /// Asset file looped for this variant; the green slot plays the blue-noise recording.
    pub fn asset(self) -> &'static str {
        match self {
            Self::Brown => "brown_noise.mp3",
            Self::Green => "blue_noise.mp3",
            Self::White => "white_noise.mp3",
        }
    }
}

struct NoiseChannel {
    active: bool,
    handle: Box<dyn PlaybackHandle>,
}

/// Independent looping noise channels behind one shared volume control.
pub struct NoiseMixer {
    channels: BTreeMap<NoiseVariant, NoiseChannel>,
    volume: f32,
    previous_volume: f32,
    pub status: String,
    pub dirty: bool,
}

impl NoiseMixer {
    pub fn new(
        base: &str,
        mut make_handle: impl FnMut(NoiseVariant) -> Box<dyn PlaybackHandle>,
    ) -> Self {
        let volume = 1.0;
        let channels = NoiseVariant::ALL
            .into_iter()
            .map(|variant| {
                let mut handle = make_handle(variant);
                handle.set_looping(true);
                handle.set_volume(volume);
                handle.set_source(&catalog::resolve(base, variant.asset()));
                handle.subscribe();
                (
                    variant,
                    NoiseChannel {
                        active: false,
                        handle,
                    },
                )
            })
            .collect();

        Self {
            channels,
            volume,
            previous_volume: volume,
            status: String::new(),
            dirty: true,
        }
    }

    /// Stops an active variant, or restarts an inactive one from the top.
    ///
    /// A variant is only marked active once its handle accepted the start request.
    pub fn toggle_noise(&mut self, variant: NoiseVariant) {
        let Some(channel) = self.channels.get_mut(&variant) else {
            return;
        };

        if channel.active {
            channel.handle.pause();
            channel.active = false;
            self.status = format!("{} noise off", variant.label());
            self.dirty = true;
            return;
        }

        match channel.handle.seek(0.0).and_then(|()| channel.handle.play()) {
            Ok(()) => {
                channel.active = true;
                self.status = format!("{} noise on", variant.label());
            }
            Err(err) => {
                tracing::warn!("failed to play {} noise: {err:#}", variant.label());
                self.status = format!("Failed to play {} noise: {err:#}", variant.label());
            }
        }
        self.dirty = true;
    }

    /// Drains handle events; a start that fails after being accepted turns the variant off.
    pub fn pump(&mut self) {
        for (variant, channel) in &mut self.channels {
            for event in channel.handle.poll_events() {
                let HandleEvent::Failed(message) = event else {
                    continue;
                };
                tracing::warn!("failed to play {} noise: {message}", variant.label());
                channel.active = false;
                self.status = format!("Failed to play {} noise: {message}", variant.label());
                self.dirty = true;
            }
        }
    }

    pub fn update_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        if self.volume == 0.0 {
            self.volume = self.previous_volume;
        } else {
            self.previous_volume = self.volume;
            self.volume = 0.0;
        }
        self.apply_volume();
    }

    pub fn is_active(&self, variant: NoiseVariant) -> bool {
        self.channels
            .get(&variant)
            .is_some_and(|channel| channel.active)
    }

    pub fn active_variants(&self) -> Vec<NoiseVariant> {
        self.channels
            .iter()
            .filter(|(_, channel)| channel.active)
            .map(|(variant, _)| *variant)
            .collect()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.volume == 0.0
    }

    fn apply_volume(&mut self) {
        for channel in self.channels.values_mut() {
            channel.handle.set_volume(self.volume);
        }
        self.dirty = true;
    }
}

impl Drop for NoiseMixer {
    fn drop(&mut self) {
        for channel in self.channels.values_mut() {
            channel.handle.pause();
            channel.handle.unsubscribe();
        }
    }
}
