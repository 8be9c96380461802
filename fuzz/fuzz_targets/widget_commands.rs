#![no_main]

use libfuzzer_sys::fuzz_target;
use lofi::audio::NullHandle;
use lofi::catalog::Catalog;
use lofi::noise::{NoiseMixer, NoiseVariant};
use lofi::player::Player;

fuzz_target!(|data: &[u8]| {
    let len = data.first().map_or(0, |byte| usize::from(byte % 16));
    let catalog = Catalog::new("", (0..len).map(|idx| format!("track_{idx}.mp3")).collect());
    let mut player = Player::new(catalog, Box::new(NullHandle::new()));
    let mut noise = NoiseMixer::new("", |_| Box::new(NullHandle::new()));

    for byte in data.iter().skip(1) {
        match byte % 9 {
            0 => player.toggle_play(),
            1 => player.next_song(),
            2 => player.previous_song(),
            3 => player.update_volume(f32::from(*byte) / 255.0),
            4 => player.toggle_mute(),
            5 => {
                player.pump();
                noise.pump();
            }
            6 => noise.toggle_noise(NoiseVariant::ALL[usize::from(*byte) % 3]),
            7 => noise.update_volume(f32::from(*byte) / 128.0 - 0.5),
            _ => noise.toggle_mute(),
        }

        if let Some(idx) = player.current_index() {
            assert!(idx < len);
        }
        assert!(player.history().iter().all(|idx| *idx < len));
        assert!((0.0..=1.0).contains(&player.volume()));
        assert!((0.0..=1.0).contains(&noise.volume()));
    }
});
