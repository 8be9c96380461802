use lofi::audio::{HandleEvent, NullHandle, PlaybackHandle};
use lofi::catalog::Catalog;
use lofi::model::TransportState;
use lofi::noise::{NoiseMixer, NoiseVariant};
use lofi::player::Player;
use std::thread;
use std::time::Duration;

fn two_track_player() -> Player {
    let catalog = Catalog::new(
        "https://example.test/",
        vec![String::from("a.mp3"), String::from("b.mp3")],
    );
    Player::new(catalog, Box::new(NullHandle::new()))
}

#[test]
fn next_then_previous_returns_to_original_track() {
    let mut player = two_track_player();
    let original = player.current_index().expect("track loaded");
    assert!(original < 2);
    assert!(player.history().is_empty());

    player.next_song();
    assert_eq!(player.history(), &[original]);
    assert_eq!(player.current_index(), Some(1 - original));
    assert!(player.is_playing());

    player.previous_song();
    assert!(player.history().is_empty());
    assert_eq!(player.current_index(), Some(original));
    assert_eq!(
        player.handle().source(),
        Some(format!("https://example.test/{}", ["a.mp3", "b.mp3"][original]).as_str())
    );
}

#[test]
fn finished_track_advances_automatically() {
    let catalog = Catalog::new("", vec![String::from("a.mp3"), String::from("b.mp3")]);
    let handle = NullHandle::new().with_duration(Duration::from_millis(20));
    let mut player = Player::new(catalog, Box::new(handle));
    player.toggle_play();
    let first = player.current_index().expect("track");

    player.pump();
    assert_eq!(player.duration_display(), "0:00");
    assert!(player.duration() > 0.0);

    thread::sleep(Duration::from_millis(40));
    player.pump();

    assert_eq!(player.history(), &[first]);
    assert_eq!(player.current_index(), Some(1 - first));
    assert_eq!(player.state(), TransportState::Playing);
}

#[test]
fn pausing_freezes_reported_time() {
    let mut player = two_track_player();
    player.toggle_play();
    thread::sleep(Duration::from_millis(20));
    player.pump();
    player.toggle_play();
    assert_eq!(player.state(), TransportState::Paused);

    player.pump();
    let frozen = player.elapsed();
    thread::sleep(Duration::from_millis(20));
    player.pump();
    assert_eq!(player.elapsed(), frozen);
}

#[test]
fn noise_layers_play_independently_of_the_player() {
    let mut player = two_track_player();
    let mut noise = NoiseMixer::new("", |_| Box::new(NullHandle::new()));

    player.toggle_play();
    noise.toggle_noise(NoiseVariant::Brown);
    noise.toggle_noise(NoiseVariant::Green);
    noise.update_volume(0.3);
    player.toggle_mute();

    assert!(player.is_muted());
    assert!(!noise.is_muted());
    assert_eq!(noise.active_variants().len(), 2);

    noise.toggle_noise(NoiseVariant::Green);
    assert!(noise.is_active(NoiseVariant::Brown));
    assert!(!noise.is_active(NoiseVariant::Green));
    assert!(player.is_playing());
}

#[test]
fn handle_events_dispatch_through_the_public_trait() {
    let mut handle = NullHandle::new().with_duration(Duration::from_secs(90));
    handle.subscribe();
    handle.set_source("track.mp3");
    handle.play().expect("play");

    let events = handle.poll_events();
    assert_eq!(events.first(), Some(&HandleEvent::MetadataLoaded(90.0)));
}
