//! Clip library loading from real WAV files

mod helpers;

use helpers::{generate_clip, generate_sine_wav, TestMedia};
use mediarb::audio::OutputFormat;
use mediarb::error::Error;
use mediarb::library::ClipLibrary;
use mediarb_common::ArbiterConfig;
use std::path::PathBuf;

#[test]
fn test_stock_media_loads() {
    let media = TestMedia::new();
    let library = ClipLibrary::load(&media.config(), OutputFormat::default()).unwrap();

    assert_eq!(library.len(), 3);
    let futur = library.track("futur").unwrap();
    assert_eq!(futur.format, OutputFormat::default());
    assert_eq!(futur.frame_count, 44100);

    let effect = library.effect("effet1").unwrap();
    let ms = effect.duration().as_millis();
    assert!((295..=305).contains(&ms), "effect lasts {}ms", ms);
}

#[test]
fn test_clips_are_converted_to_output_format() {
    let media = TestMedia::new();
    generate_sine_wav(media.path("mono22k.wav"), 500, 22050, 1, 220.0).unwrap();

    let mut config = media.config();
    config.tracks.insert("mono22k".to_string(), PathBuf::from("mono22k.wav"));

    let library = ClipLibrary::load(&config, OutputFormat::default()).unwrap();
    let clip = library.track("mono22k").unwrap();

    assert_eq!(clip.format.channels, 2);
    assert_eq!(clip.format.sample_rate, 44100);
    assert_eq!(clip.samples.len(), clip.frame_count * 2);

    // 0.5s at 44.1kHz, allowing for resampler edge effects
    assert!(
        clip.frame_count > 20_000 && clip.frame_count < 24_000,
        "got {} frames",
        clip.frame_count
    );
}

#[test]
fn test_missing_clip_names_the_clip() {
    let media = TestMedia::new();
    std::fs::remove_file(media.path("effet1.wav")).unwrap();

    match ClipLibrary::load(&media.config(), OutputFormat::default()) {
        Err(Error::ClipLoad { name, path, .. }) => {
            assert_eq!(name, "effet1");
            assert_eq!(path, media.path("effet1.wav"));
        }
        other => panic!("Expected ClipLoad error, got {:?}", other.map(|l| l.len())),
    }
}

#[test]
fn test_corrupt_clip_is_fatal() {
    let media = TestMedia::new();
    std::fs::write(media.path("medieval.wav"), b"RIFF garbage").unwrap();

    let result = ClipLibrary::load(&media.config(), OutputFormat::default());
    assert!(matches!(result, Err(Error::ClipLoad { ref name, .. }) if name == "medieval"));
}

#[test]
fn test_absolute_paths_ignore_media_root() {
    let media = TestMedia::new();
    let elsewhere = tempfile::TempDir::new().unwrap();
    let absolute = elsewhere.path().join("abs.wav");
    generate_clip(&absolute, 100).unwrap();

    let mut config = ArbiterConfig::default();
    config.media_root = Some(media.dir.path().to_path_buf());
    config.tracks.insert("abs".to_string(), absolute);

    let library = ClipLibrary::load(&config, OutputFormat::default()).unwrap();
    assert!(library.track("abs").is_some());
}
