//! Integration tests for cadence-io: WAV files feeding running patches.

use cadence_core::objects::{Convolution, Tabread, TabreadMode};
use cadence_core::{Context, ContextConfig, Route};
use cadence_io::{WavSpec, load_table_from_wav, read_wav, write_wav, write_wav_interleaved};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Table preloading
// ---------------------------------------------------------------------------

#[test]
fn loaded_sample_plays_through_stoppable_reader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hit.wav");
    let hit: Vec<f32> = (0..24).map(|i| 1.0 - i as f32 / 24.0).collect();
    write_wav(&path, &hit, WavSpec::default()).unwrap();

    let mut cx = Context::with_config(ContextConfig::new(48000.0).with_channels(0, 1)).unwrap();
    load_table_from_wav(&mut cx, "sample", &path).unwrap();
    let id = cx.tables().id("sample").unwrap();
    let player = cx.add_object(Box::new(Tabread::new(id, TabreadMode::Stoppable)));
    let out = cx.add_output(0).unwrap();
    cx.connect(player, out, 0).unwrap();
    cx.add_route("play", Route::inlet(player, 0)).unwrap();
    cx.compile().unwrap();

    cx.send_bang("play").unwrap();
    let mut rendered = vec![0.0; 32];
    cx.process(&[], &mut [&mut rendered], 32).unwrap();
    assert_eq!(&rendered[..24], hit.as_slice());
    assert!(rendered[24..].iter().all(|&s| s == 0.0));
}

#[test]
fn stereo_impulse_response_is_mixed_to_mono() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ir.wav");
    let spec = WavSpec {
        channels: 2,
        ..WavSpec::default()
    };
    // left [1, 0], right [0, 1] mixes to [0.5, 0.5]
    write_wav_interleaved(&path, &[1.0, 0.0, 0.0, 1.0], spec).unwrap();

    let mut cx = Context::with_config(ContextConfig::new(48000.0).with_channels(1, 1)).unwrap();
    load_table_from_wav(&mut cx, "ir", &path).unwrap();
    let ir = cx.tables().id("ir").unwrap();
    let input = cx.add_input(0).unwrap();
    let conv = cx.add_object(Box::new(Convolution::new(ir)));
    let out = cx.add_output(0).unwrap();
    cx.connect(input, conv, 0).unwrap();
    cx.connect(conv, out, 0).unwrap();
    cx.compile().unwrap();

    let mut impulse = [0.0; 8];
    impulse[0] = 1.0;
    let mut rendered = [0.0; 8];
    cx.process(&[&impulse], &mut [&mut rendered], 8).unwrap();
    assert_eq!(rendered, [0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

// ---------------------------------------------------------------------------
// Rendering to file
// ---------------------------------------------------------------------------

#[test]
fn rendered_block_roundtrips_through_24_bit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("render.wav");
    let samples: Vec<f32> = (0..480).map(|i| (i as f32 * 0.05).sin() * 0.8).collect();
    let spec = WavSpec {
        bits_per_sample: 24,
        sample_rate: 44100,
        ..WavSpec::default()
    };
    write_wav(&path, &samples, spec).unwrap();

    let (loaded, loaded_spec) = read_wav(&path).unwrap();
    assert_eq!(loaded_spec, spec);
    for (a, b) in samples.iter().zip(&loaded) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
}
