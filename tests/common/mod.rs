// Shared helpers for integration tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use loqa_translate::session::Player;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Player stub that records every path it is asked to play
#[derive(Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<PathBuf>>,
}

impl RecordingPlayer {
    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

impl Player for RecordingPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Player stub whose every invocation fails
pub struct FailingPlayer;

impl Player for FailingPlayer {
    fn play(&self, _path: &Path) -> Result<()> {
        Err(anyhow!("decoder not installed"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Write a 16-bit PCM WAV file with a simple ramp signal
pub fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, sample_count: usize) -> Result<Vec<i16>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let samples: Vec<i16> = (0..sample_count).map(|i| (i % 2000) as i16 - 1000).collect();

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(samples)
}
