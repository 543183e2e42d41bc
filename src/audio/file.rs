use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::header::{is_sample_rate_supported, BITS_PER_SAMPLE, CHANNELS};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != BITS_PER_SAMPLE {
            bail!(
                "Expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            samples,
        })
    }

    /// Check the file can be streamed unchanged at `sample_rate`.
    ///
    /// No resampling or downmixing is done: the file must already be mono at
    /// the session rate.
    pub fn ensure_stream_format(&self, sample_rate: u32) -> Result<()> {
        if self.channels != CHANNELS {
            bail!(
                "{} has {} channels; only mono input can be streamed",
                self.path,
                self.channels
            );
        }
        if self.sample_rate != sample_rate {
            bail!(
                "{} is {}Hz but the session streams at {}Hz",
                self.path,
                self.sample_rate,
                sample_rate
            );
        }
        Ok(())
    }
}

/// Replays a WAV file as if it were captured live
///
/// The frame channel closes after the last sample, which ends the session's
/// sender like a device disconnect would.
pub struct FileBackend {
    config: AudioBackendConfig,
    path: PathBuf,
    realtime: bool,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(config: AudioBackendConfig, path: PathBuf, realtime: bool) -> Result<Self> {
        if !is_sample_rate_supported(config.target_sample_rate) {
            bail!(
                "Unsupported capture sample rate: {} Hz",
                config.target_sample_rate
            );
        }
        if config.chunk_frames == 0 {
            bail!("Frame size must be at least one sample");
        }

        Ok(Self {
            config,
            path,
            realtime,
            task: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("Audio file loader panicked")??;
        audio.ensure_stream_format(self.config.target_sample_rate)?;

        let (tx, rx) = mpsc::channel(16);
        let config = self.config.clone();
        let frame_period = Duration::from_micros(
            config.chunk_frames as u64 * 1_000_000 / config.target_sample_rate as u64,
        );
        let realtime = self.realtime;

        info!(
            "Replaying {} ({} frames of {} samples, realtime={})",
            audio.path,
            audio.samples.len().div_ceil(config.chunk_frames),
            config.chunk_frames,
            realtime
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_period);
            let mut samples_emitted: u64 = 0;

            for chunk in audio.samples.chunks(config.chunk_frames) {
                if realtime {
                    ticker.tick().await;
                }

                let frame = config.frame(chunk.to_vec(), samples_emitted);
                samples_emitted += chunk.len() as u64;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            info!("File replay finished ({} samples)", samples_emitted);
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn name(&self) -> &str {
        "WAV file replay"
    }
}
