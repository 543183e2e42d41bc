use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::header::CHANNELS;

/// Audio sample data (16-bit PCM, mono)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Little-endian PCM bytes, as sent on the wire
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Capture sample rate (8kHz or 16kHz)
    pub target_sample_rate: u32,
    /// Number of samples per emitted frame
    pub chunk_frames: usize,
}

impl AudioBackendConfig {
    /// Capture timestamp of the frame starting at `samples_emitted`
    pub fn timestamp_ms(&self, samples_emitted: u64) -> u64 {
        samples_emitted * 1000 / self.target_sample_rate as u64
    }

    pub fn frame(&self, samples: Vec<i16>, samples_emitted: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: self.target_sample_rate,
            channels: CHANNELS,
            timestamp_ms: self.timestamp_ms(samples_emitted),
        }
    }
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz
            chunk_frames: 1024,        // 64ms at 16kHz
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default (or named) input device
/// - File: replay a mono 16-bit WAV file (testing/offline translation)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend for the requested source
    pub fn create(
        source: AudioSource,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone { device } => {
                use super::microphone::MicrophoneBackend;
                Ok(Box::new(MicrophoneBackend::new(config, device)?))
            }

            AudioSource::File { path, realtime } => {
                use super::file::FileBackend;
                Ok(Box::new(FileBackend::new(config, path, realtime)?))
            }
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Microphone input, optionally selected by device name
    Microphone { device: Option<String> },
    /// WAV file input; `realtime` paces frames at the capture rate
    File { path: PathBuf, realtime: bool },
}
