//! Conversion from a device's native capture format to session frames
//!
//! Input devices usually run at 44.1 or 48 kHz, often in stereo and with
//! float samples. [`CaptureConverter`] downmixes to mono, resamples to the
//! session rate and cuts the result into fixed-size 16-bit frames.

use anyhow::{Context, Result};
use cpal::{FromSample, Sample};
use rubato::{FftFixedInOut, Resampler};
use std::collections::VecDeque;

use super::backend::{AudioBackendConfig, AudioFrame};

/// Input frames per FFT block; rubato rounds this to fit the rate ratio
const RESAMPLER_BLOCK: usize = 1024;

/// FFT-based mono resampler accepting input of any length
struct StreamingResampler {
    resampler: FftFixedInOut<f32>,
    queue: VecDeque<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl StreamingResampler {
    fn new(from_rate: u32, to_rate: u32) -> Result<Self> {
        let resampler =
            FftFixedInOut::new(from_rate as usize, to_rate as usize, RESAMPLER_BLOCK, 1)
                .with_context(|| {
                    format!("Failed to build a {}Hz to {}Hz resampler", from_rate, to_rate)
                })?;

        let input = Vec::with_capacity(resampler.input_frames_max());
        let output = resampler.output_buffer_allocate(true).swap_remove(0);

        Ok(Self {
            queue: VecDeque::with_capacity(resampler.input_frames_max() * 2),
            resampler,
            input,
            output,
        })
    }

    /// Queue `samples` and emit output for every complete block
    fn process(&mut self, samples: &[f32], emit: &mut dyn FnMut(&[f32])) -> Result<()> {
        self.queue.extend(samples);

        loop {
            let wanted = self.resampler.input_frames_next();
            if self.queue.len() < wanted {
                break;
            }

            self.input.clear();
            self.input.extend(self.queue.drain(..wanted));

            let (_, written) = self
                .resampler
                .process_into_buffer(&[&self.input], &mut [&mut self.output], None)
                .context("Resampling failed")?;

            if written > 0 {
                emit(&self.output[..written]);
            }
        }

        Ok(())
    }
}

/// Collects mono samples into frames of `chunk_frames`
struct FrameAssembler {
    framing: AudioBackendConfig,
    pending: Vec<i16>,
    samples_emitted: u64,
}

impl FrameAssembler {
    fn push(&mut self, samples: &[f32], emit: &mut dyn FnMut(AudioFrame)) {
        let chunk_frames = self.framing.chunk_frames;

        for &sample in samples {
            self.pending.push(to_i16(sample));

            if self.pending.len() == chunk_frames {
                let samples =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(chunk_frames));
                emit(self.framing.frame(samples, self.samples_emitted));
                self.samples_emitted += chunk_frames as u64;
            }
        }
    }
}

/// Device samples in, session frames out
pub struct CaptureConverter {
    channels: usize,
    mono: Vec<f32>,
    resampler: Option<StreamingResampler>,
    assembler: FrameAssembler,
}

impl CaptureConverter {
    /// `device_rate` and `device_channels` describe the interleaved input;
    /// `framing` holds the session rate and frame size.
    pub fn new(device_rate: u32, device_channels: u16, framing: AudioBackendConfig) -> Result<Self> {
        anyhow::ensure!(device_channels > 0, "Input device reports zero channels");
        anyhow::ensure!(framing.chunk_frames > 0, "Frame size must be at least one sample");

        let resampler = if device_rate == framing.target_sample_rate {
            None
        } else {
            Some(StreamingResampler::new(device_rate, framing.target_sample_rate)?)
        };

        Ok(Self {
            channels: device_channels as usize,
            mono: Vec::with_capacity(RESAMPLER_BLOCK),
            resampler,
            assembler: FrameAssembler {
                pending: Vec::with_capacity(framing.chunk_frames),
                framing,
                samples_emitted: 0,
            },
        })
    }

    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Convert one interleaved device buffer, emitting each completed frame.
    ///
    /// A trailing partial device frame is ignored.
    pub fn push<T>(&mut self, interleaved: &[T], emit: &mut dyn FnMut(AudioFrame)) -> Result<()>
    where
        T: Sample,
        f32: FromSample<T>,
    {
        self.mono.clear();
        let scale = 1.0 / self.channels as f32;
        self.mono.extend(interleaved.chunks_exact(self.channels).map(|frame| {
            frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() * scale
        }));

        let assembler = &mut self.assembler;
        match &mut self.resampler {
            Some(resampler) => {
                resampler.process(&self.mono, &mut |resampled: &[f32]| {
                    assembler.push(resampled, emit)
                })
            }
            None => {
                assembler.push(&self.mono, emit);
                Ok(())
            }
        }
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framing(rate: u32, chunk_frames: usize) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: rate,
            chunk_frames,
        }
    }

    fn collect<T>(converter: &mut CaptureConverter, input: &[T]) -> Vec<AudioFrame>
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let mut frames = Vec::new();
        converter
            .push(input, &mut |frame: AudioFrame| frames.push(frame))
            .unwrap();
        frames
    }

    #[test]
    fn test_mono_i16_at_session_rate_passes_through() {
        let mut converter = CaptureConverter::new(16000, 1, framing(16000, 4)).unwrap();
        assert!(!converter.is_resampling());

        let input: Vec<i16> = vec![0, 1, -1, 32767, -32768, 1000, -1000, 42, 7];
        let frames = collect(&mut converter, &input);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples, vec![0, 1, -1, 32767]);
        assert_eq!(frames[1].samples, vec![-32768, 1000, -1000, 42]);

        // The leftover sample starts the next frame
        let frames = collect(&mut converter, &[1i16, 2, 3]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![7, 1, 2, 3]);
    }

    #[test]
    fn test_stereo_float_is_downmixed_and_clamped() {
        let mut converter = CaptureConverter::new(8000, 2, framing(8000, 3)).unwrap();

        let input: Vec<f32> = vec![0.5, 0.5, 1.0, -1.0, 2.0, 2.0];
        let frames = collect(&mut converter, &input);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![16384, 0, 32767]);
        assert_eq!(frames[0].sample_rate, 8000);
        assert_eq!(frames[0].channels, 1);
    }

    #[test]
    fn test_48k_input_is_resampled_to_16k() {
        let mut converter = CaptureConverter::new(48000, 1, framing(16000, 1024)).unwrap();
        assert!(converter.is_resampling());

        // One second of a 440 Hz tone, fed in uneven device-sized buffers
        let input: Vec<f32> = (0..48000)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 48000.0).sin() * 0.5)
            .collect();

        let mut frames = Vec::new();
        for buffer in input.chunks(480) {
            frames.extend(collect(&mut converter, buffer));
        }

        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert!(frames.iter().all(|f| f.samples.len() == 1024));
        assert!((14..=15).contains(&frames.len()), "got {} frames", frames.len());
        assert!(total <= 16000);

        // Timestamps follow the session rate, not the device rate
        assert_eq!(frames[1].timestamp_ms, 64);
        assert_eq!(frames[2].timestamp_ms, 128);
    }

    #[test]
    fn test_rejects_zero_channels() {
        assert!(CaptureConverter::new(48000, 0, framing(16000, 1024)).is_err());
    }
}
