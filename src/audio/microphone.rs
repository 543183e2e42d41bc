// Microphone capture backend using cpal
//
// The cpal stream handle is not Send, so it is built and owned by a dedicated
// capture thread. The device runs at its default config; the audio callback
// converts its buffers into fixed-size session frames and forwards them
// through a bounded channel. The callback does no logging: dropped frames and
// conversion failures are counted and reported by the capture thread.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::header::is_sample_rate_supported;
use super::resampler::CaptureConverter;

/// Frames buffered between the audio callback and the sender
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// How often the capture thread reports callback trouble
const HEALTH_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Written by the audio callback, read by the capture thread
#[derive(Debug, Default)]
struct CaptureHealth {
    dropped_frames: AtomicU64,
    failed_buffers: AtomicU64,
}

pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    device_name: Option<String>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig, device_name: Option<String>) -> Result<Self> {
        if !is_sample_rate_supported(config.target_sample_rate) {
            bail!(
                "Unsupported capture sample rate: {} Hz",
                config.target_sample_rate
            );
        }
        if config.chunk_frames == 0 {
            bail!("Frame size must be at least one sample");
        }

        info!(
            "Microphone backend initialized ({}Hz, {} samples per frame)",
            config.target_sample_rate, config.chunk_frames
        );

        Ok(Self {
            config,
            device_name,
            stop_tx: None,
            worker: None,
            capturing: false,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<String>>();

        let config = self.config.clone();
        let device_name = self.device_name.clone();

        let worker = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let health = Arc::new(CaptureHealth::default());
                let (stream, name) = match open_input_stream(
                    &config,
                    device_name.as_deref(),
                    frame_tx,
                    Arc::clone(&health),
                ) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(name));

                // Run until stop() is called or the backend is dropped
                let mut reported = (0, 0);
                while let Err(std_mpsc::RecvTimeoutError::Timeout) =
                    stop_rx.recv_timeout(HEALTH_REPORT_INTERVAL)
                {
                    reported = report_health(&health, reported);
                }
                report_health(&health, reported);
                drop(stream);
            })
            .context("Failed to spawn capture thread")?;

        let device = match ready_rx.await {
            Ok(result) => result?,
            Err(_) => bail!("Capture thread exited before the input stream was ready"),
        };

        info!("Microphone capture started on '{}'", device);

        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        self.capturing = true;

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        info!("Stopping microphone capture");

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .context("Failed to join capture thread")?
                .map_err(|_| anyhow!("Capture thread panicked"))?;
        }

        self.capturing = false;

        info!("Microphone capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

fn select_device(host: &cpal::Host, device_name: Option<&str>) -> Result<cpal::Device> {
    match device_name {
        Some(wanted) => host
            .input_devices()
            .context("Failed to enumerate input devices")?
            .find(|device| {
                device
                    .description()
                    .map(|d| d.to_string() == wanted)
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("Input device '{}' not found", wanted)),
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device available")),
    }
}

/// Log callback trouble seen since `reported`; returns the new totals
fn report_health(health: &CaptureHealth, reported: (u64, u64)) -> (u64, u64) {
    let dropped = health.dropped_frames.load(Ordering::Relaxed);
    let failed = health.failed_buffers.load(Ordering::Relaxed);

    if dropped > reported.0 {
        warn!(
            "{} audio frame(s) dropped: sender is not keeping up",
            dropped - reported.0
        );
    }
    if failed > reported.1 {
        warn!(
            "{} capture buffer(s) could not be converted",
            failed - reported.1
        );
    }

    (dropped, failed)
}

fn open_input_stream(
    config: &AudioBackendConfig,
    device_name: Option<&str>,
    frame_tx: mpsc::Sender<AudioFrame>,
    health: Arc<CaptureHealth>,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name)?;
    let name = device
        .description()
        .map(|d| d.to_string())
        .unwrap_or_else(|_| "unknown device".to_string());

    let supported = device
        .default_input_config()
        .with_context(|| format!("Failed to query input config of '{}'", name))?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    let converter = CaptureConverter::new(
        stream_config.sample_rate,
        stream_config.channels,
        config.clone(),
    )?;

    info!(
        "Opening '{}' at {}Hz, {} channel(s), {} ({})",
        name,
        stream_config.sample_rate,
        stream_config.channels,
        sample_format,
        if converter.is_resampling() {
            format!("resampled to {}Hz", config.target_sample_rate)
        } else {
            "no resampling".to_string()
        }
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &stream_config, converter, frame_tx, health)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &stream_config, converter, frame_tx, health)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &stream_config, converter, frame_tx, health)
        }
        other => bail!("Unsupported input sample format on '{}': {}", name, other),
    }
    .with_context(|| format!("Failed to open input stream on '{}'", name))?;

    stream.play().context("Failed to start input stream")?;

    Ok((stream, name))
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut converter: CaptureConverter,
    frame_tx: mpsc::Sender<AudioFrame>,
    health: Arc<CaptureHealth>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let stream = device.build_input_stream(
        stream_config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let converted = converter.push(data, &mut |frame: AudioFrame| {
                if let Err(mpsc::error::TrySendError::Full(_)) = frame_tx.try_send(frame) {
                    health.dropped_frames.fetch_add(1, Ordering::Relaxed);
                }
            });
            if converted.is_err() {
                health.failed_buffers.fetch_add(1, Ordering::Relaxed);
            }
        },
        |e| error!("Input stream error: {}", e),
        None,
    )?;

    Ok(stream)
}
