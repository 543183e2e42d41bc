use anyhow::{Context, Result};
use futures::{Sink, SinkExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::audio::AudioFrame;

/// Upper bound on the closing handshake once stop is requested
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Outbound counters, readable while the sender is running
#[derive(Debug, Default)]
pub struct SenderProgress {
    chunks: AtomicU64,
    bytes: AtomicU64,
}

impl SenderProgress {
    pub fn chunks_sent(&self) -> u64 {
        self.chunks.load(Ordering::SeqCst)
    }

    /// Audio payload bytes, excluding the header
    pub fn bytes_sent(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

/// Stream captured audio over `sink`.
///
/// Sends `header` exactly once, then each frame as one binary message as
/// soon as it arrives. A failed send ends the loop with an error. When the
/// audio source runs dry the connection is kept open until `stop_rx` fires,
/// so results for the tail of the audio can still arrive. Every send is raced
/// against `stop_rx`, so a stalled peer cannot hold the task past stop. The
/// sink is closed on stop, bounded by [`CLOSE_TIMEOUT`].
pub async fn stream_audio<S>(
    mut sink: S,
    header: Vec<u8>,
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    mut stop_rx: watch::Receiver<bool>,
    progress: Arc<SenderProgress>,
) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    info!("Audio sender task started");

    tokio::select! {
        biased;
        sent = sink.send(Message::Binary(header)) => {
            sent.context("Failed to send audio header")?;
        }
        _ = wait_for_stop(&mut stop_rx) => {
            info!("Audio sender stopped before the header was sent");
            close_sink(&mut sink).await;
            return Ok(());
        }
    }

    loop {
        tokio::select! {
            _ = wait_for_stop(&mut stop_rx) => {
                info!("Audio sender stop requested");
                break;
            }
            frame = audio_rx.recv() => match frame {
                Some(frame) => {
                    let pcm = frame.to_pcm_bytes();
                    let len = pcm.len() as u64;

                    tokio::select! {
                        biased;
                        sent = sink.send(Message::Binary(pcm)) => {
                            sent.context("Failed to send audio chunk")?;
                        }
                        _ = wait_for_stop(&mut stop_rx) => {
                            warn!("Audio sender stop requested while a send was pending");
                            break;
                        }
                    }

                    progress.chunks.fetch_add(1, Ordering::SeqCst);
                    progress.bytes.fetch_add(len, Ordering::SeqCst);
                }
                None => {
                    info!(
                        "Audio source ended after {} chunks; waiting for stop",
                        progress.chunks_sent()
                    );
                    wait_for_stop(&mut stop_rx).await;
                    break;
                }
            }
        }
    }

    close_sink(&mut sink).await;

    info!("Audio sender task stopped");

    Ok(())
}

async fn close_sink<S>(sink: &mut S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to close connection: {}", e),
        Err(_) => warn!("Connection did not close within {:?}", CLOSE_TIMEOUT),
    }
}

/// Resolves once stop is signalled or the signalling side is gone
async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stop| *stop).await;
}
