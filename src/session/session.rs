use super::config::SessionConfig;
use super::dispatcher::{Dispatch, SegmentDispatcher};
use super::player::Player;
use super::receiver::receive_messages;
use super::sender::{stream_audio, SenderProgress};
use super::stats::{EndReason, SessionStats};
use crate::audio::{wave_header, AudioBackend};
use crate::translator::{TranslationTarget, TranslatorClient};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::{Sink, Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{error, info, warn};

/// How long teardown waits for the sender before aborting it
pub const SENDER_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// One duplex translation session: audio goes out, transcripts and
/// synthesized speech come back over the same connection
pub struct TranslationSession {
    /// Session configuration
    config: SessionConfig,

    /// Token issuing and connection setup
    client: TranslatorClient,

    /// Connection URL parameters
    target: TranslationTarget,

    /// Playback of completed segments
    player: Arc<dyn Player>,
}

impl TranslationSession {
    pub fn new(
        config: SessionConfig,
        client: TranslatorClient,
        target: TranslationTarget,
        player: Arc<dyn Player>,
    ) -> Self {
        Self {
            config,
            client,
            target,
            player,
        }
    }

    /// Authenticate, connect and stream until the connection ends or
    /// `shutdown` resolves.
    pub async fn run<F>(self, backend: Box<dyn AudioBackend>, shutdown: F) -> Result<SessionStats>
    where
        F: Future<Output = ()>,
    {
        info!("Starting translation session: {}", self.config.trace_id);

        // Rejects unsupported rates before anything goes on the wire
        let header = wave_header(self.config.sample_rate)?;

        let token = self
            .client
            .authenticate()
            .await
            .context("Failed to obtain access token")?;

        let socket = self.client.connect(&self.target, &token).await?;

        info!("Results location = {}", self.config.output_dir.display());

        let dispatcher = SegmentDispatcher::new(
            self.config.output_dir.clone(),
            self.config.output_extension.clone(),
            self.player,
        );

        run_duplex(&self.config, socket, backend, header, dispatcher, shutdown).await
    }
}

/// Drive an open connection: spawn the sender, run the receive loop on this
/// task, then tear everything down.
///
/// The session ends on the first of: connection closed or failed, sender
/// failure, segment storage failure, or `shutdown`. Once streaming has
/// started the result is always a summary; errors before that are returned.
pub async fn run_duplex<T, F>(
    config: &SessionConfig,
    socket: T,
    mut backend: Box<dyn AudioBackend>,
    header: Vec<u8>,
    mut dispatcher: SegmentDispatcher,
    shutdown: F,
) -> Result<SessionStats>
where
    T: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
    F: Future<Output = ()>,
{
    let started_at = Utc::now();

    let audio_rx = backend
        .start()
        .await
        .with_context(|| format!("Failed to start {}", backend.name()))?;
    info!("Capturing audio from {}", backend.name());

    let (sink, stream) = socket.split();
    let (stop_tx, stop_rx) = watch::channel(false);
    let progress = Arc::new(SenderProgress::default());

    let mut sender = tokio::spawn(stream_audio(
        sink,
        header,
        audio_rx,
        stop_rx,
        Arc::clone(&progress),
    ));
    let mut sender_done = false;

    let mut abandoned = None;
    let end_reason = tokio::select! {
        received = receive_messages(stream, &mut dispatcher) => match received {
            Ok(Dispatch::Disconnected { error, abandoned: open }) => {
                abandoned = open;
                error.map_or(EndReason::Closed, EndReason::TransportError)
            }
            Ok(_) => EndReason::Closed,
            Err(e) => {
                error!("Failed to store translation output: {:#}", e);
                EndReason::OutputFailed(format!("{:#}", e))
            }
        },
        joined = &mut sender => {
            sender_done = true;
            let reason = match joined {
                Ok(Ok(())) => "sender stopped unexpectedly".to_string(),
                Ok(Err(e)) => format!("{:#}", e),
                Err(e) => format!("sender task panicked: {}", e),
            };
            error!("Audio sender failed: {}", reason);
            EndReason::SenderFailed(reason)
        }
        _ = shutdown => {
            info!("Shutdown requested");
            EndReason::Interrupted
        }
    };

    // Teardown: stop sending, release the device, drop any partial segment
    let _ = stop_tx.send(true);
    if !sender_done {
        match tokio::time::timeout(SENDER_JOIN_TIMEOUT, &mut sender).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("Audio sender ended with error: {:#}", e),
            Ok(Err(e)) => error!("Audio sender task panicked: {}", e),
            Err(_) => {
                warn!(
                    "Audio sender still busy after {:?}, aborting it",
                    SENDER_JOIN_TIMEOUT
                );
                sender.abort();
            }
        }
    }

    if let Err(e) = backend.stop().await {
        error!("Failed to stop {}: {}", backend.name(), e);
    }

    match dispatcher.abandon_open_segment() {
        Ok(Some(open)) => abandoned = Some(open),
        Ok(None) => {}
        Err(e) => error!("Failed to close the open segment: {:#}", e),
    }

    let duration = Utc::now().signed_duration_since(started_at);
    let stats = SessionStats {
        trace_id: config.trace_id,
        started_at,
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        chunks_sent: progress.chunks_sent(),
        bytes_sent: progress.bytes_sent(),
        text_messages: dispatcher.text_messages(),
        segments: dispatcher.completed_segments().to_vec(),
        abandoned_segment: abandoned,
        end_reason,
    };

    info!(
        "Translation session {} ended ({:?}): {} chunks sent, {} segments played",
        stats.trace_id,
        stats.end_reason,
        stats.chunks_sent,
        stats.segments.len()
    );

    Ok(stats)
}
