// End-to-end session tests over an in-memory WebSocket
//
// The client side runs the real session loop with a WAV file as the capture
// source; the server side is a scripted stand-in for the translation service.

mod common;

use anyhow::Result;
use common::{write_test_wav, RecordingPlayer};
use futures::{SinkExt, StreamExt};
use loqa_translate::audio::{wave_header, AudioBackendConfig, FileBackend};
use loqa_translate::session::{run_duplex, EndReason, SegmentDispatcher, SessionConfig};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const SAMPLE_RATE: u32 = 16000;
const CHUNK_FRAMES: usize = 1024;

async fn socket_pair() -> (
    WebSocketStream<tokio::io::DuplexStream>,
    WebSocketStream<tokio::io::DuplexStream>,
) {
    let (client_io, server_io) = tokio::io::duplex(256 * 1024);
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    (client, server)
}

fn file_backend(temp_dir: &TempDir, sample_count: usize) -> Result<(FileBackend, Vec<i16>)> {
    let wav_path = temp_dir.path().join("input.wav");
    let samples = write_test_wav(&wav_path, SAMPLE_RATE, 1, sample_count)?;
    let backend = FileBackend::new(
        AudioBackendConfig {
            target_sample_rate: SAMPLE_RATE,
            chunk_frames: CHUNK_FRAMES,
        },
        wav_path,
        false,
    )?;
    Ok((backend, samples))
}

#[tokio::test]
async fn test_session_streams_audio_and_plays_segments() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (backend, samples) = file_backend(&temp_dir, CHUNK_FRAMES * 4)?;
    let (client, mut server) = socket_pair().await;

    let config = SessionConfig::new(temp_dir.path(), SAMPLE_RATE, CHUNK_FRAMES);
    let player = Arc::new(RecordingPlayer::default());
    let dispatcher = SegmentDispatcher::new(config.output_dir.clone(), "mp3", player.clone());

    let service = tokio::spawn(async move {
        let mut inbound = Vec::new();

        // Header plus four full chunks
        while inbound.len() < 5 {
            match server.next().await {
                Some(Ok(Message::Binary(data))) => inbound.push(data),
                Some(Ok(_)) => {}
                other => panic!("unexpected inbound item: {:?}", other),
            }
        }

        server
            .send(Message::Text(
                r#"{"type":"final","id":"0","recognition":"hello","translation":"hallo"}"#.to_string(),
            ))
            .await?;
        server.send(Message::Binary(b"AAABBB".to_vec())).await?;
        server.send(Message::Binary(b"CCC".to_vec())).await?;
        server.close(None).await?;

        // Drain until the client completes the closing handshake
        while let Some(Ok(_)) = server.next().await {}

        anyhow::Ok(inbound)
    });

    let stats = run_duplex(
        &config,
        client,
        Box::new(backend),
        wave_header(SAMPLE_RATE)?,
        dispatcher,
        std::future::pending::<()>(),
    )
    .await?;

    let inbound = service.await??;

    // Outbound: header first, then the PCM samples unchanged
    assert_eq!(inbound[0], wave_header(SAMPLE_RATE)?);
    let pcm: Vec<u8> = inbound[1..].concat();
    let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    assert_eq!(pcm, expected);
    assert!(inbound[1..].iter().all(|chunk| chunk.len() == CHUNK_FRAMES * 2));

    // Inbound: one text result and two segments, played in order
    assert_eq!(stats.end_reason, EndReason::Closed);
    assert_eq!(stats.chunks_sent, 4);
    assert_eq!(stats.bytes_sent, (CHUNK_FRAMES * 4 * 2) as u64);
    assert_eq!(stats.text_messages, 1);
    assert_eq!(stats.segments.len(), 2);
    assert!(stats.abandoned_segment.is_none());

    assert!(stats.segments[0].path.ends_with("tts_1.mp3"));
    assert_eq!(fs::read(&stats.segments[0].path)?, b"AAABBB");
    assert!(stats.segments[1].path.ends_with("tts_2.mp3"));
    assert_eq!(fs::read(&stats.segments[1].path)?, b"CCC");

    assert!(stats.segments[0].path.starts_with(&config.output_dir));
    assert_eq!(
        player.played(),
        vec![stats.segments[0].path.clone(), stats.segments[1].path.clone()]
    );
    assert_eq!(stats.trace_id, config.trace_id);

    Ok(())
}

#[tokio::test]
async fn test_session_interrupted_by_shutdown_signal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (backend, _samples) = file_backend(&temp_dir, CHUNK_FRAMES * 2)?;
    let (client, mut server) = socket_pair().await;

    let config = SessionConfig::new(temp_dir.path(), SAMPLE_RATE, CHUNK_FRAMES);
    let player = Arc::new(RecordingPlayer::default());
    let dispatcher = SegmentDispatcher::new(config.output_dir.clone(), "mp3", player.clone());

    let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();

    let service = tokio::spawn(async move {
        let mut interrupt_tx = Some(interrupt_tx);
        let mut saw_close = false;

        while let Some(item) = server.next().await {
            match item {
                Ok(Message::Binary(_)) => {
                    // Interrupt as soon as the header arrives
                    if let Some(tx) = interrupt_tx.take() {
                        let _ = tx.send(());
                    }
                }
                Ok(Message::Close(_)) => saw_close = true,
                Ok(_) => {}
                Err(_) => break,
            }
        }

        saw_close
    });

    let stats = run_duplex(
        &config,
        client,
        Box::new(backend),
        wave_header(SAMPLE_RATE)?,
        dispatcher,
        async {
            let _ = interrupt_rx.await;
        },
    )
    .await?;

    assert_eq!(stats.end_reason, EndReason::Interrupted);
    assert!(stats.segments.is_empty());
    assert!(player.played().is_empty());
    assert!(!config.output_dir.exists(), "no segment, no output directory");

    assert!(service.await?, "client should close the connection on shutdown");

    Ok(())
}

#[tokio::test]
async fn test_session_rejects_file_at_wrong_rate() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let wav_path = temp_dir.path().join("8k.wav");
    write_test_wav(&wav_path, 8000, 1, 800)?;

    let backend = FileBackend::new(
        AudioBackendConfig {
            target_sample_rate: SAMPLE_RATE,
            chunk_frames: CHUNK_FRAMES,
        },
        wav_path,
        false,
    )?;
    let (client, _server) = socket_pair().await;

    let config = SessionConfig::new(temp_dir.path(), SAMPLE_RATE, CHUNK_FRAMES);
    let dispatcher = SegmentDispatcher::new(
        config.output_dir.clone(),
        "mp3",
        Arc::new(RecordingPlayer::default()),
    );

    let result = run_duplex(
        &config,
        client,
        Box::new(backend),
        wave_header(SAMPLE_RATE)?,
        dispatcher,
        std::future::pending::<()>(),
    )
    .await;

    assert!(result.is_err(), "capture must fail before streaming starts");

    Ok(())
}

#[tokio::test]
async fn test_shutdown_completes_when_peer_stops_reading() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (backend, _samples) = file_backend(&temp_dir, CHUNK_FRAMES * 8)?;

    // The header fits in the pipe, the first chunk does not, and the peer
    // never drains it
    let (client_io, _stalled_peer) = tokio::io::duplex(128);
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

    let config = SessionConfig::new(temp_dir.path(), SAMPLE_RATE, CHUNK_FRAMES);
    let dispatcher = SegmentDispatcher::new(
        config.output_dir.clone(),
        "mp3",
        Arc::new(RecordingPlayer::default()),
    );

    let session = run_duplex(
        &config,
        client,
        Box::new(backend),
        wave_header(SAMPLE_RATE)?,
        dispatcher,
        tokio::time::sleep(Duration::from_millis(200)),
    );

    let stats = tokio::time::timeout(Duration::from_secs(10), session)
        .await
        .map_err(|_| anyhow::anyhow!("session did not end after shutdown"))??;

    assert_eq!(stats.end_reason, EndReason::Interrupted);
    assert_eq!(stats.chunks_sent, 0);

    Ok(())
}

#[tokio::test]
async fn test_segment_storage_failure_ends_with_summary() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (backend, _samples) = file_backend(&temp_dir, CHUNK_FRAMES)?;
    let (client, mut server) = socket_pair().await;

    // A plain file where the per-run directory's parent should be
    let blocked_root = temp_dir.path().join("blocked");
    fs::write(&blocked_root, b"not a directory")?;

    let config = SessionConfig::new(&blocked_root, SAMPLE_RATE, CHUNK_FRAMES);
    let player = Arc::new(RecordingPlayer::default());
    let dispatcher = SegmentDispatcher::new(config.output_dir.clone(), "mp3", player.clone());

    let service = tokio::spawn(async move {
        server.send(Message::Binary(b"AAA".to_vec())).await?;
        while let Some(Ok(_)) = server.next().await {}
        anyhow::Ok(())
    });

    let stats = run_duplex(
        &config,
        client,
        Box::new(backend),
        wave_header(SAMPLE_RATE)?,
        dispatcher,
        std::future::pending::<()>(),
    )
    .await?;

    match &stats.end_reason {
        EndReason::OutputFailed(detail) => {
            assert!(detail.contains("output directory"), "detail: {}", detail)
        }
        other => panic!("unexpected end reason: {:?}", other),
    }
    assert!(stats.segments.is_empty());
    assert!(stats.abandoned_segment.is_none());
    assert!(player.played().is_empty());

    service.await??;

    Ok(())
}
