// External player tests
//
// `sh` stands in for the decoder: each "segment" is a small script, so
// running it leaves a trace that the test can inspect.

#![cfg(unix)]

use anyhow::Result;
use loqa_translate::session::{CommandPlayer, Player};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_segment(dir: &TempDir, index: usize, log: &PathBuf) -> Result<PathBuf> {
    let path = dir.path().join(format!("tts_{}.sh", index));
    fs::write(
        &path,
        format!("sleep 0.2\necho {} >> '{}'\n", index, log.display()),
    )?;
    Ok(path)
}

#[tokio::test]
async fn test_finish_plays_every_queued_segment_in_order() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let log = temp_dir.path().join("played.log");

    let player = CommandPlayer::new("sh");
    for index in 1..=3 {
        player.play(&write_segment(&temp_dir, index, &log)?)?;
    }

    player.finish().await?;

    assert_eq!(fs::read_to_string(&log)?, "1\n2\n3\n");

    Ok(())
}

#[tokio::test]
async fn test_play_after_finish_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let log = temp_dir.path().join("played.log");

    let player = CommandPlayer::new("sh");
    player.finish().await?;

    let result = player.play(&write_segment(&temp_dir, 1, &log)?);
    assert!(result.is_err(), "queue is closed after finish");
    assert!(!log.exists());

    Ok(())
}

#[tokio::test]
async fn test_missing_program_does_not_stop_the_queue() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let segment = temp_dir.path().join("tts_1.mp3");
    fs::write(&segment, b"AAA")?;

    let player = CommandPlayer::new("loqa-no-such-player");
    player.play(&segment)?;
    player.play(&segment)?;

    player.finish().await?;

    Ok(())
}
