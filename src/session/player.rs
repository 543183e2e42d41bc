use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Playback of a completed segment
///
/// Called from the receive loop, so implementations must not block. Errors
/// are logged by the caller and never end the session.
pub trait Player: Send + Sync {
    fn play(&self, path: &Path) -> Result<()>;

    /// Get player name for logging
    fn name(&self) -> &str;
}

/// Runs an external decoder (e.g. `mpg123`) with the segment path as its only
/// argument.
///
/// Segments are queued to a background task and played one after another, in
/// completion order. The player's exit status is not checked. Call
/// [`CommandPlayer::finish`] before exiting so queued segments still play.
pub struct CommandPlayer {
    program: String,
    queue: Mutex<Option<mpsc::UnboundedSender<PathBuf>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandPlayer {
    /// Must be called from within a tokio runtime
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let (queue, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let worker_program = program.clone();
        let worker = tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                debug!("Playing {} with {}", path.display(), worker_program);

                match tokio::process::Command::new(&worker_program)
                    .arg(&path)
                    .status()
                    .await
                {
                    Ok(status) => debug!("{} exited with {}", worker_program, status),
                    Err(e) => warn!("Failed to run {}: {}", worker_program, e),
                }
            }
        });

        info!("Playback via external player '{}'", program);

        Self {
            program,
            queue: Mutex::new(Some(queue)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop accepting segments and wait until every queued one has played.
    pub async fn finish(&self) -> Result<()> {
        // Dropping the sender lets the worker drain the queue and exit
        drop(lock(&self.queue).take());

        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            debug!("Waiting for queued segments to play via {}", self.program);
            worker
                .await
                .map_err(|e| anyhow!("Playback worker for '{}' failed: {}", self.program, e))?;
        }

        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Player for CommandPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        let queue = lock(&self.queue);
        let sent = match queue.as_ref() {
            Some(queue) => queue.send(path.to_path_buf()).is_ok(),
            None => false,
        };

        if !sent {
            bail!("Playback worker for '{}' has stopped", self.program);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Leaves segments on disk without playing them
pub struct SilentPlayer;

impl Player for SilentPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        info!("Segment saved: {}", path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "silent"
    }
}
