//! Inbound message dispatch
//!
//! Every connection event goes through [`SegmentDispatcher::handle`]. Text
//! messages are handed back to the caller untouched. Binary messages are
//! fragments of a synthesized-speech segment: they are appended to the open
//! segment file, and the final fragment closes the file and starts playback.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::player::Player;

/// Kind of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
}

/// Connection event fed into the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened,
    Closed,
    Errored(String),
    Received {
        kind: MessageKind,
        payload: Vec<u8>,
        is_final: bool,
    },
}

impl SessionEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Received {
            kind: MessageKind::Text,
            payload: text.into().into_bytes(),
            is_final: true,
        }
    }

    pub fn binary(payload: impl Into<Vec<u8>>, is_final: bool) -> Self {
        Self::Received {
            kind: MessageKind::Binary,
            payload: payload.into(),
            is_final,
        }
    }
}

/// A synthesized-speech segment persisted to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRecord {
    /// 1-based, strictly increasing within a session
    pub sequence: u64,
    pub path: PathBuf,
    pub bytes: u64,
}

/// What a single event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Connected,
    /// Text payload for display; segment state is untouched
    Text(String),
    /// Fragment appended to a segment that is still open
    FragmentAppended { sequence: u64, bytes: usize },
    /// Final fragment written, file closed and handed to the player
    SegmentCompleted(SegmentRecord),
    /// Connection ended; an open segment is abandoned without playback
    Disconnected {
        error: Option<String>,
        abandoned: Option<SegmentRecord>,
    },
}

/// Receiver-side session state
///
/// Owned by the receive loop only, so no locking is involved.
pub struct SegmentDispatcher {
    output_dir: PathBuf,
    extension: String,
    player: Arc<dyn Player>,
    last_sequence: u64,
    open: Option<SegmentWriter>,
    text_messages: usize,
    completed: Vec<SegmentRecord>,
}

impl SegmentDispatcher {
    /// `output_dir` is created on the first segment, not here
    pub fn new(
        output_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        player: Arc<dyn Player>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            player,
            last_sequence: 0,
            open: None,
            text_messages: 0,
            completed: Vec::new(),
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<Dispatch> {
        match event {
            SessionEvent::Opened => Ok(Dispatch::Connected),
            SessionEvent::Closed => Ok(Dispatch::Disconnected {
                error: None,
                abandoned: self.abandon_open_segment()?,
            }),
            SessionEvent::Errored(reason) => Ok(Dispatch::Disconnected {
                error: Some(reason),
                abandoned: self.abandon_open_segment()?,
            }),
            SessionEvent::Received {
                kind: MessageKind::Text,
                payload,
                ..
            } => {
                self.text_messages += 1;
                Ok(Dispatch::Text(String::from_utf8_lossy(&payload).into_owned()))
            }
            SessionEvent::Received {
                kind: MessageKind::Binary,
                payload,
                is_final,
            } => self.append_fragment(&payload, is_final),
        }
    }

    fn append_fragment(&mut self, payload: &[u8], is_final: bool) -> Result<Dispatch> {
        let mut writer = match self.open.take() {
            Some(writer) => writer,
            None => self.start_segment()?,
        };

        writer.write(payload)?;

        if !is_final {
            let sequence = writer.record.sequence;
            self.open = Some(writer);
            return Ok(Dispatch::FragmentAppended {
                sequence,
                bytes: payload.len(),
            });
        }

        let record = writer.finish()?;
        info!(
            "TTS segment #{} ends ({} bytes)",
            record.sequence, record.bytes
        );

        if let Err(e) = self.player.play(&record.path) {
            warn!(
                "Playback of segment #{} via {} failed: {}",
                record.sequence,
                self.player.name(),
                e
            );
        }

        self.completed.push(record.clone());
        Ok(Dispatch::SegmentCompleted(record))
    }

    fn start_segment(&mut self) -> Result<SegmentWriter> {
        let sequence = self.last_sequence + 1;
        let file_name = format!("tts_{}.{}", sequence, self.extension);

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        let writer = SegmentWriter::create(self.output_dir.join(&file_name), sequence)?;
        self.last_sequence = sequence;

        info!("TTS segment #{} begins (file name: '{}')", sequence, file_name);

        Ok(writer)
    }

    /// Close the open segment, if any, without playing it.
    ///
    /// The partial file stays on disk and is reported to the caller.
    pub fn abandon_open_segment(&mut self) -> Result<Option<SegmentRecord>> {
        let Some(writer) = self.open.take() else {
            return Ok(None);
        };

        let record = writer.finish()?;
        warn!(
            "TTS segment #{} abandoned before its final fragment ({} bytes kept at {})",
            record.sequence,
            record.bytes,
            record.path.display()
        );

        Ok(Some(record))
    }

    pub fn has_open_segment(&self) -> bool {
        self.open.is_some()
    }

    /// Sequence number of the most recently opened segment (0 if none)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn text_messages(&self) -> usize {
        self.text_messages
    }

    pub fn completed_segments(&self) -> &[SegmentRecord] {
        &self.completed
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Output sink of one segment
struct SegmentWriter {
    writer: Option<BufWriter<File>>,
    record: SegmentRecord,
}

impl SegmentWriter {
    fn create(path: PathBuf, sequence: u64) -> Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create segment file: {}", path.display()))?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            record: SegmentRecord {
                sequence,
                path,
                bytes: 0,
            },
        })
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            writer
                .write_all(payload)
                .with_context(|| format!("Failed to write {}", self.record.path.display()))?;
            self.record.bytes += payload.len() as u64;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<SegmentRecord> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {}", self.record.path.display()))?;
        }

        Ok(self.record.clone())
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush segment file on drop: {}", e);
            }
        }
    }
}
