use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Configuration for a translation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client trace ID sent with the handshake and used in logs
    pub trace_id: Uuid,

    /// Capture sample rate (8kHz or 16kHz)
    pub sample_rate: u32,

    /// Samples per outbound audio chunk
    pub chunk_frames: usize,

    /// Per-run directory holding the synthesized segments
    pub output_dir: PathBuf,

    /// Extension of segment files, e.g. `mp3`
    pub output_extension: String,
}

impl SessionConfig {
    /// New session whose segments go to a fresh random sub-directory of `output_root`
    pub fn new(output_root: impl AsRef<Path>, sample_rate: u32, chunk_frames: usize) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            sample_rate,
            chunk_frames,
            output_dir: output_root
                .as_ref()
                .join(Uuid::new_v4().simple().to_string()),
            output_extension: "mp3".to_string(),
        }
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(".", 16000, 1024)
    }
}
