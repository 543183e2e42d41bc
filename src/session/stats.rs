use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::dispatcher::SegmentRecord;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EndReason {
    /// The service closed the connection
    Closed,
    /// Transport failure while receiving
    TransportError(String),
    /// Capture or send failure in the sender task
    SenderFailed(String),
    /// A segment could not be written to disk
    OutputFailed(String),
    /// Shutdown requested by the operator
    Interrupted,
}

/// Summary of a finished session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub trace_id: Uuid,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Audio chunks sent after the header
    pub chunks_sent: u64,

    /// Audio payload bytes sent after the header
    pub bytes_sent: u64,

    /// Text messages received
    pub text_messages: usize,

    /// Segments completed and handed to playback, in order
    pub segments: Vec<SegmentRecord>,

    /// Segment still open at teardown; kept on disk, never played
    pub abandoned_segment: Option<SegmentRecord>,

    pub end_reason: EndReason,
}
