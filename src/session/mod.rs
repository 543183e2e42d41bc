//! Translation session management
//!
//! This module provides the `TranslationSession` abstraction that manages:
//! - Streaming captured audio (header first, then raw PCM chunks)
//! - Dispatching inbound transcript text and synthesized-speech fragments
//! - Reassembling speech segments on disk and handing them to a player
//! - Teardown and the end-of-session summary

mod config;
mod dispatcher;
mod player;
mod receiver;
mod sender;
mod session;
mod stats;

pub use config::SessionConfig;
pub use dispatcher::{Dispatch, MessageKind, SegmentDispatcher, SegmentRecord, SessionEvent};
pub use player::{CommandPlayer, Player, SilentPlayer};
pub use receiver::{classify, receive_messages, report};
pub use sender::{stream_audio, SenderProgress};
pub use session::{run_duplex, TranslationSession};
pub use stats::{EndReason, SessionStats};
