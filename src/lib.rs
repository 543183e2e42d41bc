pub mod audio;
pub mod config;
pub mod session;
pub mod translator;

pub use audio::{
    wave_header, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame,
    AudioSource,
};
pub use config::Config;
pub use session::{
    CommandPlayer, Player, SegmentDispatcher, SessionConfig, SessionEvent, SessionStats,
    SilentPlayer, TranslationSession,
};
pub use translator::{TranslationResult, TranslationTarget, TranslatorClient};
