pub mod backend;
pub mod file;
pub mod header;
pub mod microphone;
pub mod resampler;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::{AudioFile, FileBackend};
pub use header::{is_sample_rate_supported, wave_header, SUPPORTED_SAMPLE_RATES};
pub use microphone::MicrophoneBackend;
pub use resampler::CaptureConverter;
