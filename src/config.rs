use anyhow::Result;
use serde::Deserialize;

/// Prefix for environment overrides, e.g. `LOQA__SERVICE__SUBSCRIPTION_KEY`
const ENV_PREFIX: &str = "LOQA";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub translation: TranslationConfig,
    pub audio: AudioConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint that exchanges the subscription key for a bearer token
    pub token_url: String,
    /// WebSocket endpoint of the speech translation API
    pub endpoint: String,
    pub api_version: String,
    /// Usually supplied through the environment rather than a file
    pub subscription_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    pub from: String,
    pub to: String,
    pub features: Vec<String>,
    /// Container of the synthesized speech, e.g. `audio/mp3`
    pub format: String,
    pub profanity_action: String,
    pub profanity_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per outbound chunk
    pub chunk_frames: usize,
    /// Input device name; the host default is used when unset
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Each run creates a fresh sub-directory here
    pub root: String,
    /// Program invoked with the path of every completed segment
    pub player: String,
    pub playback: bool,
}

impl Config {
    /// Load configuration from built-in defaults, an optional file at `path`
    /// (extension resolved by the `config` crate) and `LOQA__*` variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default(
                "service.token_url",
                "https://api.cognitive.microsoft.com/sts/v1.0/issueToken",
            )?
            .set_default(
                "service.endpoint",
                "wss://dev.microsofttranslator.com/speech/translate",
            )?
            .set_default("service.api_version", "1.0")?
            .set_default("translation.from", "en")?
            .set_default("translation.to", "de")?
            .set_default(
                "translation.features",
                vec!["Partial", "TextToSpeech", "TimingInfo"],
            )?
            .set_default("translation.format", "audio/mp3")?
            .set_default("translation.profanity_action", "Marked")?
            .set_default("translation.profanity_marker", "Tag")?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.chunk_frames", 1024)?
            .set_default("output.root", ".")?
            .set_default("output.player", "mpg123")?
            .set_default("output.playback", true)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = Config::load("config/does-not-exist").unwrap();

        assert_eq!(cfg.audio.sample_rate, 16000);
        assert_eq!(cfg.audio.chunk_frames, 1024);
        assert_eq!(
            cfg.translation.features,
            vec!["Partial", "TextToSpeech", "TimingInfo"]
        );
        assert_eq!(cfg.translation.format, "audio/mp3");
        assert!(cfg.output.playback);
    }
}
