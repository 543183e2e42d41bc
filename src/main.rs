use anyhow::Result;
use clap::Parser;
use loqa_translate::audio::is_sample_rate_supported;
use loqa_translate::session::{CommandPlayer, Player, SessionConfig, SilentPlayer};
use loqa_translate::{
    AudioBackendConfig, AudioBackendFactory, AudioSource, Config, TranslationSession,
    TranslationTarget, TranslatorClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Stream microphone audio to the speech translation service and play back
/// the translated speech
#[derive(Parser, Debug)]
#[command(name = "loqa-translate", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/loqa-translate")]
    config: String,

    /// Source language
    #[arg(long)]
    from: Option<String>,

    /// Target language
    #[arg(long)]
    to: Option<String>,

    /// Comma-separated feature list, e.g. Partial,TextToSpeech,TimingInfo
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<String>>,

    /// Synthesized speech format, e.g. audio/mp3
    #[arg(long)]
    format: Option<String>,

    /// Capture sample rate (8000 or 16000)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Input device name
    #[arg(long)]
    device: Option<String>,

    /// Stream a mono 16-bit WAV file instead of the microphone
    #[arg(long)]
    input: Option<PathBuf>,

    /// Replay --input as fast as possible instead of in real time
    #[arg(long)]
    fast: bool,

    /// Root directory for per-run segment folders
    #[arg(long)]
    output_dir: Option<String>,

    /// External player invoked for each segment
    #[arg(long)]
    player: Option<String>,

    /// Save segments without playing them
    #[arg(long)]
    no_playback: bool,
}

impl Args {
    fn apply(self, cfg: &mut Config) -> AudioSource {
        if let Some(from) = self.from {
            cfg.translation.from = from;
        }
        if let Some(to) = self.to {
            cfg.translation.to = to;
        }
        if let Some(features) = self.features {
            cfg.translation.features = features;
        }
        if let Some(format) = self.format {
            cfg.translation.format = format;
        }
        if let Some(rate) = self.sample_rate {
            cfg.audio.sample_rate = rate;
        }
        if self.device.is_some() {
            cfg.audio.device = self.device;
        }
        if let Some(root) = self.output_dir {
            cfg.output.root = root;
        }
        if let Some(player) = self.player {
            cfg.output.player = player;
        }
        if self.no_playback {
            cfg.output.playback = false;
        }

        match self.input {
            Some(path) => AudioSource::File {
                path,
                realtime: !self.fast,
            },
            None => AudioSource::Microphone {
                device: cfg.audio.device.clone(),
            },
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    let source = args.apply(&mut cfg);

    if !is_sample_rate_supported(cfg.audio.sample_rate) {
        anyhow::bail!(
            "Sampling frequency should be 8000 or 16000, got {}",
            cfg.audio.sample_rate
        );
    }

    let session_config = SessionConfig::new(&cfg.output.root, cfg.audio.sample_rate, cfg.audio.chunk_frames);
    let target = TranslationTarget::new(&cfg.service, &cfg.translation, session_config.trace_id);
    let session_config = session_config.with_output_extension(target.output_extension());

    info!("Ready to connect...");
    info!("Request URL      = {}", target.url()?);
    info!("ClientTraceId    = {}", session_config.trace_id);
    info!("Results location = {}", session_config.output_dir.display());

    let command_player = cfg
        .output
        .playback
        .then(|| Arc::new(CommandPlayer::new(cfg.output.player.clone())));
    let player: Arc<dyn Player> = match &command_player {
        Some(command_player) => command_player.clone(),
        None => Arc::new(SilentPlayer),
    };

    let backend = AudioBackendFactory::create(
        source,
        AudioBackendConfig {
            target_sample_rate: cfg.audio.sample_rate,
            chunk_frames: cfg.audio.chunk_frames,
        },
    )?;

    let client = TranslatorClient::new(cfg.service.clone());
    let session = TranslationSession::new(session_config, client, target, player);
    let result = session.run(backend, shutdown_signal()).await;

    if let Some(command_player) = command_player {
        tokio::select! {
            finished = command_player.finish() => finished?,
            _ = shutdown_signal() => warn!("Remaining playback skipped"),
        }
    }

    let stats = result?;
    info!("Session summary: {}", serde_json::to_string(&stats)?);

    Ok(())
}
