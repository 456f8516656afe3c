use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use sonic_audio_bridge::audio::{CaptureBackendFactory, CaptureGrant, CaptureSource};
use sonic_audio_bridge::codec::BitLengthCodec;
use sonic_audio_bridge::encoder::CodecKind;
use sonic_audio_bridge::manager::{
    AppListService, ContextProvider, FileContextProvider, ManagerService, StaticContext,
};
use sonic_audio_bridge::session::{LogNotifier, SessionController, StartRequest};
use sonic_audio_bridge::{transport, Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::FramedRead;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sonic-audio-bridge", version, about = "Privileged device services over local sockets")]
struct Cli {
    /// Config file (TOML, JSON or YAML; extension optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture system audio and stream AAC to one local client
    ///
    /// Builds without the `fdk` feature use the loopback codec, which sends
    /// raw PCM inside ADTS frames instead of AAC.
    Audio {
        #[arg(long, value_enum, default_value_t = SourceKind::Silence)]
        source: SourceKind,

        /// WAV file for `--source wav`
        #[arg(long)]
        wav: Option<PathBuf>,

        /// Capture grant token
        #[arg(long)]
        grant: Option<String>,

        /// Deliver a stop action instead of a record request
        #[arg(long)]
        stop: bool,
    },

    /// Serve app and Wi-Fi listings to one client
    Manager,

    /// Write the app listing to the first client and exit
    AppList,

    /// Connect to the audio service and save the ADTS stream
    Receive {
        #[arg(short, long)]
        output: PathBuf,

        /// Stop after this many seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Silence,
    Wav,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;

    info!("Sonic audio bridge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Audio {
            source,
            wav,
            grant,
            stop,
        } => {
            let source = match source {
                SourceKind::Silence => CaptureSource::Silence,
                SourceKind::Wav => {
                    CaptureSource::File(wav.context("--wav is required with --source wav")?)
                }
            };
            run_audio(&cfg, source, grant, stop).await
        }
        Command::Manager => run_manager(&cfg).await,
        Command::AppList => run_app_list(&cfg).await,
        Command::Receive { output, seconds } => run_receive(&cfg, output, seconds).await,
    }
}

async fn run_audio(
    cfg: &Config,
    source: CaptureSource,
    grant: Option<String>,
    stop: bool,
) -> Result<()> {
    let session = cfg.session_config()?;
    info!("Audio endpoint: {}", session.endpoint);

    let kind = CodecKind::preferred();
    if !kind.produces_aac() {
        warn!(
            "No AAC encoder in this build (enable the `fdk` feature); \
             streaming raw PCM in ADTS frames, which AAC decoders cannot play"
        );
    }
    let codec = kind.create();
    let capture = CaptureBackendFactory::create(source);
    let mut controller = SessionController::new(session, capture, codec, Arc::new(LogNotifier));

    let request = if stop {
        StartRequest::Stop
    } else {
        StartRequest::Record {
            grant: grant.map(CaptureGrant::new),
        }
    };
    controller
        .start(request)
        .await
        .context("Failed to start audio session")?;

    let handle = controller.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            handle.stop().await;
        }
    });

    let stats = controller.run().await;
    info!("Session stats: {}", stats.to_json()?);
    Ok(())
}

fn context_provider(cfg: &Config) -> Box<dyn ContextProvider> {
    match &cfg.service.device_listing {
        Some(path) => Box::new(FileContextProvider::new(path)),
        None => Box::new(StaticContext::default()),
    }
}

async fn run_manager(cfg: &Config) -> Result<()> {
    let provider = context_provider(cfg);
    let service = ManagerService::new(
        cfg.manager_endpoint(),
        cfg.session.tokens.clone(),
        provider.as_ref(),
    )?;

    let answered = service.run().await?;
    info!("Manager answered {} requests", answered);
    Ok(())
}

async fn run_app_list(cfg: &Config) -> Result<()> {
    let provider = context_provider(cfg);
    let service = AppListService::new(cfg.app_list_endpoint(), provider.as_ref())?;

    let written = service.run().await?;
    info!("Sent {} apps", written);
    Ok(())
}

async fn run_receive(cfg: &Config, output: PathBuf, seconds: u64) -> Result<()> {
    let endpoint = cfg.audio_endpoint();
    let stream = transport::connect(&endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;
    info!("Connected to {}", endpoint);

    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, BitLengthCodec::new());
    let mut file = tokio::fs::File::create(&output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    let mut count = 0u64;
    let mut bytes = 0u64;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            frame = frames.next() => match frame {
                Some(Ok(payload)) => {
                    file.write_all(&payload).await?;
                    count += 1;
                    bytes += payload.len() as u64;
                }
                Some(Err(e)) => return Err(e).context("Malformed frame from server"),
                None => {
                    info!("Server closed the stream");
                    break;
                }
            }
        }
    }
    file.flush().await?;

    if let Err(e) = write_half.write_all(cfg.session.tokens.stop.as_bytes()).await {
        warn!("Failed to send stop token: {}", e);
    }

    info!(
        "Received {} frames ({} bytes) into {}",
        count,
        bytes,
        output.display()
    );
    Ok(())
}
