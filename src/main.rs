use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livescribe::api::{ExportFormat, ExportKind, Language};
use livescribe::channel::{NatsTransport, Transport, WsTransport};
use livescribe::config::TransportKind;
use livescribe::{
    open_source, Config, GracePeriod, HttpApi, InboundEvent, ModelType, SessionApi,
    SessionController, StreamSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "livescribe", version, about = "Real-time transcription client")]
struct Cli {
    /// Config file path without extension
    #[arg(long, default_value = "config/livescribe")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream an audio file through a live session, printing events as JSON lines
    Stream {
        audio: PathBuf,
        #[arg(long)]
        model: Option<ModelType>,
        /// Grace period in seconds given to the service on close
        #[arg(long, allow_negative_numbers = true)]
        grace: Option<f64>,
    },
    /// Close a live session by task id
    Close {
        task_id: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        grace: f64,
    },
    /// Show the status of a transcription task
    Status { task_id: String },
    /// Download an exported document
    Export {
        task_id: String,
        #[arg(long)]
        kind: ExportKind,
        #[arg(long)]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
    },
    /// Translate a piece of text
    TranslateText {
        text: String,
        #[arg(long)]
        lang: Language,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config).context("Failed to load configuration")?;
    let api = Arc::new(
        HttpApi::new(&cfg.service.api_base_url, cfg.request_timeout())
            .context("Failed to create API client")?,
    );
    let credential = cfg.service.credential.clone();

    match cli.command {
        Command::Stream {
            audio,
            model,
            grace,
        } => {
            let mut settings = StreamSettings::from(&cfg);
            if let Some(grace) = grace {
                settings.grace_period = GracePeriod::from_secs_f64(grace);
            }

            let transport: Arc<dyn Transport> = match cfg.stream.transport {
                TransportKind::Websocket => Arc::new(
                    WsTransport::new(&cfg.service.websocket_url)?.with_credential(&credential),
                ),
                TransportKind::Nats => Arc::new(NatsTransport::new(
                    &cfg.service.nats_url,
                    settings.format.sample_rate,
                    settings.format.channels,
                )),
            };

            let mut source = open_source(&audio, &settings.format)
                .await
                .with_context(|| format!("Failed to open audio source {}", audio.display()))?;

            let controller = SessionController::new(api, transport, credential, settings);

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, shutting the session down");
                    ctrl_c.cancel();
                }
            });

            let (events_tx, mut events_rx) = mpsc::unbounded_channel::<InboundEvent>();
            let printer = tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    println!("{}", event.payload);
                }
            });

            let result = controller
                .transcribe(
                    model.unwrap_or(cfg.stream.model),
                    &mut source,
                    Some(events_tx),
                    &cancel,
                )
                .await;
            printer.await.context("Event printer failed")?;

            let report = result?;
            info!(
                "Session {} finished with status {}: {} chunks, {} events",
                report.session.task_id,
                report.close.status,
                report.stats.chunks_sent,
                report.stats.events_received
            );
        }
        Command::Close { task_id, grace } => {
            let result = api
                .close_session(&task_id, &credential, GracePeriod::from_secs_f64(grace))
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Status { task_id } => {
            let status = api.status(&credential, Some(&task_id), None).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Export {
            task_id,
            kind,
            format,
            out,
        } => {
            let bytes = api.export(&credential, &task_id, kind, format).await?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
        Command::TranslateText { text, lang } => {
            let translation = api.translate_text(&credential, &text, lang).await?;
            println!("{}", translation.data);
        }
    }

    Ok(())
}
