use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use cellgate::dev::{LoggingLine, SilenceAudio};
use cellgate::logging::log_welcome;
use cellgate::{Gateway, GatewayConfig, setup_logging};
use dialog_core::SipEngine;

#[derive(Parser, Debug)]
#[command(name = "cellgate")]
#[command(version, about = "GSM line to SIP trunk gateway")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "cellgate.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = GatewayConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate().context("invalid configuration")?;

    if args.check {
        print!("{}", config.to_toml_redacted());
        return Ok(());
    }

    let logging = config.logging_config()?;
    setup_logging(&logging)?;
    log_welcome("cellgate", cellgate::VERSION);
    codec_core::init();

    let engine_config = config.engine_config()?;
    let (engine, engine_events) = SipEngine::bind(engine_config)
        .await
        .context("binding the SIP socket")?;
    engine.start().await.context("starting the SIP engine")?;

    // No modem adapter is linked into this binary; the line never rings
    // and calls from the PBX are answered with silence.
    let (_line_tx, line_events) = mpsc::unbounded_channel();
    let audio = Arc::new(SilenceAudio::new());
    let gateway = Gateway::from_config(&config, engine.clone(), Arc::new(LoggingLine), audio.clone())
        .with_audio_control(audio);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("waiting for Ctrl+C failed: {}", e);
        }
    };
    let result = gateway.run(engine_events, line_events, shutdown).await;

    engine.stop().await;
    info!("cellgate stopped");
    result.context("gateway event loop")
}
