//! Weft Fabrication Engine (weft-fab) - Main entry point
//!
//! Headless fabrication service: loads a content snapshot and an engine
//! configuration, then runs the continuous work cycle, shipping segment
//! records as JSON and rendered audio as WAV files until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use weft_common::content::{
    ContentSnapshot, Instrument, InstrumentAudio, Program, Sequence, SequenceBinding,
};
use weft_common::meme::MemeStack;
use weft_fab::cache::{AudioCache, LocalFileFetcher};
use weft_fab::config::FabConfig;
use weft_fab::ship::{JsonDirSink, WavDirShipper};
use weft_fab::work::WorkCycle;

/// Command-line arguments for weft-fab
#[derive(Parser, Debug)]
#[command(name = "weft-fab")]
#[command(about = "Fabrication and mixing engine for Weft")]
#[command(version)]
struct Args {
    /// Engine configuration TOML; defaults apply when omitted
    #[arg(short, long, env = "WEFT_CONFIG")]
    config: Option<PathBuf>,

    /// Content snapshot JSON supplied by the cataloging service
    #[arg(long, env = "WEFT_CONTENT")]
    content: PathBuf,

    /// Root folder the audio byte source reads waveform keys under
    #[arg(short, long, env = "WEFT_AUDIO_ROOT")]
    audio_root: PathBuf,

    /// Directory receiving segment records and rendered audio
    #[arg(short, long, default_value = "./weft-out", env = "WEFT_OUTPUT")]
    output: PathBuf,

    /// Chain to fabricate; a fresh id is minted when omitted
    #[arg(long, env = "WEFT_CHAIN")]
    chain: Option<Uuid>,
}

/// On-disk shape of the ingested content snapshot
#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(default)]
    programs: Vec<Program>,
    #[serde(default)]
    sequences: Vec<Sequence>,
    #[serde(default)]
    bindings: Vec<SequenceBinding>,
    #[serde(default)]
    instruments: Vec<Instrument>,
    #[serde(default)]
    audios: Vec<InstrumentAudio>,
}

fn load_content(path: &PathBuf) -> Result<ContentSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read content snapshot {}", path.display()))?;
    let file: ContentFile = serde_json::from_str(&text)
        .with_context(|| format!("malformed content snapshot {}", path.display()))?;
    Ok(ContentSnapshot::new(
        file.programs,
        file.sequences,
        file.bindings,
        file.instruments,
        file.audios,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weft_fab=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FabConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => FabConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    let content = Arc::new(load_content(&args.content)?);
    info!("content snapshot loaded: {}", content.summary());

    let meme_stack = Arc::new(MemeStack::with_taxonomy(config.taxonomy()));

    let fetcher = Arc::new(LocalFileFetcher::new(&args.audio_root));
    let cache = Arc::new(
        AudioCache::new(
            config.cache.max_bytes,
            config.output.frame_rate,
            &config.cache.staging_dir,
            fetcher,
        )
        .context("cannot initialize audio cache")?,
    );

    let sink = Arc::new(
        JsonDirSink::new(args.output.join("records")).context("cannot create records dir")?,
    );
    let shipper = Arc::new(
        WavDirShipper::new(args.output.join("audio")).context("cannot create audio dir")?,
    );

    let chain_id = args.chain.unwrap_or_else(Uuid::new_v4);
    info!("fabricating chain {}", chain_id);

    let cycle = Arc::new(WorkCycle::new(
        chain_id, config, content, meme_stack, cache, sink, shipper,
    ));
    Arc::clone(&cycle).start().await;

    shutdown_signal().await;

    cycle.stop().await;
    info!("work cycle shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
