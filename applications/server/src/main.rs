/// Contour Server - adaptive mastering over HTTP
use clap::{Parser, Subcommand};
use contour_analysis::ContentAnalyzer;
use contour_audio::SymphoniaDecoder;
use contour_core::{AudioLoader, PresetName};
use contour_engine::{analyze_source, validate_intensity, validate_preset, ChunkCache};
use contour_server::{build_state, config::ServerConfig, create_router};
use std::{net::SocketAddr, path::PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "contour-server")]
#[command(about = "Adaptive mastering streaming server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Configuration file path
        #[arg(short, long, env = "CONTOUR_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Analyze an audio file and print its profile and parameters
    Analyze {
        /// Audio file to analyze
        file: PathBuf,
        /// Preset to blend towards
        #[arg(short, long, default_value = "adaptive")]
        preset: String,
        /// Intensity in [0, 1]
        #[arg(short, long, default_value_t = 1.0)]
        intensity: f32,
        /// Seconds analyzed from the middle of the file (0 = whole file)
        #[arg(short, long, default_value_t = 60.0)]
        window: f64,
    },
    /// Delete every cached chunk, including the disk tier
    PurgeCache {
        /// Configuration file path
        #[arg(short, long, env = "CONTOUR_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "contour_server=info,contour_engine=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            serve(config).await?;
        }
        Commands::Analyze {
            file,
            preset,
            intensity,
            window,
        } => {
            analyze(file, &preset, intensity, window).await?;
        }
        Commands::PurgeCache { config } => {
            purge_cache(config)?;
        }
    }

    Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::load(config_path.as_deref())?;
    config.validate()?;

    tracing::info!("Starting Contour Server");
    tracing::info!("Host: {}", config.server.host);
    tracing::info!("Port: {}", config.server.port);

    let app_state = build_state(&config)?;
    tracing::info!("Library loaded with {} tracks", app_state.library.tracks().len());

    app_state.engine.invalidate_on_startup().await?;

    let app = create_router(app_state);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn analyze(file: PathBuf, preset: &str, intensity: f32, window: f64) -> anyhow::Result<()> {
    let preset: PresetName = validate_preset(preset)?;
    let intensity = validate_intensity(intensity)?;

    let analysis = tokio::task::spawn_blocking(move || -> contour_engine::Result<_> {
        let source = SymphoniaDecoder::new().load(&file)?;
        tracing::info!(
            "Decoded {} ({:.1} s, {} Hz)",
            file.display(),
            source.duration_secs(),
            source.sample_rate()
        );
        analyze_source(&ContentAnalyzer::new(), &source, window, &preset, intensity)
    })
    .await??;

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn purge_cache(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ServerConfig::load(config_path.as_deref())?;
    config.validate()?;

    let Some(dir) = config.engine.disk_cache_dir else {
        println!("No disk cache configured; nothing to purge");
        return Ok(());
    };

    let removed = ChunkCache::new(1).with_disk(&dir).purge()?;
    println!("Removed {} cached chunks from {}", removed, dir.display());
    Ok(())
}
