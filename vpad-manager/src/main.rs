use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vpad::config::{CONFIG_FILE, Config, InputSourceKind};
use vpad::input::InputSource;
use vpad::manager::{Manager, SourceHandle};
use vpad::{AssignmentManager, EmulatedInput, FeedSource};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket path for the manager
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Instance number (used to generate socket path)
    #[arg(short, long, default_value = "0")]
    instance: u32,

    /// Config file, created with defaults when missing
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[cfg(target_os = "linux")]
fn physical_backend() -> anyhow::Result<Arc<dyn vpad::physical::PhysicalBackend>> {
    Ok(Arc::new(vpad::physical::EvdevBackend::new()))
}

#[cfg(not(target_os = "linux"))]
fn physical_backend() -> anyhow::Result<Arc<dyn vpad::physical::PhysicalBackend>> {
    anyhow::bail!("No physical controller backend on this platform, use source = \"feed\"")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load_or_create(&args.config)?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    // Determine socket path
    let socket_path = args
        .socket
        .unwrap_or_else(|| vpad::client::default_socket_path(args.instance));

    tracing::info!("Starting vpad manager");
    tracing::info!("Socket path: {}", socket_path.display());
    tracing::debug!("Config: {:?}", config);

    let (source, handle): (Arc<dyn InputSource>, SourceHandle) = match config.source {
        InputSourceKind::Feed => {
            let feed = Arc::new(FeedSource::new(config.device_count));
            let source: Arc<dyn InputSource> = feed.clone();
            (source, SourceHandle::Feed(feed))
        }
        InputSourceKind::Physical => {
            let backend = physical_backend()?;
            let assignments = Arc::new(AssignmentManager::new(backend, config.device_count));
            let source: Arc<dyn InputSource> = assignments.clone();
            (source, SourceHandle::Physical(assignments))
        }
    };

    let scanner = match &handle {
        SourceHandle::Physical(assignments) => Some(vpad::spawn_scanner(
            Arc::clone(assignments),
            config.scan_interval(),
        )),
        SourceHandle::Feed(_) => None,
    };

    let input = EmulatedInput::new(config.charset, source, config.filter());
    let manager = Manager::new(&socket_path, input, handle.clone()).context("Failed to start manager")?;

    let result = tokio::select! {
        result = manager.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    };

    if let Some(scanner) = scanner {
        scanner.abort();
    }
    if let SourceHandle::Physical(assignments) = &handle {
        assignments.release_all();
    }
    let _ = std::fs::remove_file(manager.socket_path());

    result
}
