use clap::Parser;
use dom_recorder::config::RecorderConfig;
use dom_recorder::service::{routes, ServiceState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 9670)]
    port: u16,

    /// Recorder configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the maximum selector depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Override the dedupe window in milliseconds
    #[arg(long)]
    dedupe_window_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = match RecorderConfig::load(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(window) = args.dedupe_window_ms {
        config.dedupe_window_ms = window;
    }

    log::info!("Starting DOM recorder service on port {}", args.port);
    log::debug!("Configuration: {:?}", config);

    let state = Arc::new(ServiceState { config });

    // Bind manually to handle "port in use" error gracefully
    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            log::info!("Listening on http://{}", addr);
            warp::serve(routes(state))
                .run_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
                .await;
        }
        Err(e) => {
            log::error!("Failed to bind to port {}: {}", args.port, e);
            eprintln!(
                "Error: Port {} is already in use or unavailable.",
                args.port
            );
            std::process::exit(1);
        }
    }
}
