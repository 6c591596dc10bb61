use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use fdscore::{
    config::Config,
    runtime::handle::spawn_from_config,
    server::{self, AppState},
};
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_log::AsTrace;
use tracing_subscriber::EnvFilter;

/// How long open HTTP requests, and then the driver, get to finish on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Field Day scoreboard fed by an N3FJP contest logger.
///
/// Polls the logger's TCP API, keeps a deduplicated contact store, and
/// serves live statistics and score over HTTP.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured web port.
    #[arg(long)]
    web_port: Option<u16>,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbosity.log_level_filter().as_trace().into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
    debug!(cli = ?cli);

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(port) = cli.web_port {
        config.web.port = port;
    }
    info!(
        logger = %format!("{}:{}", config.source.host, config.source.port),
        class = %config.scoring.class,
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let scoreboard = spawn_from_config(&config, cancel.clone());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = server::bind(&addr).await?;
    let state = AppState {
        scoreboard: scoreboard.clone(),
        presentation: Arc::new(config.presentation()),
    };

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let served = server::serve(listener, state, cancel.clone(), SHUTDOWN_GRACE).await;
    cancel.cancel();

    if let Err(err) = scoreboard.shutdown(SHUTDOWN_GRACE).await {
        warn!(error = %err, "driver shutdown was not clean");
    }
    served?;
    info!("scoreboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(err) => {
                warn!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
