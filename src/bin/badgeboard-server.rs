use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use badgeboard::app::api::{AppState, router};
use badgeboard::app::refresh::Refresher;
use badgeboard::app::scheduler::RefreshScheduler;
use badgeboard::app::store::open_store;
use badgeboard::badges::BadgeAllowList;
use badgeboard::config::Config;
use badgeboard::fetch::ProfileFetcher;
use badgeboard::roster::RosterColumns;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct ServerArgs {
    /// Listen address (default: 0.0.0.0:$PORT).
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Roster CSV path. Overrides BADGEBOARD_ROSTER.
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Store URL. Overrides BADGEBOARD_STORE_URL.
    #[arg(long)]
    store_url: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    badgeboard::logging::init()?;

    let args = ServerArgs::parse();
    let mut config = Config::from_env().context("load config")?;
    if let Some(roster) = args.roster {
        config.roster_path = roster;
    }
    if let Some(store_url) = args.store_url {
        config.store_url = store_url;
    }
    let addr = args
        .addr
        .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)));
    tracing::info!(
        %addr,
        roster = %config.roster_path.display(),
        refresh_interval_secs = config.refresh_interval.as_secs(),
        "starting badgeboard-server"
    );

    let store = open_store(&config.store_url).await.context("open store")?;
    tracing::info!(store = %store.describe(), "store connection ready");

    let fetcher = ProfileFetcher::new(config.fetcher_options(), BadgeAllowList::default())
        .context("build fetcher")?;
    let refresher = Arc::new(Refresher::new(
        config.roster_path.clone(),
        RosterColumns::default(),
        fetcher,
        Arc::clone(&store),
    ));

    let scheduler = RefreshScheduler::start(refresher.clone(), config.refresh_interval);

    let app = router(AppState {
        store: Arc::clone(&store),
        refresher,
    });

    let served = serve(addr, app).await;

    scheduler.shutdown().await;
    store.close().await;
    tracing::info!("badgeboard-server stopped");
    served
}

async fn serve(addr: SocketAddr, app: axum::Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {addr}: {err}"))?;
    let shutdown = shutdown_signal();
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serve http")
}

/// Resolves on Ctrl-C or, on unix, SIGTERM. The SIGTERM handler is installed
/// before this returns.
fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    #[cfg(unix)]
    let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|err| tracing::error!(?err, "failed to listen for SIGTERM"))
        .ok();

    async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(?err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match sigterm {
                Some(mut sigterm) => {
                    sigterm.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }
        tracing::info!("shutdown requested");
    }
}
