//! distroserver binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use distro_git::{LocalTree, RepositoryMirror, VersionSource};
use distro_server::{
    HotReloadServer, RefreshConfig, RefreshScheduler, ServerOptions, Settings, init_metrics,
    load_tls, run, run_tls,
};
use tempfile::TempDir;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("Failed to load settings")?;
    let addr = settings
        .listen_addr()
        .context("Invalid server.host or server.port")?;
    let tls_files = settings.tls_files().context("Invalid ssl settings")?;

    info!("Starting distroserver v{}", env!("CARGO_PKG_VERSION"));

    let prometheus = init_metrics().context("Failed to install the metrics recorder")?;

    // Temporary directories live until the process exits.
    let mut scratch: Vec<TempDir> = Vec::new();

    let tree_root = match &settings.tree.path {
        Some(path) => path.clone(),
        None => scratch_dir("distroserver-tree-", &mut scratch)?,
    };

    let source: Arc<dyn VersionSource> = match &settings.git {
        Some(git) => {
            let default_mirror = match git.mirror_path {
                Some(_) => PathBuf::new(),
                None => scratch_dir("distroserver-mirror-", &mut scratch)?.join("mirror"),
            };
            let config = git
                .mirror_config(default_mirror)
                .map_err(anyhow::Error::msg)
                .context("Invalid git settings")?;
            info!("Mirroring {} into {:?}", git.uri, tree_root);
            Arc::new(RepositoryMirror::new(config, &tree_root))
        },
        None => {
            info!("No git repository configured, serving copies of {:?}", tree_root);
            Arc::new(LocalTree::new(&tree_root))
        },
    };

    let server = HotReloadServer::new(
        source,
        ServerOptions {
            webhook_secret: settings.webhook_secret(),
            prometheus: Some(prometheus),
        },
    );

    if server.rebuild().await.is_err() {
        warn!("Initial rebuild failed, starting with server routes only");
    }

    let _refresh = settings.refresh_interval().map(|interval| {
        RefreshScheduler::new(Arc::clone(&server), RefreshConfig::with_interval(interval)).start()
    });

    match tls_files {
        Some((cert, key)) => {
            let tls = load_tls(cert, key)
                .await
                .with_context(|| format!("Failed to load certificate {:?} and key {:?}", cert, key))?;
            let listener = std::net::TcpListener::bind(addr)
                .with_context(|| format!("Failed to bind {}", addr))?;
            run_tls(listener, server, tls, settings.shutdown_timeout()).await?;
        },
        None => run(addr, server, settings.shutdown_timeout()).await?,
    }

    Ok(())
}

fn scratch_dir(prefix: &str, scratch: &mut Vec<TempDir>) -> anyhow::Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .context("Failed to create a temporary directory")?;
    let path = dir.path().to_path_buf();
    scratch.push(dir);
    Ok(path)
}
