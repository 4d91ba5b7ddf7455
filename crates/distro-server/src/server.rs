use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    middleware,
    response::Response,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tracing::{info, warn};

use crate::metrics::http::http_metrics_middleware;
use crate::middleware::{LoggingLayer, RequestIdLayer};
use crate::reload::HotReloadServer;

/// Creates the application router.
///
/// Every path falls through to the published snapshot; the router itself
/// only carries the middleware.
pub fn create_app(server: Arc<HotReloadServer>) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    Router::new()
        .fallback(serve_request)
        .with_state(server)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware_stack)
}

async fn serve_request(State(server): State<Arc<HotReloadServer>>, request: Request) -> Response {
    server.serve(request).await
}

/// Serves until SIGTERM or Ctrl-C, then drains for at most `drain`.
///
/// SIGHUP triggers a rebuild.
pub async fn run(
    addr: SocketAddr,
    server: Arc<HotReloadServer>,
    drain: Duration,
) -> Result<(), std::io::Error> {
    let app = create_app(Arc::clone(&server));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = spawn_signal_watcher(server, shutdown_tx)?;

    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()))
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            signals.abort();
            return result;
        }
        _ = shutdown_requested(shutdown_rx) => {}
    }

    match tokio::time::timeout(drain, serve).await {
        Ok(result) => {
            info!("Server stopped");
            result
        },
        Err(_) => {
            warn!("Drain deadline of {:?} passed, closing remaining connections", drain);
            Ok(())
        },
    }
}

/// Loads a PEM certificate chain and private key for the HTTPS listener.
pub async fn load_tls(cert: &Path, key: &Path) -> Result<RustlsConfig, std::io::Error> {
    // Fails only when a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
    RustlsConfig::from_pem_file(cert, key).await
}

/// Serves HTTPS on `listener` until SIGTERM or Ctrl-C, then drains for at
/// most `drain`.
///
/// SIGHUP triggers a rebuild.
pub async fn run_tls(
    listener: std::net::TcpListener,
    server: Arc<HotReloadServer>,
    tls: RustlsConfig,
    drain: Duration,
) -> Result<(), std::io::Error> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = spawn_signal_watcher(Arc::clone(&server), shutdown_tx)?;

    let result = serve_tls(listener, server, tls, shutdown_requested(shutdown_rx), drain).await;
    signals.abort();
    result
}

/// Serves HTTPS on `listener` until `shutdown` completes.
///
/// Connections still open `drain` after shutdown are closed.
pub async fn serve_tls<F>(
    listener: std::net::TcpListener,
    server: Arc<HotReloadServer>,
    tls: RustlsConfig,
    shutdown: F,
    drain: Duration,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(server);
    listener.set_nonblocking(true)?;
    info!("Server listening on {} (TLS)", listener.local_addr()?);

    let handle = Handle::new();
    let stopper = handle.clone();
    let watcher = tokio::spawn(async move {
        shutdown.await;
        info!("Draining HTTPS connections for at most {:?}", drain);
        stopper.graceful_shutdown(Some(drain));
    });

    let result = axum_server::from_tcp_rustls(listener, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await;
    watcher.abort();
    if result.is_ok() {
        info!("Server stopped");
    }
    result
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without a shutdown request.
            std::future::pending::<()>().await;
        }
    }
}

fn spawn_signal_watcher(
    server: Arc<HotReloadServer>,
    shutdown: watch::Sender<bool>,
) -> Result<JoinHandle<()>, std::io::Error> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut hangup = signal(SignalKind::hangup())?;
        let mut terminate = signal(SignalKind::terminate())?;

        Ok(tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            loop {
                tokio::select! {
                    Some(()) = hangup.recv() => {
                        info!("SIGHUP received, rebuilding");
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            // Outcome is logged by the server.
                            let _ = server.rebuild().await;
                        });
                    }
                    _ = terminate.recv() => break,
                    _ = &mut ctrl_c => break,
                }
            }

            info!("Shutdown signal received");
            let _ = shutdown.send(true);
        }))
    }

    #[cfg(not(unix))]
    {
        drop(server);
        Ok(tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            let _ = shutdown.send(true);
        }))
    }
}
