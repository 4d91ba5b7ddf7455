//! Serving over HTTPS.

mod helpers;

use std::path::PathBuf;
use std::time::Duration;

use distro_server::{load_tls, serve_tls};
use helpers::Tree;
use tokio::sync::oneshot;

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn https_listener_serves_snapshot() {
    let tree = Tree::new();
    tree.foo_and_bar("branch/master", "boot v1\n");
    let server = tree.server();
    server.rebuild().await.unwrap();

    let tls = load_tls(&data("localhost.crt"), &data("localhost.key"))
        .await
        .unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(serve_tls(
        listener,
        server,
        tls,
        async move {
            let _ = stop_rx.await;
        },
        Duration::from_secs(1),
    ));

    let client = client();
    let boot = client
        .get(format!("https://127.0.0.1:{}/branch/master/foo/boot.txt", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(boot.status(), 200);
    assert_eq!(boot.text().await.unwrap(), "boot v1\n");

    let status = client
        .get(format!("https://127.0.0.1:{}/status", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), 200);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn plain_http_is_refused_on_https_listener() {
    let tree = Tree::new();
    tree.foo_and_bar("branch/master", "boot v1\n");
    let server = tree.server();
    server.rebuild().await.unwrap();

    let tls = load_tls(&data("localhost.crt"), &data("localhost.key"))
        .await
        .unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = tokio::spawn(serve_tls(
        listener,
        server,
        tls,
        std::future::pending(),
        Duration::from_secs(1),
    ));

    let result = client()
        .get(format!("http://127.0.0.1:{}/status", addr.port()))
        .timeout(Duration::from_secs(5))
        .send()
        .await;

    assert!(result.is_err());
    serving.abort();
}

#[tokio::test]
async fn missing_key_file_fails_to_load() {
    let result = load_tls(&data("localhost.crt"), &data("missing.key")).await;

    assert!(result.is_err());
}
