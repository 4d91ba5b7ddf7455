use axum::body::Body;
use axum::http::Request;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use distro_git::LocalTree;
use distro_server::{HotReloadServer, ServerOptions};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

const CONFIG: &str = "endpoints:\n  static:\n    files:\n      source: files\n    images:\n      source: images\n";

/// Crea un arbol con N ramas, cada una con dos montajes estaticos
fn create_tree(versions: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..versions {
        let folder = dir.path().join(format!("branch/feature-{}", i));
        std::fs::create_dir_all(folder.join("files")).unwrap();
        std::fs::create_dir_all(folder.join("images")).unwrap();
        std::fs::write(folder.join("config.yaml"), CONFIG).unwrap();
    }
    dir
}

fn create_server(rt: &Runtime, tree: &TempDir) -> Arc<HotReloadServer> {
    let server = HotReloadServer::new(Arc::new(LocalTree::new(tree.path())), ServerOptions::default());
    rt.block_on(server.rebuild()).unwrap();
    server
}

/// Benchmark: despacho por el router del snapshot segun el numero de versiones
fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");

    for versions in [1, 10, 100, 500] {
        let tree = create_tree(versions);
        let server = create_server(&rt, &tree);
        let snapshot = server.snapshot();
        let path = format!("/branch/feature-{}/images/pxe/vmlinuz", versions / 2);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(versions), &path, |b, path| {
            b.to_async(&rt).iter(|| async {
                let request = Request::builder().uri(path.as_str()).body(Body::empty()).unwrap();
                std::hint::black_box(snapshot.dispatch(request).await)
            });
        });
    }

    group.finish();
}

/// Benchmark: request completo hasta el handler de /health
fn bench_serve_health(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tree = create_tree(100);
    let server = create_server(&rt, &tree);

    c.bench_function("serve_health", |b| {
        b.to_async(&rt).iter(|| async {
            let request = Request::builder()
                .uri("/branch/feature-50/health")
                .body(Body::empty())
                .unwrap();
            std::hint::black_box(server.serve(request).await)
        });
    });
}

/// Benchmark: request sin ruta (404)
fn bench_serve_not_found(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tree = create_tree(100);
    let server = create_server(&rt, &tree);

    c.bench_function("serve_not_found", |b| {
        b.to_async(&rt).iter(|| async {
            let request = Request::builder()
                .uri("/branch/unknown/health")
                .body(Body::empty())
                .unwrap();
            std::hint::black_box(server.serve(request).await)
        });
    });
}

/// Benchmark: rebuild completo de un arbol local
fn bench_rebuild(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(20);

    for versions in [10, 100] {
        let tree = create_tree(versions);
        let server = create_server(&rt, &tree);

        group.bench_function(BenchmarkId::from_parameter(versions), |b| {
            b.to_async(&rt).iter(|| async { std::hint::black_box(server.rebuild().await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch,
    bench_serve_health,
    bench_serve_not_found,
    bench_rebuild
);
criterion_main!(benches);
