//! Template endpoints with data sources and post-render pipelines.

mod helpers;

use axum::http::StatusCode;
use helpers::{TestClient, Tree};
use serde_json::{Value, json};
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(tree: &Tree) -> TestClient {
    let server = tree.server();
    server.rebuild().await.unwrap();
    TestClient::for_server(&server)
}

fn template_config(extra: &str) -> String {
    format!(
        "endpoints:\n  template:\n    boot:\n      template_path: templates\n      default_template: menu.ipxe\n      content_type: text/x-ipxe\n{extra}"
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_function_calls_data_source() {
    let inventory = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/nodes/aa"))
        .and(query_param("fields", "role"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "role": "compute" })))
        .expect(1)
        .mount(&inventory)
        .await;

    let tree = Tree::new();
    let config = template_config(&format!(
        "datasources:\n  inventory:\n    url: {}/api\n",
        inventory.uri()
    ));
    tree.write("branch/master/config.yaml", &config).write(
        "branch/master/templates/menu.ipxe",
        "{% set node = api('inventory', 'nodes/' ~ params.mac, 'fields=role') %}{{ node.status }} {{ node.data.role }}",
    );
    let client = client_for(&tree).await;

    client
        .get("/branch/master/boot?mac=aa")
        .await
        .assert_status(StatusCode::OK)
        .assert_content_type_contains("text/x-ipxe")
        .assert_text("200 compute");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_function_posts_body() {
    let inventory = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_string(r#"{"mac":"aa"}"#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&inventory)
        .await;

    let tree = Tree::new();
    let config = template_config(&format!(
        "datasources:\n  register:\n    url: {}/register\n    method: post\n",
        inventory.uri()
    ));
    tree.write("branch/master/config.yaml", &config).write(
        "branch/master/templates/menu.ipxe",
        r#"{{ api('register', '', '', '{"mac":"aa"}').data.id }}"#,
    );
    let client = client_for(&tree).await;

    client.get("/branch/master/boot").await.assert_text("7");
}

#[tokio::test]
async fn render_failure_is_generic_500() {
    let tree = Tree::new();
    tree.write("branch/master/config.yaml", &template_config(""))
        .write(
            "branch/master/templates/menu.ipxe",
            "{{ api('missing') }}",
        );
    let client = client_for(&tree).await;

    let response = client.get("/branch/master/boot").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>(),
        json!({ "msg": "Internal server error. Please consult the server logs." })
    );
}

#[tokio::test]
async fn post_render_pipeline_transforms_body() {
    let tree = Tree::new();
    let config = format!(
        "{}vars:\n  kernel: vmlinuz\n",
        template_config("      post_render:\n        - tr a-z A-Z\n        - sed s/BOOT/boot/\n")
    );
    tree.write("branch/master/config.yaml", &config)
        .write("branch/master/templates/menu.ipxe", "#!ipxe\nboot {{ vars.kernel }}\n");
    let client = client_for(&tree).await;

    client
        .get("/branch/master/boot")
        .await
        .assert_status(StatusCode::OK)
        .assert_content_type_contains("text/x-ipxe")
        .assert_text("#!IPXE\nboot VMLINUZ\n");

    client
        .get("/branch/master/boot?raw")
        .await
        .assert_text("#!ipxe\nboot vmlinuz\n");
}

#[tokio::test]
async fn failing_pipeline_is_500() {
    let tree = Tree::new();
    tree.write(
        "branch/master/config.yaml",
        &template_config("      post_render:\n        - \"false\"\n"),
    )
    .write("branch/master/templates/menu.ipxe", "#!ipxe\n");
    let client = client_for(&tree).await;

    client
        .get("/branch/master/boot")
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn template_syntax_error_fails_rebuild() {
    let tree = Tree::new();
    tree.write("branch/master/config.yaml", &template_config(""))
        .write("branch/master/templates/menu.ipxe", "{% for %}");
    let server = tree.server();

    let err = server.rebuild().await.unwrap_err();

    assert_eq!(err.stage(), "compile");
}
