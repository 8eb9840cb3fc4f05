use std::sync::Arc;

use super::*;
use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
struct UploadedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Clone, Default)]
struct Captured {
    usernames: Arc<Mutex<Vec<String>>>,
    fortunes: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<UploadedField>>>,
}

async fn plain_fortune(
    State(captured): State<Captured>,
    Query(query): Query<FortuneQuery>,
) -> String {
    captured.usernames.lock().await.push(query.username.clone());
    format!("{} will ship on Friday.", query.username)
}

async fn json_fortune(Query(query): Query<FortuneQuery>) -> Json<String> {
    Json(format!("{} will find the bug.", query.username))
}

async fn blank_fortune() -> &'static str {
    "   "
}

async fn broken_fortune() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable")
}

async fn render_card_handler(
    State(captured): State<Captured>,
    Json(body): Json<RenderCardRequest>,
) -> impl IntoResponse {
    captured.fortunes.lock().await.push(body.fortune);
    ([(header::CONTENT_TYPE, "image/png")], b"\x89PNG-card".to_vec())
}

async fn empty_render() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], Vec::<u8>::new())
}

async fn upload_handler(
    State(captured): State<Captured>,
    mut multipart: Multipart,
) -> Json<serde_json::Value> {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        fields.push(UploadedField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    captured.uploads.lock().await.extend(fields);
    Json(serde_json::json!({
        "secure_url": "https://cdn.example/abc.png",
        "public_id": "abc",
        "format": "png"
    }))
}

async fn upload_without_url() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "public_id": "abc" }))
}

async fn hosted_image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], b"hosted-bytes".to_vec())
}

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn services_for(server_url: &str) -> HttpServices {
    let settings = ClientSettings {
        api_base_url: server_url.to_string(),
        asset_host_base_url: format!("{server_url}/v1_1"),
        cloud_name: "demo".into(),
        ..ClientSettings::default()
    };
    HttpServices::new(&settings).expect("http services")
}

fn handle(raw: &str) -> Handle {
    Handle::parse(raw).expect("handle")
}

#[tokio::test]
async fn fortune_request_sends_username_query() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/generateFortune", get(plain_fortune))
        .with_state(captured.clone());
    let server_url = spawn_server(app).await;

    let fortune = services_for(&server_url)
        .request_fortune(&handle("torvalds"))
        .await
        .expect("fortune");

    assert_eq!(fortune.as_str(), "torvalds will ship on Friday.");
    assert_eq!(*captured.usernames.lock().await, vec!["torvalds".to_string()]);
}

#[tokio::test]
async fn fortune_request_unwraps_json_string_bodies() {
    let app = Router::new().route("/api/generateFortune", get(json_fortune));
    let server_url = spawn_server(app).await;

    let fortune = services_for(&server_url)
        .request_fortune(&handle("ghost"))
        .await
        .expect("fortune");

    assert_eq!(fortune.as_str(), "ghost will find the bug.");
}

#[tokio::test]
async fn fortune_request_maps_error_status() {
    let app = Router::new().route("/api/generateFortune", get(broken_fortune));
    let server_url = spawn_server(app).await;

    let err = services_for(&server_url)
        .request_fortune(&handle("ghost"))
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        ServiceError::Status {
            status: 500,
            body: "model unavailable".into()
        }
    );
}

#[tokio::test]
async fn blank_fortune_is_an_invalid_response() {
    let app = Router::new().route("/api/generateFortune", get(blank_fortune));
    let server_url = spawn_server(app).await;

    let err = services_for(&server_url)
        .request_fortune(&handle("ghost"))
        .await
        .expect_err("must fail");

    assert!(matches!(err, ServiceError::InvalidResponse(_)), "{err:?}");
}

#[tokio::test]
async fn render_posts_fortune_json_and_returns_png_bytes() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/og", post(render_card_handler))
        .with_state(captured.clone());
    let server_url = spawn_server(app).await;

    let fortune = FortuneText::parse("You will merge a thousand pull requests.").expect("fortune");
    let bytes = services_for(&server_url)
        .render_card(&fortune)
        .await
        .expect("render");

    assert_eq!(bytes, b"\x89PNG-card".to_vec());
    assert_eq!(
        *captured.fortunes.lock().await,
        vec!["You will merge a thousand pull requests.".to_string()]
    );
}

#[tokio::test]
async fn empty_render_is_an_invalid_response() {
    let app = Router::new().route("/api/og", post(empty_render));
    let server_url = spawn_server(app).await;

    let fortune = FortuneText::parse("anything").expect("fortune");
    let err = services_for(&server_url)
        .render_card(&fortune)
        .await
        .expect_err("must fail");

    assert!(matches!(err, ServiceError::InvalidResponse(_)), "{err:?}");
}

#[tokio::test]
async fn host_image_uploads_file_and_preset() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/v1_1/demo/image/upload", post(upload_handler))
        .with_state(captured.clone());
    let server_url = spawn_server(app).await;

    let url = services_for(&server_url)
        .host_image(b"png".to_vec(), "torvalds's fortune")
        .await
        .expect("host");

    assert_eq!(url.as_str(), "https://cdn.example/abc.png");

    let uploads = captured.uploads.lock().await;
    let file = uploads
        .iter()
        .find(|field| field.name == "file")
        .expect("file part");
    assert_eq!(file.file_name.as_deref(), Some("torvalds's fortune"));
    assert_eq!(file.content_type.as_deref(), Some("image/png"));
    assert_eq!(file.data, b"png".to_vec());

    let preset = uploads
        .iter()
        .find(|field| field.name == "upload_preset")
        .expect("preset part");
    assert_eq!(preset.data, b"fortune".to_vec());
}

#[tokio::test]
async fn host_image_requires_secure_url() {
    let app = Router::new().route("/v1_1/demo/image/upload", post(upload_without_url));
    let server_url = spawn_server(app).await;

    let err = services_for(&server_url)
        .host_image(b"png".to_vec(), "ghost's fortune")
        .await
        .expect_err("must fail");

    assert!(matches!(err, ServiceError::InvalidResponse(_)), "{err:?}");
}

#[tokio::test]
async fn fetch_image_returns_hosted_bytes() {
    let app = Router::new().route("/cards/abc.png", get(hosted_image));
    let server_url = spawn_server(app).await;

    let url = HostedImageUrl::parse(format!("{server_url}/cards/abc.png")).expect("url");
    let bytes = services_for(&server_url)
        .fetch_image(&url)
        .await
        .expect("fetch");

    assert_eq!(bytes, b"hosted-bytes".to_vec());
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = services_for(&format!("http://{addr}"))
        .request_fortune(&handle("ghost"))
        .await
        .expect_err("must fail");

    assert!(matches!(err, ServiceError::Transport(_)), "{err:?}");
}
