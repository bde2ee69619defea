use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sri_server::{build_app, AppState, DocumentDto};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn app_with(admin_token: Option<&str>) -> (Router, TempDir) {
    let dir = tempdir().unwrap();
    let state = AppState::open(dir.path(), admin_token.map(String::from)).unwrap();
    (build_app(state), dir)
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Bytes) {
    let req = Request::post(uri).header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();
    call(app, req).await
}

async fn seed(app: &Router) -> Vec<DocumentDto> {
    let docs = json!([
        { "title": "Cat", "text": "the cat sat" },
        { "title": "Mat", "text": "the cat sat on the mat" },
        { "title": "Dogs", "text": "dogs run fast" },
    ]);
    let (status, body) = post_json(app, "/api/documents/many", docs).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_documents() {
    let (app, _dir) = app_with(None);
    let created = seed(&app).await;

    let (status, body) = get(&app, "/api/documents/search?query=cat&maxResults=5&algo=bm25").await;
    assert_eq!(status, StatusCode::OK);
    let hits: Vec<DocumentDto> = serde_json::from_slice(&body).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0], created[0]);
    assert_eq!(hits[1].id, created[1].id);

    let (_, body) = get(&app, "/api/documents/search?query=cat&algo=TFIDF").await;
    let hits: Vec<DocumentDto> = serde_json::from_slice(&body).unwrap();
    assert_eq!(hits.len(), 2);

    let (_, body) = get(&app, "/api/documents/search?query=dog&maxResults=500&algo=tfidf").await;
    let hits: Vec<DocumentDto> = serde_json::from_slice(&body).unwrap();
    assert_eq!(hits.iter().map(|d| d.title.as_str()).collect::<Vec<_>>(), vec!["Dogs"]);
}

#[tokio::test]
async fn zero_max_results_is_bad_request() {
    let (app, _dir) = app_with(None);
    seed(&app).await;
    let (status, _) = get(&app, "/api/documents/search?query=cat&maxResults=0&algo=bm25").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_algorithm_is_bad_request() {
    let (app, _dir) = app_with(None);
    seed(&app).await;
    let (status, body) = get(&app, "/api/documents/search?query=cat&algo=lsi").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("lsi"));
}

#[tokio::test]
async fn create_get_and_delete_document() {
    let (app, _dir) = app_with(None);
    let (status, body) = post_json(&app, "/api/documents", json!({ "title": "Rust", "text": "ownership and borrowing" })).await;
    assert_eq!(status, StatusCode::OK);
    let doc: DocumentDto = serde_json::from_slice(&body).unwrap();

    let (status, body) = get(&app, &format!("/api/documents/{}", doc.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<DocumentDto>(&body).unwrap(), doc);

    let delete = |id| Request::delete(format!("/api/documents/{id}")).body(Body::empty()).unwrap();
    let (status, _) = call(&app, delete(doc.id)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, delete(doc.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, &format!("/api/documents/{}", doc.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = get(&app, "/api/documents/search?query=borrowing&algo=bm25").await;
    assert!(serde_json::from_slice::<Vec<DocumentDto>>(&body).unwrap().is_empty());
}

#[tokio::test]
async fn reindex_requires_admin_token() {
    let (app, _dir) = app_with(Some("secret"));
    seed(&app).await;

    let (status, _) = call(&app, Request::post("/api/admin/reindex").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/api/admin/reindex").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["reindexed"], 3);
    assert_eq!(json["documents"]["tfidf"], 3);
    assert_eq!(json["documents"]["bm25"], 3);
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _dir) = app_with(None);
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}
