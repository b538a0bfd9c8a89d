use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use sims_api_rust::database::models::{EntryStatus, Role};
use sims_api_rust::handlers::router;
use sims_api_rust::testing::MemoryStore;

const IMPORT_CSV: &str = "pg_username,case_title,date,status\n\
                          pg1,Imported Case,2024-01-01,pending\n\
                          unknown,Bad Case,2024-01-01,pending\n";

fn seeded() -> (Router, MemoryStore, Vec<i64>) {
    let store = MemoryStore::new();
    store.seed_user(1, "admin", Role::Admin);
    store.seed_user(2, "sup", Role::Supervisor);
    let trainee = store.seed_user(3, "pg1", Role::Pg);
    let entry_ids = (0..3)
        .map(|i| store.seed_entry(trainee.id, &format!("Case {i}")))
        .collect();
    (router(store.clone()), store, entry_ids)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(uri: &str, actor_id: i64, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-actor-id", actor_id.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(
    actor_id: i64,
    filename: &str,
    content: &str,
    dry_run: bool,
    allow_partial: bool,
) -> Request<Body> {
    let boundary = "sims-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"dry_run\"\r\n\r\n\
         {dry_run}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"allow_partial\"\r\n\r\n\
         {allow_partial}\r\n\
         --{boundary}--\r\n"
    );
    Request::post("/api/bulk/import")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("x-actor-id", actor_id.to_string())
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn review_endpoint_applies_the_requested_status() {
    let (app, store, entry_ids) = seeded();
    let request = json_request(
        "/api/bulk/review",
        1,
        &json!({ "entry_ids": entry_ids, "status": "approved" }),
    );
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"], "review");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["success_count"], 3);
    assert_eq!(store.count_with_status(EntryStatus::Approved), 3);
}

#[tokio::test]
async fn missing_actor_header_is_unauthorized() {
    let (app, _store, entry_ids) = seeded();
    let request = Request::post("/api/bulk/review")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "entry_ids": entry_ids, "status": "approved" }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn trainees_are_forbidden_from_bulk_review() {
    let (app, store, entry_ids) = seeded();
    let request = json_request(
        "/api/bulk/review",
        3,
        &json!({ "entry_ids": entry_ids, "status": "approved" }),
    );
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(store.count_with_status(EntryStatus::Approved), 0);
}

#[tokio::test]
async fn empty_entry_ids_are_rejected() {
    let (app, _store, _entry_ids) = seeded();
    let request = json_request(
        "/api/bulk/review",
        1,
        &json!({ "entry_ids": [], "status": "approved" }),
    );
    let (status, _body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assignment_endpoint_reassigns_entries() {
    let (app, store, entry_ids) = seeded();
    let request = json_request(
        "/api/bulk/assignment",
        1,
        &json!({ "entry_ids": entry_ids, "supervisor_id": 2 }),
    );
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"], "assignment");
    assert_eq!(body["success_count"], 3);
    for id in entry_ids {
        assert_eq!(store.entry(id).unwrap().supervisor_id, Some(2));
    }
}

#[tokio::test]
async fn unknown_supervisor_is_not_found() {
    let (app, _store, entry_ids) = seeded();
    let request = json_request(
        "/api/bulk/assignment",
        1,
        &json!({ "entry_ids": entry_ids, "supervisor_id": 42 }),
    );
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn import_dry_run_round_trip() {
    let (app, store, _entry_ids) = seeded();
    let before = store.entry_count();
    let request = multipart_request(1, "import.csv", IMPORT_CSV, true, false);
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operation"], "import");
    assert_eq!(body["success_count"], 1);
    assert_eq!(body["failure_count"], 1);
    assert_eq!(store.entry_count(), before);
}

#[tokio::test]
async fn strict_import_failure_maps_to_bad_request() {
    let (app, store, _entry_ids) = seeded();
    let before = store.entry_count();
    let request = multipart_request(1, "import.csv", IMPORT_CSV, false, false);
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failed");
    assert_eq!(store.entry_count(), before);
}

#[tokio::test]
async fn partial_import_persists_the_valid_rows() {
    let (app, store, _entry_ids) = seeded();
    let request = multipart_request(1, "import.csv", IMPORT_CSV, false, true);
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(store.count_with_title("Imported Case"), 1);
}

#[tokio::test]
async fn unsupported_upload_format_is_a_validation_error() {
    let (app, _store, _entry_ids) = seeded();
    let request = multipart_request(1, "import.pdf", IMPORT_CSV, true, false);
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["message"], "Unsupported file format");
}

#[tokio::test]
async fn health_endpoint_needs_no_actor() {
    let (app, _store, _entry_ids) = seeded();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
