/// HTTP-level tests for the attendance daemon.
mod common;

use axum_test::TestServer;
use common::Subject;
use rollcalld::api::{self, routes::DetectResponse, routes::RecognitionResponse};
use rollcalld::AttendanceService;
use serde_json::{json, Value};

async fn setup() -> (TestServer, AttendanceService, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let service = common::service(&dir.path().join("known_faces")).await;
    let server = TestServer::new(api::router(service.clone())).unwrap();
    (server, service, dir)
}

async fn register(server: &TestServer, name: &str, image: String) -> axum_test::TestResponse {
    server
        .post("/register_face")
        .json(&json!({ "name": name, "image_data": image }))
        .await
}

#[tokio::test]
async fn test_register_face_success() {
    let (server, service, dir) = setup().await;

    let response = register(&server, "Jane Doe", common::face(Subject::Jane)).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["student_name"], "Jane Doe");

    assert_eq!(service.store().count_students().await.unwrap(), 1);
    assert_eq!(service.gallery_len().await, 1);
    let archived: Vec<_> = std::fs::read_dir(dir.path().join("known_faces")).unwrap().collect();
    assert_eq!(archived.len(), 1);
}

#[tokio::test]
async fn test_register_face_missing_fields() {
    let (server, service, _dir) = setup().await;

    let response = server
        .post("/register_face")
        .json(&json!({ "name": "Jane Doe" }))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Missing required data");

    let response = register(&server, "   ", common::face(Subject::Jane)).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "Name is required");

    assert_eq!(service.store().count_students().await.unwrap(), 0);
}

#[tokio::test]
async fn test_register_face_not_json() {
    let (server, _service, _dir) = setup().await;

    let response = server.post("/register_face").text("hello").await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_register_face_undecodable_image() {
    let (server, service, _dir) = setup().await;

    let response = register(&server, "Jane Doe", "data:image/jpeg;base64,aGVsbG8=".into()).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["message"].as_str().unwrap().starts_with("Invalid image data"));
    assert_eq!(service.store().count_students().await.unwrap(), 0);
}

#[tokio::test]
async fn test_register_face_no_face_stores_nothing() {
    let (server, service, dir) = setup().await;

    let response = register(&server, "Jane Doe", common::no_face()).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "No face detected in the image");

    assert_eq!(service.store().count_students().await.unwrap(), 0);
    assert!(!dir.path().join("known_faces").exists());
}

#[tokio::test]
async fn test_register_face_multiple_faces_stores_nothing() {
    let (server, service, _dir) = setup().await;

    let response = register(&server, "Jane Doe", common::two_faces()).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["message"].as_str().unwrap().starts_with("Multiple faces detected"));

    assert_eq!(service.store().count_students().await.unwrap(), 0);
    assert_eq!(service.gallery_len().await, 0);
}

#[tokio::test]
async fn test_register_then_recognize_then_already_marked() {
    let (server, service, _dir) = setup().await;

    let response = register(&server, "Jane Doe", common::face(Subject::Jane)).await;
    assert_eq!(response.status_code(), 200);

    let first: RecognitionResponse = server
        .post("/process_image")
        .json(&json!({ "image_data": common::face(Subject::Jane) }))
        .await
        .json();
    assert_eq!(first.status, "success");
    assert_eq!(first.student_name, "Jane Doe");
    assert_eq!(first.message, "Attendance marked for: Jane Doe");

    let second: RecognitionResponse = server
        .post("/process_image")
        .json(&json!({ "image_data": common::face(Subject::Jane) }))
        .await
        .json();
    assert_eq!(second.status, "info");
    assert!(second.message.contains("already marked"));
    assert_eq!(second.student_name, "Jane Doe");
    assert_eq!(second.timestamp, first.timestamp);

    assert_eq!(service.store().recent_attendance(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_process_image_empty_gallery() {
    let (server, _service, _dir) = setup().await;

    let body: RecognitionResponse = server
        .post("/process_image")
        .json(&json!({ "image_data": common::face(Subject::Jane) }))
        .await
        .json();
    assert_eq!(body.status, "info");
    assert_eq!(body.message, "No registered faces");
    assert_eq!(body.student_name, "Unknown");
}

#[tokio::test]
async fn test_process_image_no_face_writes_nothing() {
    let (server, service, _dir) = setup().await;
    register(&server, "Jane Doe", common::face(Subject::Jane)).await;

    let response = server
        .post("/process_image")
        .json(&json!({ "image_data": common::no_face() }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: RecognitionResponse = response.json();
    assert_eq!(body.message, "No face detected in the image");
    assert_eq!(body.student_name, "Unknown");

    assert!(service.store().recent_attendance(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_process_image_unknown_face() {
    let (server, service, _dir) = setup().await;
    register(&server, "Jane Doe", common::face(Subject::Jane)).await;

    let body: RecognitionResponse = server
        .post("/process_image")
        .json(&json!({ "image_data": common::face(Subject::John) }))
        .await
        .json();
    assert_eq!(body.status, "info");
    assert_eq!(body.message, "Face detected but not recognized");
    assert_eq!(body.student_name, "Unknown");
    assert!(service.store().recent_attendance(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_process_image_missing_image() {
    let (server, _service, _dir) = setup().await;

    let response = server.post("/process_image").json(&json!({})).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "No image data received");
}

#[tokio::test]
async fn test_process_image_bad_image() {
    let (server, _service, _dir) = setup().await;

    let response = server
        .post("/process_image")
        .json(&json!({ "image_data": "data:image/jpeg;base64,!!!" }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_detect_face_does_not_mark() {
    let (server, service, _dir) = setup().await;
    register(&server, "Jane Doe", common::face(Subject::Jane)).await;

    let known: DetectResponse = server
        .post("/detect_face")
        .json(&json!({ "image_data": common::face(Subject::Jane) }))
        .await
        .json();
    assert_eq!(known, DetectResponse { detected: true, name: "Jane Doe".into() });

    let stranger: DetectResponse = server
        .post("/detect_face")
        .json(&json!({ "image_data": common::face(Subject::John) }))
        .await
        .json();
    assert_eq!(stranger, DetectResponse { detected: true, name: "Unknown".into() });

    let nobody: DetectResponse = server
        .post("/detect_face")
        .json(&json!({ "image_data": common::no_face() }))
        .await
        .json();
    assert_eq!(nobody, DetectResponse { detected: false, name: "Unknown".into() });

    assert!(service.store().recent_attendance(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_index_lists_recent_attendance() {
    let (server, _service, _dir) = setup().await;
    register(&server, "Jane Doe", common::face(Subject::Jane)).await;
    server
        .post("/process_image")
        .json(&json!({ "image_data": common::face(Subject::Jane) }))
        .await;

    let response = server.get("/").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("Jane Doe"));

    let response = server.get("/register").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("/register_face"));
}

#[tokio::test]
async fn test_healthz() {
    let (server, _service, _dir) = setup().await;
    register(&server, "Jane Doe", common::face(Subject::Jane)).await;

    let body: Value = server.get("/healthz").await.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["students"], 1);
    assert_eq!(body["gallery_size"], 1);
    assert_eq!(body["gallery_version"], 2);
}
