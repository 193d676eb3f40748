#![cfg(feature = "web")]

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::{FakeGenerator, USER, sales_workbook, service_with};
use excelviz::app::{USER_HEADER, router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "excelviz-test-boundary";

fn app() -> (tempfile::TempDir, Router) {
    let (dir, service) = service_with(FakeGenerator::answering("A short narrative."));
    (dir, router(Arc::new(service), 10 * 1024 * 1024))
}

fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, f
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, header::HeaderMap) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec(), headers)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri).header(USER_HEADER, USER);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let (status, bytes, _) = send(app, builder.body(body).unwrap()).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn upload(app: &Router, bytes: &[u8]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(USER_HEADER, USER)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart(&[("file", Some("sales.xlsx"), bytes)])))
        .unwrap();
    let (status, body, _) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn requests_without_user_are_unauthorized() {
    let (_dir, app) = app();
    let request = Request::builder()
        .uri("/api/upload/user")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn upload_list_and_columns() {
    let (_dir, app) = app();
    let workbook = sales_workbook();
    let (status, body) = upload(&app, &workbook).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["file"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["file"]["name"], "sales.xlsx");

    let (status, body) = send_json(&app, "GET", "/api/upload/user", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 1);

    let (status, body) = send_json(&app, "GET", "/api/upload/recent-files", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["id"], id.as_str());

    let (status, body) = send_json(&app, "GET", &format!("/api/upload/columns/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["columns"], json!(["Month", "Sales", "Region", "Units"]));

    let request = Request::builder()
        .uri(format!("/api/upload/file/{}", id))
        .header(USER_HEADER, USER)
        .body(Body::empty())
        .unwrap();
    let (status, bytes, headers) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, workbook);
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("sales.xlsx")
    );

    let (status, _) = send_json(&app, "DELETE", &format!("/api/upload/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, "GET", &format!("/api/upload/columns/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_of_non_workbook_is_bad_request() {
    let (_dir, app) = app();
    let (status, body) = upload(&app, b"hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "format_error");
}

#[tokio::test]
async fn generate_summary_and_errors() {
    let (_dir, app) = app();
    let (_, body) = upload(&app, &sales_workbook()).await;
    let id = body["file"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/analysis/generate",
        Some(json!({ "fileId": id, "xAxis": "Month", "yAxis": "Sales", "chartType": "Bar Chart" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dataset"]["categorical2D"]["values"][2], 0.0);
    assert_eq!(body["title"], "Sales");

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/analysis/generate",
        Some(json!({ "fileId": id, "xAxis": "Month", "yAxis": "Sales", "chartType": "3D Bar Chart" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/analysis/summary",
        Some(json!({ "fileId": id, "xAxis": "Month", "yAxis": "Sales", "chartType": "line" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "statistical");
    assert_eq!(body["total"], 742.0);

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/analysis/summary",
        Some(json!({
            "fileId": id, "xAxis": "Month", "yAxis": "Sales", "chartType": "line", "mode": "narrative"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "narrative");
    assert_eq!(body["text"], "A short narrative.");

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/ai/generate-summary",
        Some(json!({ "title": "T", "chartType": "Bar Chart", "xAxis": ["a"], "yAxisData": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "A short narrative.");
}

#[tokio::test]
async fn save_history_and_stats() {
    let (_dir, app) = app();
    let (_, body) = upload(&app, &sales_workbook()).await;
    let id = body["file"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/analysis/save",
        Some(json!({ "fileId": id, "xAxis": "Region", "yAxis": "Sales", "chartType": "pie" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let analysis_id = body["analysis"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(&app, "GET", "/api/analysis/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"][0]["id"], analysis_id.as_str());

    let (_, body) = send_json(&app, "GET", "/api/analysis/user-stats", None).await;
    assert_eq!(body, json!({ "chartsCreated": 1, "filesUploaded": 1 }));

    let (status, body) = send_json(&app, "GET", &format!("/api/analysis/{}", analysis_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"]["dataset"]["distribution"]["counts"], json!([3, 2, 1]));

    let (status, _) = send_json(&app, "DELETE", &format!("/api/analysis/{}", analysis_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, "GET", &format!("/api/analysis/{}", analysis_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_pdf_download() {
    let (_dir, app) = app();
    let (_, body) = upload(&app, &sales_workbook()).await;
    let id = body["file"]["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/api/export/pdf")
        .header(USER_HEADER, USER)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "title": "Sales Report", "summary": "Up and to the right.", "fileId": id })
                .to_string(),
        ))
        .unwrap();
    let (status, bytes, headers) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("filename=\"Sales Report.pdf\"")
    );

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/export/pdf",
        Some(json!({ "summary": "no title or file" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_input");
}

#[tokio::test]
async fn stored_export_blobs() {
    let (_dir, app) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/export/saved")
        .header(USER_HEADER, USER)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart(&[
            ("title", None, b"Q3 Report"),
            ("chartType", None, b"Bar Chart"),
            ("file", Some("q3.pdf"), b"%PDF-1.3 stored"),
        ])))
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    let export_id = body["export"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["export"]["title"], "Q3 Report");

    let (_, body) = send_json(&app, "GET", "/api/export/saved", None).await;
    assert_eq!(body["exports"].as_array().unwrap().len(), 1);

    let request = Request::builder()
        .uri(format!("/api/export/saved/{}", export_id))
        .header(USER_HEADER, USER)
        .body(Body::empty())
        .unwrap();
    let (status, bytes, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF-1.3 stored");
}

#[tokio::test]
async fn generator_failure_is_bad_gateway() {
    let (_dir, service) = service_with(FakeGenerator::failing("upstream down"));
    let app = router(Arc::new(service), 1024 * 1024);
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/ai/generate-summary",
        Some(json!({ "title": "T", "chartType": "Bar Chart", "xAxis": ["a"], "yAxisData": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "summary_generation_error");
}

#[tokio::test]
async fn unknown_chart_type_and_analysis() {
    let (_dir, app) = app();
    let (_, body) = upload(&app, &sales_workbook()).await;
    let id = body["file"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/analysis/generate",
        Some(json!({ "fileId": id, "xAxis": "Month", "yAxis": "Sales", "chartType": "radar" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_chart_kind");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = send_json(&app, "GET", &format!("/api/analysis/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn malformed_bodies_answer_with_error_json() {
    let (_dir, app) = app();

    let (status, body) =
        send_json(&app, "POST", "/api/analysis/generate", Some(json!({ "fileId": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));

    let request = Request::builder()
        .method("POST")
        .uri("/api/export/pdf")
        .header(USER_HEADER, USER)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "invalid_body");

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(USER_HEADER, USER)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "invalid_body");
}

#[tokio::test]
async fn narrative_summary_accepts_numeric_labels() {
    let (_dir, app) = app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/ai/generate-summary",
        Some(json!({
            "title": "Yearly revenue",
            "chartType": "Line Chart",
            "xAxis": [2020, 2021, 2022],
            "yAxisData": [10, 12, 15]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "A short narrative.");
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let (_dir, service) = service_with(FakeGenerator::answering("unused"));
    let app = router(Arc::new(service), 1024);

    let (status, body) = upload(&app, &sales_workbook()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
}
