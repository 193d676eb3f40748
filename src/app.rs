use axum::{
    Json, Router, async_trait,
    body::Bytes,
    extract::{
        DefaultBodyLimit, FromRequest, FromRequestParts, Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::error::{Result, VizError};
use crate::openai::OpenAiClient;
use crate::saving::{Store, is_valid_user_id};
use crate::service::{
    ChartRequest, ExcelViz, ExportRequest, NarrativeRequest, SaveAnalysisRequest, SummaryRequest,
};
use crate::summary::{TextGenerator, UnconfiguredGenerator};

/// Header carrying the id of the authenticated user.
pub const USER_HEADER: &str = "x-user-id";

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PDF_MIME: &str = "application/pdf";

type AppState = Arc<ExcelViz>;

/// The owner id set by the authentication layer in front of the service.
pub struct AuthUser(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = VizError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        if user.is_empty() {
            return Err(VizError::Unauthorized(format!("missing {} header", USER_HEADER)));
        }
        if !is_valid_user_id(user) {
            return Err(VizError::Unauthorized("malformed user id".to_string()));
        }
        Ok(AuthUser(user.to_string()))
    }
}

/// `Json` whose rejections answer with the usual error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(VizError))]
struct ApiJson<T>(T);

fn body_error(status: StatusCode, detail: String) -> VizError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        VizError::PayloadTooLarge(detail)
    } else {
        VizError::InvalidBody(detail)
    }
}

impl From<JsonRejection> for VizError {
    fn from(rejection: JsonRejection) -> Self {
        body_error(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for VizError {
    fn from(rejection: MultipartRejection) -> Self {
        body_error(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for VizError {
    fn from(e: MultipartError) -> Self {
        warn!("unreadable multipart body: {}", e);
        body_error(e.status(), e.body_text())
    }
}

impl IntoResponse for VizError {
    fn into_response(self) -> Response {
        let status = match &self {
            VizError::NotFound(_) => StatusCode::NOT_FOUND,
            VizError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            VizError::SummaryGeneration(_) => StatusCode::BAD_GATEWAY,
            VizError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("request failed: {}", self);
        } else {
            warn!("request rejected: {}", self);
        }

        (
            status,
            Json(json!({ "message": self.to_string(), "error": self.kind() })),
        )
            .into_response()
    }
}

/// Builds the HTTP router around a service.
pub fn router(service: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload_file))
        .route("/api/upload/user", get(list_uploads))
        .route("/api/upload/recent-files", get(recent_uploads))
        .route("/api/upload/file/:id", get(download_upload))
        .route("/api/upload/columns/:file_id", get(upload_columns))
        .route("/api/upload/:id", delete(delete_upload))
        .route("/api/analysis/generate", post(generate_chart))
        .route("/api/analysis/summary", post(generate_summary))
        .route("/api/analysis/save", post(save_analysis))
        .route("/api/analysis/history", get(analysis_history))
        .route("/api/analysis/user-stats", get(user_stats))
        .route("/api/analysis/:id", get(get_analysis).delete(delete_analysis))
        .route("/api/analysis/:id/chart.png", get(analysis_png))
        .route("/api/ai/generate-summary", post(ai_summary))
        .route("/api/export/pdf", post(export_pdf))
        .route("/api/export/saved", post(store_export).get(list_exports))
        .route("/api/export/saved/:id", get(download_export))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Opens storage, picks the text generator and serves until shutdown.
pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(&config.database_dir)?;

    let generator: Arc<dyn TextGenerator> = match &config.text_gen {
        Some(text_gen) => {
            info!("narrative summaries use model {} at {}", text_gen.model, text_gen.base_url);
            Arc::new(OpenAiClient::new(text_gen)?)
        }
        None => {
            warn!("OPENAI_API_KEY is not set; narrative summaries are disabled");
            Arc::new(UnconfiguredGenerator)
        }
    };

    let service = Arc::new(ExcelViz::new(store, generator, config.summary_timeout));
    let app = router(service, config.max_upload_bytes);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// `Content-Disposition` for a download. The plain `filename` is reduced to
/// ASCII; `filename*` carries the full name.
fn attachment(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn download(mime: &'static str, filename: &str, bytes: Vec<u8>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    headers.insert(header::CONTENT_DISPOSITION, attachment(filename));
    (headers, bytes).into_response()
}

/// Text fields and the first `file` part of a multipart body.
struct Form {
    file_name: Option<String>,
    file: Option<Bytes>,
    fields: Vec<(String, String)>,
}

impl Form {
    async fn read(multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Self> {
        let mut multipart = multipart?;
        let mut form = Form { file_name: None, file: None, fields: Vec::new() };
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" && form.file.is_none() {
                form.file_name = field.file_name().map(String::from);
                form.file = Some(field.bytes().await?);
            } else {
                let value = field.text().await?;
                form.fields.push((name, value));
            }
        }
        Ok(form)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

// Uploads

async fn upload_file(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let form = Form::read(multipart).await?;
    let bytes = form
        .file
        .filter(|b| !b.is_empty())
        .ok_or(VizError::MissingInput { missing: vec!["file"] })?;
    let name = form.file_name.unwrap_or_default();

    let file = service.upload(&user, &name, &bytes)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "File uploaded successfully", "file": file })),
    ))
}

async fn list_uploads(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    let files = service.store().list_uploads(&user)?;
    Ok(Json(json!({ "files": files })))
}

async fn recent_uploads(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    let files = service.store().recent_uploads(&user)?;
    Ok(Json(json!({ "files": files })))
}

async fn download_upload(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let (file, bytes) = service.store().load_upload(&user, &id)?;
    Ok(download(XLSX_MIME, &file.name, bytes))
}

async fn upload_columns(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse> {
    let columns = service.columns(&user, &file_id)?;
    Ok(Json(json!({ "columns": columns })))
}

async fn delete_upload(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    service.store().delete_upload(&user, &id)?;
    Ok(Json(json!({ "message": "File deleted successfully" })))
}

// Analysis

async fn generate_chart(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<ChartRequest>,
) -> Result<impl IntoResponse> {
    Ok(Json(service.generate_chart(&user, &request)?))
}

async fn generate_summary(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<SummaryRequest>,
) -> Result<impl IntoResponse> {
    Ok(Json(service.generate_summary(&user, &request).await?))
}

async fn save_analysis(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<SaveAnalysisRequest>,
) -> Result<impl IntoResponse> {
    let analysis = service.save_analysis(&user, &request)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Chart saved successfully", "analysis": analysis })),
    ))
}

async fn analysis_history(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    Ok(Json(json!({ "history": service.history(&user)? })))
}

async fn user_stats(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    Ok(Json(service.stats(&user)?))
}

async fn get_analysis(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(json!({ "analysis": service.analysis(&user, &id)? })))
}

async fn delete_analysis(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    service.delete_analysis(&user, &id)?;
    Ok(Json(json!({ "message": "Analysis deleted successfully" })))
}

async fn analysis_png(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let png = service.analysis_png(&user, &id)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn ai_summary(
    State(service): State<AppState>,
    AuthUser(_user): AuthUser,
    ApiJson(request): ApiJson<NarrativeRequest>,
) -> Result<impl IntoResponse> {
    let narrative = service.narrate(&request).await?;
    Ok(Json(json!({ "summary": narrative.text })))
}

// Export

async fn export_pdf(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<ExportRequest>,
) -> Result<Response> {
    let document = service.export_document(&user, &request)?;
    Ok(download(PDF_MIME, &document.filename, document.bytes))
}

async fn store_export(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let form = Form::read(multipart).await?;
    let bytes = form.file.clone().unwrap_or_default();
    let title = form.field("title").unwrap_or("chart");
    let chart_kind = form.field("chartType").unwrap_or_default();

    let stored = service.store_export(&user, title, chart_kind, form.field("fileId"), &bytes)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "PDF saved successfully", "export": stored })),
    ))
}

async fn list_exports(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    Ok(Json(json!({ "exports": service.exports(&user)? })))
}

async fn download_export(
    State(service): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let (stored, bytes) = service.export_blob(&user, &id)?;
    let filename = crate::report::suggested_filename(Some(&stored.title));
    Ok(download(PDF_MIME, &filename, bytes))
}
