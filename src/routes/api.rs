use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::certificate::{
    excel_filename, pdf_filename, sanitize_serial_no, template_name, CertificateFields,
};
use crate::convert::{ConversionRequest, PipelineOutcome};
use crate::state::AppState;

pub async fn create_certificate(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut mode = String::new();
    let mut serial_no = String::new();
    let mut tested_date = String::new();
    let mut year = String::new();
    let mut signature: Option<(String, Vec<u8>)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "mode" => {
                if let Ok(text) = field.text().await {
                    mode = text.trim().to_string();
                }
            }
            "serial_no" => {
                if let Ok(text) = field.text().await {
                    serial_no = text.trim().to_string();
                }
            }
            "tested_date" => {
                if let Ok(text) = field.text().await {
                    tested_date = text.trim().to_string();
                }
            }
            "year" => {
                if let Ok(text) = field.text().await {
                    year = text.trim().to_string();
                }
            }
            "signature" => {
                let original = field.file_name().unwrap_or("signature.png").to_string();
                if let Ok(data) = field.bytes().await {
                    if !data.is_empty() {
                        signature = Some((original, data.to_vec()));
                    }
                }
            }
            _ => {}
        }
    }

    // input validation happens before any filesystem or conversion work
    if mode.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Mode is required");
    }
    if serial_no.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Serial number is required");
    }
    let sanitized = sanitize_serial_no(&serial_no);

    let template_path = state.config.templates_dir.join(template_name(&mode));
    if !template_path.exists() {
        tracing::error!("certificate template not found: {}", template_path.display());
        return error_response(StatusCode::NOT_FOUND, "Certificate template not found");
    }

    if let Some((original, data)) = signature {
        let filename = crate::storage::signature_filename(&original);
        let path = state.config.uploads_dir.join(&filename);
        if let Err(e) = std::fs::write(&path, &data) {
            tracing::warn!("could not store signature upload: {}", e);
        } else {
            tracing::info!("stored signature upload as {}", filename);
        }
    }

    let fields = CertificateFields {
        mode,
        serial_no,
        tested_date,
        year,
    };

    let excel_name = excel_filename(&sanitized);
    let pdf_name = pdf_filename(&sanitized);
    let excel_path = state.config.exports_dir.join(&excel_name);
    let pdf_path = state.config.exports_dir.join(&pdf_name);

    if let Err(e) = crate::workbook::fill_template(&template_path, &excel_path, &fields) {
        tracing::error!("template filling failed: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not fill the certificate template",
        );
    }
    tracing::info!("filled certificate workbook {}", excel_name);

    let request = ConversionRequest {
        source: excel_path,
        destination: pdf_path,
        fields: fields.clone(),
    };

    let result = {
        let _guard = state.convert_lock.lock().await;
        match state.pipeline.run(&request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("conversion pipeline refused the job: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
            }
        }
    };

    // the filled workbook is delivered whether or not a PDF came out
    let excel_url = format!("/exports/{}", excel_name);
    match result.outcome {
        PipelineOutcome::Converted { strategy, .. } => Json(serde_json::json!({
            "serial_no": fields.serial_no,
            "excel_path": excel_url,
            "pdf_path": format!("/exports/{}", pdf_name),
            "strategy": strategy,
        }))
        .into_response(),
        PipelineOutcome::Exhausted => Json(serde_json::json!({
            "serial_no": fields.serial_no,
            "excel_path": excel_url,
            "pdf_path": serde_json::Value::Null,
            "conversion": "unavailable",
            "attempts": result.attempts,
        }))
        .into_response(),
    }
}

pub async fn download_export(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    serve_artifact(&state.config.exports_dir, &filename)
}

pub async fn download_upload(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    serve_artifact(&state.config.uploads_dir, &filename)
}

fn serve_artifact(dir: &std::path::Path, filename: &str) -> axum::response::Response {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return error_response(StatusCode::BAD_REQUEST, "Invalid filename");
    }

    let path = dir.join(filename);
    match std::fs::read(&path) {
        Ok(content) => {
            let mime = mime_guess::from_path(filename)
                .first_raw()
                .unwrap_or("application/octet-stream");
            axum::response::Response::builder()
                .header("Content-Type", mime)
                .header(
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", filename),
                )
                .body(axum::body::Body::from(content))
                .unwrap()
                .into_response()
        }
        Err(_) => error_response(StatusCode::NOT_FOUND, "File not found"),
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "strategies": state.pipeline.strategy_count(),
        "exports_dir": state.config.exports_dir.display().to_string(),
        "uploads_dir": state.config.uploads_dir.display().to_string(),
        "templates_dir": state.config.templates_dir.display().to_string(),
    }))
}

pub async fn sweep(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let max_age = state.config.retention_age;
    let exports = crate::storage::sweep_stale(&state.config.exports_dir, max_age);
    let uploads = crate::storage::sweep_stale(&state.config.uploads_dir, max_age);

    match (exports, uploads) {
        (Ok(exports), Ok(uploads)) => {
            tracing::info!("sweep removed {} exports, {} uploads", exports, uploads);
            Json(serde_json::json!({
                "removed": { "exports": exports, "uploads": uploads }
            }))
            .into_response()
        }
        (e, u) => {
            let detail = e.err().or(u.err()).map(|e| e.to_string()).unwrap_or_default();
            tracing::error!("retention sweep failed: {}", detail);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Sweep failed")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}
