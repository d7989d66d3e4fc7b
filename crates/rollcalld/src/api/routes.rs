use crate::error::AppError;
use crate::service::{AttendanceService, Identification, Recognition};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const UNKNOWN: &str = "Unknown";

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub image_data: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image_data: Option<String>,
}

/// Body of a `/process_image` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    pub status: String,
    pub message: String,
    pub student_name: String,
    pub timestamp: String,
}

impl RecognitionResponse {
    fn new(status: &str, message: String, student_name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: status.to_string(),
            message,
            student_name: student_name.to_string(),
            timestamp: format_timestamp(timestamp),
        }
    }

    fn from_recognition(recognition: Recognition, now: DateTime<Utc>) -> Self {
        match recognition {
            Recognition::Marked { name, record, .. } => Self::new(
                "success",
                format!("Attendance marked for: {name}"),
                &name,
                record.timestamp,
            ),
            Recognition::AlreadyMarked { name, previous } => Self::new(
                "info",
                format!("Attendance already marked for {name} in the last hour"),
                &name,
                previous.timestamp,
            ),
            Recognition::NotRecognized { .. } => Self::new(
                "info",
                "Face detected but not recognized".into(),
                UNKNOWN,
                now,
            ),
            Recognition::NoFace => Self::new(
                "info",
                AppError::NoFaceDetected.to_string(),
                UNKNOWN,
                now,
            ),
            Recognition::NoRegisteredFaces => Self::new(
                "info",
                AppError::NoRegisteredFaces.to_string(),
                UNKNOWN,
                now,
            ),
        }
    }
}

/// Body of a `/detect_face` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detected: bool,
    pub name: String,
}

fn required(field: Option<String>, missing: &'static str) -> Result<String, AppError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or(AppError::MissingInput(missing))
}

/// Register a face under a name.
pub async fn register_face(
    State(service): State<AttendanceService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MissingInput("Missing required data"))?;
    let image_data = required(request.image_data, "Missing required data")?;
    let name = request.name.ok_or(AppError::MissingInput("Missing required data"))?;

    let registration = service.register(&name, &image_data, Utc::now()).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Face registered successfully",
            "student_id": registration.student.id,
            "student_name": registration.student.name,
        })),
    ))
}

/// Recognise a snapshot and mark attendance.
pub async fn process_image(
    State(service): State<AttendanceService>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<RecognitionResponse>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MissingInput("No image data received"))?;
    let image_data = required(request.image_data, "No image data received")?;

    let now = Utc::now();
    let recognition = service.recognize(&image_data, now).await?;
    Ok(Json(RecognitionResponse::from_recognition(recognition, now)))
}

/// Identify a snapshot without recording attendance.
pub async fn detect_face(
    State(service): State<AttendanceService>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MissingInput("No image data received"))?;
    let image_data = required(request.image_data, "No image data received")?;

    let response = match service.identify(&image_data).await? {
        Identification::Known { name, .. } => DetectResponse {
            detected: true,
            name,
        },
        Identification::Unknown => DetectResponse {
            detected: true,
            name: UNKNOWN.into(),
        },
        Identification::NoFace => DetectResponse {
            detected: false,
            name: UNKNOWN.into(),
        },
    };
    Ok(Json(response))
}

/// Health check endpoint
pub async fn healthz(State(service): State<AttendanceService>) -> Result<impl IntoResponse, AppError> {
    let students = service.store().count_students().await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "students": students,
            "gallery_size": service.gallery_len().await,
            "gallery_version": service.gallery_version().await,
        })),
    ))
}
