use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthenticatedUser};
use crate::db;
use crate::error::{ErrorKind, LibError};
use crate::models::{
    CreateProjectPayload, Dimensions, ListMediaQuery, ListProjectsQuery, MAX_UPLOAD_BYTES,
    MediaId, MediaKind, NewMedia, ProjectId, UpdateProjectPayload, normalize_tags,
};
use crate::permissions;

/// Extra room on the upload route for multipart boundaries and text fields
/// around a maximum-size file.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = format!("{:#}", self.0.source);
        if status.is_server_error() {
            tracing::error!(kind = ?self.0.kind, code = self.0.code, %error, "verso api request failed");
        } else {
            tracing::warn!(kind = ?self.0.kind, code = self.0.code, %error, "verso api request rejected");
        }

        let mut body = json!({
            "code": self.0.code,
            "message": self.0.public,
        });
        if let Some(details) = &self.0.details {
            body["details"] = json!(details);
        }

        (status, Json(json!({ "error": body }))).into_response()
    }
}

pub trait HasPool {
    fn pool(&self) -> Arc<sqlx::PgPool>;
}

pub trait VersoApp: HasPool {
    /// Pixel size of an uploaded video, if the host can work it out.
    fn probe_video_dimensions(&self, _payload: &[u8]) -> Option<Dimensions> {
        None
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(payload)) => Ok(payload),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AppError(LibError::payload_too_large(
                "Request body is too large",
                anyhow!(rejection.body_text()),
            )))
        }
        Err(rejection) => Err(AppError(LibError::invalid_with_code(
            "invalid_json",
            "Request body is not valid JSON for this resource",
            anyhow!(rejection.body_text()),
        ))),
    }
}

// Unparseable ids cannot name an existing record, so they read as not-found.

fn parse_project_id(raw: &str) -> Result<ProjectId, AppError> {
    raw.parse::<ProjectId>().map_err(|err| {
        AppError(LibError::not_found(
            permissions::PROJECT_NOT_FOUND,
            anyhow!("project id '{}' is not a uuid: {}", raw, err),
        ))
    })
}

fn parse_media_id(raw: &str) -> Result<MediaId, AppError> {
    raw.parse::<MediaId>().map_err(|err| {
        AppError(LibError::not_found(
            permissions::MEDIA_NOT_FOUND,
            anyhow!("media id '{}' is not a uuid: {}", raw, err),
        ))
    })
}

fn multipart_err(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError(LibError::payload_too_large(
            "Uploaded file exceeds the 50 MiB limit",
            anyhow!(err.body_text()),
        ))
    } else {
        AppError(LibError::invalid_with_code(
            "invalid_multipart",
            "Malformed multipart upload",
            anyhow!(err.body_text()),
        ))
    }
}

/// Accepts a JSON array, a comma separated list, or plain text for one `tags` field.
fn parse_tag_field(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => tags,
        Err(_) => raw.split(',').map(str::to_string).collect(),
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<NewMedia, AppError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut tags = Vec::new();
    let mut duration = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| "upload".to_string());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
                let data = field.bytes().await.map_err(multipart_err)?.to_vec();
                file = Some((file_name, content_type, data));
            }
            "tags" | "tags[]" => {
                let raw = field.text().await.map_err(multipart_err)?;
                tags.extend(parse_tag_field(&raw));
            }
            "duration" => {
                let raw = field.text().await.map_err(multipart_err)?;
                duration = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite() && *value >= 0.0);
            }
            _ => {}
        }
    }

    let Some((file_name, content_type, data)) = file else {
        return Err(AppError(LibError::invalid_with_code(
            "missing_file",
            "No file provided",
            anyhow!("multipart upload had no 'file' field"),
        )));
    };
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError(LibError::payload_too_large(
            "Uploaded file exceeds the 50 MiB limit",
            anyhow!("upload of {} bytes exceeds {}", data.len(), MAX_UPLOAD_BYTES),
        )));
    }

    Ok(NewMedia {
        file_name,
        content_type,
        data,
        tags: normalize_tags(tags),
        dimensions: None,
        duration,
    })
}

async fn create_project_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    payload: Result<Json<CreateProjectPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let payload = json_body(payload)?;
    let project = db::create_project(&app.pool(), auth_user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Query(query): Query<ListProjectsQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let page = db::list_projects(&app.pool(), auth_user.id(), query.pagination()).await?;
    Ok(Json(page))
}

async fn get_project_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let project_id = parse_project_id(&project_id)?;
    let project = db::get_project(&app.pool(), auth_user.id(), project_id).await?;
    Ok(Json(project))
}

async fn update_project_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(project_id): Path<String>,
    payload: Result<Json<UpdateProjectPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let project_id = parse_project_id(&project_id)?;
    let payload = json_body(payload)?;
    let project = db::update_project(&app.pool(), auth_user.id(), project_id, payload).await?;
    Ok(Json(project))
}

async fn delete_project_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let project_id = parse_project_id(&project_id)?;
    db::delete_project(&app.pool(), auth_user.id(), project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_media_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let multipart = multipart.map_err(|rejection| {
        AppError(LibError::invalid_with_code(
            "missing_file",
            "No file provided",
            anyhow!(rejection.body_text()),
        ))
    })?;
    let mut media = read_upload(multipart).await?;
    if media.kind() == MediaKind::Video {
        media.dimensions = app.probe_video_dimensions(&media.data);
    }

    let summary = db::create_media(&app.pool(), auth_user.id(), media).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn list_media_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Query(query): Query<ListMediaQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let filter = query.filter()?;
    let page = db::list_media(&app.pool(), auth_user.id(), query.pagination(), &filter).await?;
    Ok(Json(page))
}

async fn get_media_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let media_id = parse_media_id(&media_id)?;
    let content = db::get_media_content(&app.pool(), auth_user.id(), media_id).await?;
    let content_type = HeaderValue::from_str(&content.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    Ok(([(header::CONTENT_TYPE, content_type)], content.data))
}

async fn get_media_metadata_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let media_id = parse_media_id(&media_id)?;
    let metadata = db::get_media_metadata(&app.pool(), auth_user.id(), media_id).await?;
    Ok(Json(metadata))
}

async fn delete_media_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let media_id = parse_media_id(&media_id)?;
    db::delete_media(&app.pool(), auth_user.id(), media_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

pub fn routes<S>() -> Router<S>
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /projects [GET,POST]");
    tracing::info!("Registering route /projects/{{project_id}} [GET,PUT,DELETE]");
    tracing::info!("Registering route /media [GET,POST]");
    tracing::info!("Registering route /media/{{media_id}} [GET,DELETE]");
    tracing::info!("Registering route /media/{{media_id}}/metadata [GET]");

    Router::new()
        .route(
            "/projects",
            get(list_projects_handler::<S>).post(create_project_handler::<S>),
        )
        .route(
            "/projects/{project_id}",
            get(get_project_handler::<S>)
                .put(update_project_handler::<S>)
                .delete(delete_project_handler::<S>),
        )
        .route(
            "/media",
            get(list_media_handler::<S>)
                .post(upload_media_handler::<S>)
                .layer(DefaultBodyLimit::max(
                    MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES,
                )),
        )
        .route(
            "/media/{media_id}",
            get(get_media_handler::<S>).delete(delete_media_handler::<S>),
        )
        .route(
            "/media/{media_id}/metadata",
            get(get_media_metadata_handler::<S>),
        )
}

/// Full application router: everything under `/api`, caller identity resolved
/// from the gateway header for resource routes, and a 50 MiB body limit.
pub fn router<S>(state: S) -> Router
where
    S: VersoApp + Clone + Send + Sync + 'static,
{
    let api = Router::new()
        .route("/healthz", get(health_handler))
        .merge(routes::<S>().layer(middleware::from_fn(auth::trusted_header_identity)));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (
                LibError::unknown("boom", anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LibError::database("db", anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (LibError::invalid("bad", anyhow!("bad")), StatusCode::BAD_REQUEST),
            (
                permissions::project_not_found(ProjectId::default()),
                StatusCode::NOT_FOUND,
            ),
            (
                LibError::payload_too_large("big", anyhow!("big")),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                LibError::unauthorized("who", anyhow!("who")),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError(err).status(), status);
        }
    }

    #[test]
    fn tag_fields_accept_json_and_csv() {
        assert_eq!(parse_tag_field(r#"["a","b"]"#), vec!["a", "b"]);
        assert_eq!(parse_tag_field("a, b"), vec!["a", " b"]);
        assert_eq!(parse_tag_field("solo"), vec!["solo"]);
    }

    #[test]
    fn unparseable_ids_read_as_not_found() {
        let err = parse_project_id("not-a-uuid").expect_err("should fail");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.0.public, permissions::PROJECT_NOT_FOUND);

        let err = parse_media_id("1700000000000").expect_err("should fail");
        assert_eq!(err.0.public, permissions::MEDIA_NOT_FOUND);
    }
}
