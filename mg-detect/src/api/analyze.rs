//! Analysis endpoints
//!
//! - `POST /api/analyze` - multipart upload (field `file`), returns the assessment
//! - `GET /api/analysis/:id` - stored assessment
//! - `GET /api/detections?limit=N` - recent assessment summaries

use axum::{
    extract::{ConnectInfo, Multipart, Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::types::{AssessmentSummary, UnifiedAssessment};
use crate::AppState;

/// Default page size for `/api/detections`
const DEFAULT_LIST_LIMIT: usize = 10;

/// Upper bound for `/api/detections?limit=`
const MAX_LIST_LIMIT: usize = 100;

/// Identity used for rate limiting
///
/// The peer IP, else `"unknown"`. With `trust_forwarded_for` the first
/// `X-Forwarded-For` entry takes precedence over the peer.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    let forwarded = if trust_forwarded_for {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// POST /api/analyze
pub async fn analyze_upload(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UnifiedAssessment>> {
    let client = client_identity(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_forwarded_for,
    );

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, content) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;

    debug!(client = %client, filename = %filename, bytes = content.len(), "Upload received");

    let assessment = state.service.submit(&client, &filename, content).await?;
    Ok(Json(assessment))
}

/// GET /api/analysis/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UnifiedAssessment>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::NotFound(format!("Analysis {} not found", id)))?;

    state
        .service
        .lookup(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", id)))
}

/// Query parameters for `/api/detections`
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Recent assessments
#[derive(Debug, Serialize)]
pub struct DetectionsResponse {
    pub analyses: Vec<AssessmentSummary>,
    /// Number of stored assessments
    pub total: usize,
}

/// GET /api/detections
pub async fn list_detections(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<DetectionsResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    Json(DetectionsResponse {
        analyses: state.service.list_recent(limit).await,
        total: state.service.total_analyses().await,
    })
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(analyze_upload))
        .route("/api/analysis/:id", get(get_analysis))
        .route("/api/detections", get(list_detections))
}
