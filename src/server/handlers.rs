/// API Request Handlers
/// Thin wrappers over the receiving desk

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cli::{get_version, BUILD_TIMESTAMP};
use crate::core::analytics::Analytics;
use crate::core::seed::clock_seed;
use crate::core::{
    Action, DeskError, Event, ExportFormat, FacilityMeta, ReceivingDesk, Referral, RejectReason,
    VitalsInput,
};
use crate::utils::DEFAULT_EVENT_LIMIT;

// ============================================================================
// Shared State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<RwLock<ReceivingDesk>>,
    /// Shared bearer token; `None` leaves mutating routes open
    pub token: Option<String>,
    /// Referrals seeded by `POST /api/day` when the body gives no count
    pub seed_count: usize,
}

impl AppState {
    pub fn new(desk: ReceivingDesk, token: Option<String>, seed_count: usize) -> Self {
        Self {
            desk: Arc::new(RwLock::new(desk)),
            token,
            seed_count,
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

/// Error envelope with the matching HTTP status
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        let status = match &err {
            DeskError::UnknownReferral(_) | DeskError::UnknownFacility(_) => StatusCode::NOT_FOUND,
            DeskError::InvalidTransition { .. } => StatusCode::CONFLICT,
            DeskError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// JSON body whose rejections come back in the API envelope
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError {
                status: rejection.status(),
                message: rejection.body_text(),
            }),
        }
    }
}

#[derive(Serialize)]
pub struct HealthInfo {
    status: &'static str,
    actor: String,
    referrals: usize,
    last_event_id: i64,
}

#[derive(Serialize)]
pub struct VersionInfo {
    version: &'static str,
    build: &'static str,
}

#[derive(Serialize)]
pub struct FacilityInfo {
    name: String,
    #[serde(flatten)]
    meta: FacilityMeta,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    since: i64,
    #[serde(default, rename = "case")]
    case_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_EVENT_LIMIT
}

#[derive(Deserialize)]
pub struct RejectBody {
    reason: RejectReason,
}

#[derive(Deserialize)]
pub struct InterventionsBody {
    names: Vec<String>,
}

#[derive(Deserialize)]
pub struct IcuBody {
    beds: u32,
}

#[derive(Deserialize, Default)]
pub struct NewDayBody {
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Serialize)]
pub struct NewDayInfo {
    seed: u64,
    count: usize,
}

// ============================================================================
// Read Handlers
// ============================================================================

pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthInfo> {
    let desk = state.desk.read().await;
    let last_event_id = desk.events().last_id().await?;
    Ok(Json(ApiResponse::ok(HealthInfo {
        status: "ok",
        actor: desk.actor().to_string(),
        referrals: desk.referrals().len(),
        last_event_id,
    })))
}

pub async fn get_version_info() -> Json<ApiResponse<VersionInfo>> {
    Json(ApiResponse::ok(VersionInfo {
        version: get_version(),
        build: BUILD_TIMESTAMP,
    }))
}

pub async fn get_facilities(State(state): State<AppState>) -> Json<ApiResponse<Vec<FacilityInfo>>> {
    let desk = state.desk.read().await;
    let registry = desk.facilities();
    let facilities = registry
        .names()
        .iter()
        .map(|name| FacilityInfo {
            name: name.clone(),
            meta: registry.meta(name),
        })
        .collect();
    Json(ApiResponse::ok(facilities))
}

pub async fn get_queue(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Vec<Referral>> {
    let desk = state.desk.read().await;
    desk.facility_meta(&name)?;
    let queue = desk.incoming_queue(&name).into_iter().cloned().collect();
    Ok(Json(ApiResponse::ok(queue)))
}

pub async fn get_analytics(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Analytics> {
    let desk = state.desk.read().await;
    desk.facility_meta(&name)?;
    Ok(Json(ApiResponse::ok(desk.analytics(&name))))
}

async fn export(state: AppState, name: String, format: ExportFormat) -> Result<Response, ApiError> {
    let desk = state.desk.read().await;
    desk.facility_meta(&name)?;
    let body = desk.export(&name, format)?;
    let disposition = format!("attachment; filename=\"{}\"", format.default_file_name());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn export_csv(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    export(state, name, ExportFormat::Csv).await
}

pub async fn export_json(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    export(state, name, ExportFormat::Json).await
}

pub async fn get_referral(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Referral> {
    let desk = state.desk.read().await;
    Ok(Json(ApiResponse::ok(desk.referral(&id)?.clone())))
}

pub async fn get_isbar(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    let desk = state.desk.read().await;
    Ok(Json(ApiResponse::ok(desk.isbar(&id)?)))
}

pub async fn get_events(State(state): State<AppState>, Query(query): Query<EventsQuery>) -> ApiResult<Vec<Event>> {
    let desk = state.desk.read().await;
    let events = desk
        .events()
        .poll_events_since(query.since, query.case_id.as_deref(), query.limit.clamp(1, 1000))
        .await?;
    Ok(Json(ApiResponse::ok(events)))
}

// ============================================================================
// Mutating Handlers
// ============================================================================

async fn apply(state: AppState, id: String, action: Action) -> ApiResult<Referral> {
    let mut desk = state.desk.write().await;
    let referral = desk.apply(&id, action).await?;
    Ok(Json(ApiResponse::ok(referral)))
}

pub async fn accept(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Referral> {
    apply(state, id, Action::Accept).await
}

pub async fn enroute(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Referral> {
    apply(state, id, Action::EnRoute).await
}

pub async fn arrive(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Referral> {
    apply(state, id, Action::Arrive).await
}

pub async fn handover(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Referral> {
    apply(state, id, Action::Handover).await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RejectBody>,
) -> ApiResult<Referral> {
    apply(state, id, Action::Reject(body.reason)).await
}

pub async fn record_vitals(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<VitalsInput>,
) -> ApiResult<Referral> {
    let mut desk = state.desk.write().await;
    Ok(Json(ApiResponse::ok(desk.record_vitals(&id, input).await?)))
}

pub async fn record_interventions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InterventionsBody>,
) -> ApiResult<Referral> {
    let mut desk = state.desk.write().await;
    Ok(Json(ApiResponse::ok(desk.record_interventions(&id, &body.names).await?)))
}

pub async fn set_icu(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ApiJson(body): ApiJson<IcuBody>,
) -> ApiResult<FacilityMeta> {
    let mut desk = state.desk.write().await;
    Ok(Json(ApiResponse::ok(desk.set_icu_open(&name, body.beds).await?)))
}

pub async fn new_day(State(state): State<AppState>, body: Option<ApiJson<NewDayBody>>) -> ApiResult<NewDayInfo> {
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let seed = body.seed.unwrap_or_else(clock_seed);
    let count = body.count.unwrap_or(state.seed_count);

    let mut desk = state.desk.write().await;
    let count = desk.new_day(seed, count).await?;
    Ok(Json(ApiResponse::ok(NewDayInfo { seed, count })))
}
