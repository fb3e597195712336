use axum::{
	Json, Router,
	extract::{
		DefaultBodyLimit, Path, Query, State,
		rejection::{JsonRejection, PathRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use xray_domain::Run;
use xray_service::{IngestResponse, ListRunsRequest, ListRunsResponse, QueryRequest, QueryResponse};

const RUN_NOT_FOUND: &str = "Run not found";
// Runs carry their sampled candidates inline.
const MAX_RUN_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/runs", post(ingest_run).get(list_runs))
		.route("/runs/query", post(query_runs))
		.route("/runs/{id}", get(get_run))
		.layer(DefaultBodyLimit::max(MAX_RUN_BODY_BYTES))
		.with_state(state)
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
	success: bool,
	data: T,
}
impl<T> Envelope<T> {
	fn ok(data: T) -> Json<Self> {
		Json(Self { success: true, data })
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	success: bool,
	error: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, message: impl Into<String>) -> Self {
		Self { status, message: message.into() }
	}
}

impl From<xray_service::Error> for ApiError {
	fn from(err: xray_service::Error) -> Self {
		match err {
			xray_service::Error::InvalidRequest { message } => {
				Self::new(StatusCode::BAD_REQUEST, message)
			},
			xray_service::Error::NotFound { message } => Self::new(StatusCode::NOT_FOUND, message),
			xray_service::Error::Storage { message } => {
				tracing::error!(error = %message, "Request failed in storage.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(ErrorBody { success: false, error: self.message })).into_response()
	}
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn ingest_run(
	State(state): State<AppState>,
	payload: Result<Json<Run>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
	let Json(run) = payload?;
	let response = state.service.ingest_run(&run).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn get_run(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Envelope<Run>>, ApiError> {
	// An id that is not a UUID cannot name a stored run.
	let Ok(Path(id)) = id else {
		return Err(ApiError::new(StatusCode::NOT_FOUND, RUN_NOT_FOUND));
	};
	let run = state.service.get_run(id).await?;

	Ok(Envelope::ok(run))
}

async fn list_runs(
	State(state): State<AppState>,
	params: Result<Query<ListRunsRequest>, QueryRejection>,
) -> Result<Json<Envelope<ListRunsResponse>>, ApiError> {
	let Query(req) = params?;
	let response = state.service.list_runs(req).await?;

	Ok(Envelope::ok(response))
}

async fn query_runs(
	State(state): State<AppState>,
	payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Envelope<QueryResponse>>, ApiError> {
	let Json(req) = payload?;
	let response = state.service.query(req).await?;

	Ok(Envelope::ok(response))
}
