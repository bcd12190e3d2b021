use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use mizan_service::{AuditRequest, AuditResponse, Error as ServiceError, QueryRequest, QueryResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/assistant/query", post(query))
		.route("/v1/audit/document", post(audit_document))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn query(
	State(state): State<AppState>,
	Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
	let response = state.service.process_query(payload).await?;

	Ok(Json(response))
}

async fn audit_document(
	State(state): State<AppState>,
	Json(payload): Json<AuditRequest>,
) -> Result<Json<AuditResponse>, ApiError> {
	let response = state.service.audit_document(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } => Self {
				status: StatusCode::BAD_REQUEST,
				error_code: "invalid_request".to_string(),
				message,
			},
			ServiceError::Provider { message } => Self {
				status: StatusCode::BAD_GATEWAY,
				error_code: "provider_error".to_string(),
				message,
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
