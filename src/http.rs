//! HTTP boundary: request validation, resolution, response mapping.
//!
//! Transport concerns only. The resolution semantics live in `identity`;
//! this module validates the body shape, holds the repository handle, and
//! maps resolution errors to status codes.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::ContactDb;
use crate::error::IdentityError;
use crate::identity::{self, ContactSummary};

/// Shared handler state. The repository sits behind a mutex so handlers take
/// turns on the single SQLite connection.
pub struct AppState {
    pub db: Mutex<ContactDb>,
}

/// Body of `POST /identify`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Success envelope: `{ "contact": { ... } }`.
#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub contact: ContactSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/identify", post(identify))
        .with_state(state)
}

async fn healthz() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

async fn identify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IdentifyRequest>,
) -> Result<Json<IdentifyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let db = match state.db.lock() {
        Ok(db) => db,
        Err(_) => {
            log::error!("Contact repository lock poisoned");
            return Err(internal_error());
        }
    };

    match identity::resolve(
        &db,
        request.email.as_deref(),
        request.phone_number.as_deref(),
    ) {
        Ok(contact) => Ok(Json(IdentifyResponse { contact })),
        Err(err) => Err(error_response(&err)),
    }
}

/// Map a resolution error to its transport shape. Client mistakes come back
/// as 400 with the message; everything else is a 500 whose details stay in
/// the server log.
fn error_response(err: &IdentityError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is_client_error() {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    } else {
        log::error!("Identify request failed: {err}");
        internal_error()
    }
}

fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;

    #[test]
    fn test_request_fields_are_optional_camel_case() {
        let request: IdentifyRequest =
            serde_json::from_str(r#"{"email":"doc@example.com","phoneNumber":"555-0100"}"#)
                .expect("parse");
        assert_eq!(request.email.as_deref(), Some("doc@example.com"));
        assert_eq!(request.phone_number.as_deref(), Some("555-0100"));

        let request: IdentifyRequest = serde_json::from_str("{}").expect("parse empty");
        assert!(request.email.is_none());
        assert!(request.phone_number.is_none());
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let (status, body) = error_response(&IdentityError::InvalidRequest);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("email or phoneNumber"));
    }

    #[test]
    fn test_consistency_error_maps_to_500_without_details() {
        let (status, body) =
            error_response(&IdentityError::Consistency("cluster has no primary".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn test_db_error_maps_to_500_without_details() {
        let (status, body) = error_response(&IdentityError::Db(DbError::Migration(
            "disk unhappy".to_string(),
        )));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn test_summary_serializes_into_contact_envelope() {
        let response = IdentifyResponse {
            contact: ContactSummary {
                primary_contact_id: 1,
                emails: vec!["doc@example.com".to_string()],
                phone_numbers: vec!["555-0100".to_string()],
                secondary_contact_ids: vec![2, 3],
            },
        };
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["contact"]["primaryContactId"], 1);
        assert_eq!(json["contact"]["emails"][0], "doc@example.com");
        assert_eq!(json["contact"]["phoneNumbers"][0], "555-0100");
        assert_eq!(json["contact"]["secondaryContactIds"][1], 3);
    }
}
