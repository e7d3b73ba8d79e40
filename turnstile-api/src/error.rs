use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use turnstile_core::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{error}")]
    Booking {
        error: BookingError,
        /// Replaces the message of retryable errors.
        retry_hint: Option<&'static str>,
    },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn with_retry_hint(self, hint: &'static str) -> Self {
        match self {
            AppError::Booking { error, .. } => AppError::Booking {
                error,
                retry_hint: Some(hint),
            },
            other => other,
        }
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        AppError::Booking {
            error,
            retry_hint: None,
        }
    }
}

fn status_for(error: &BookingError) -> StatusCode {
    match error {
        BookingError::SeatUnavailable { .. }
        | BookingError::HolderLimitReached { .. }
        | BookingError::IdempotencyConflict { .. } => StatusCode::CONFLICT,
        BookingError::HoldExpired(_) => StatusCode::GONE,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        BookingError::Store(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        BookingError::ConsistencyFault { .. } | BookingError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, retryable) = match self {
            AppError::Booking { error, retry_hint } => {
                let status = status_for(&error);
                let retryable = error.is_retryable();
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(code = error.code(), "Internal Server Error: {}", error);
                    "Internal Server Error".to_string()
                } else if retryable {
                    tracing::warn!("Store unavailable: {}", error);
                    retry_hint.unwrap_or("Temporarily unavailable, retry later").to_string()
                } else {
                    error.to_string()
                };
                (status, error.code(), message, retryable)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg, false),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error".to_string(),
                    false,
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let conflict = BookingError::SeatUnavailable {
            event_id: "e".to_string(),
            seat_id: "A101".to_string(),
        };
        assert_eq!(status_for(&conflict), StatusCode::CONFLICT);
        assert_eq!(status_for(&BookingError::HoldExpired(Uuid::new_v4())), StatusCode::GONE);
        assert_eq!(
            status_for(&BookingError::Store(StoreError::Unavailable("down".to_string()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&BookingError::ConsistencyFault {
                hold_id: Uuid::new_v4(),
                seat_id: "A101".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_retry_hint_only_on_booking_errors() {
        let err = AppError::from(BookingError::Store(StoreError::Unavailable("down".to_string())))
            .with_retry_hint("retry");
        assert!(matches!(err, AppError::Booking { retry_hint: Some("retry"), .. }));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
