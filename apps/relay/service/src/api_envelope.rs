use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

pub type ApiErrorTuple = (StatusCode, Json<ApiErrorResponse>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    NonceReplay,
    SignatureHeadersInvalid,
    TimestampExpired,
    BodyHashMismatch,
    InvalidSignature,
    RateLimited,
    InternalError,
}

impl ApiErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::NonceReplay => "nonce_replay",
            Self::SignatureHeadersInvalid => "signature_headers_invalid",
            Self::TimestampExpired => "timestamp_expired",
            Self::BodyHashMismatch => "body_hash_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::RateLimited => "rate_limited",
            Self::InternalError => "internal_error",
        }
    }

    pub const fn default_status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::NonceReplay => StatusCode::CONFLICT,
            Self::SignatureHeadersInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TimestampExpired => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BodyHashMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidSignature => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub message: String,
    pub error: ApiErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, Vec<String>>>,
}

pub fn error_response(code: ApiErrorCode, message: impl Into<String>) -> ApiErrorTuple {
    error_response_with_status(code.default_status(), code, message)
}

pub fn error_response_with_status(
    status: StatusCode,
    code: ApiErrorCode,
    message: impl Into<String>,
) -> ApiErrorTuple {
    error_response_with_fields(status, code, message, None)
}

pub fn error_response_with_fields(
    status: StatusCode,
    code: ApiErrorCode,
    message: impl Into<String>,
    errors: Option<HashMap<String, Vec<String>>>,
) -> ApiErrorTuple {
    let message = message.into();
    (
        status,
        Json(ApiErrorResponse {
            message: message.clone(),
            error: ApiErrorDetail {
                code: code.as_str(),
                message,
            },
            errors,
        }),
    )
}

pub fn validation_error(field: &'static str, message: &str) -> ApiErrorTuple {
    let mut errors = HashMap::new();
    errors.insert(field.to_string(), vec![message.to_string()]);

    error_response_with_fields(
        StatusCode::BAD_REQUEST,
        ApiErrorCode::InvalidRequest,
        message.to_string(),
        Some(errors),
    )
}

pub fn unauthorized_error(message: &str) -> ApiErrorTuple {
    error_response(ApiErrorCode::Unauthorized, message.to_string())
}

pub fn forbidden_error(message: &str) -> ApiErrorTuple {
    error_response(ApiErrorCode::Forbidden, message.to_string())
}

pub fn not_found_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::NotFound, message)
}

pub fn internal_error(message: impl Into<String>) -> ApiErrorTuple {
    error_response(ApiErrorCode::InternalError, message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiErrorMatrixEntry {
    pub code: &'static str,
    pub status: u16,
}

const API_ERROR_MATRIX: [ApiErrorMatrixEntry; 11] = [
    ApiErrorMatrixEntry {
        code: "invalid_request",
        status: 400,
    },
    ApiErrorMatrixEntry {
        code: "unauthorized",
        status: 401,
    },
    ApiErrorMatrixEntry {
        code: "forbidden",
        status: 403,
    },
    ApiErrorMatrixEntry {
        code: "not_found",
        status: 404,
    },
    ApiErrorMatrixEntry {
        code: "nonce_replay",
        status: 409,
    },
    ApiErrorMatrixEntry {
        code: "signature_headers_invalid",
        status: 422,
    },
    ApiErrorMatrixEntry {
        code: "timestamp_expired",
        status: 422,
    },
    ApiErrorMatrixEntry {
        code: "body_hash_mismatch",
        status: 422,
    },
    ApiErrorMatrixEntry {
        code: "invalid_signature",
        status: 422,
    },
    ApiErrorMatrixEntry {
        code: "rate_limited",
        status: 429,
    },
    ApiErrorMatrixEntry {
        code: "internal_error",
        status: 500,
    },
];

pub fn api_error_matrix() -> &'static [ApiErrorMatrixEntry] {
    &API_ERROR_MATRIX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_matrix_codes_are_unique() {
        let mut codes = std::collections::HashSet::new();
        for row in api_error_matrix() {
            assert!(
                codes.insert(row.code),
                "duplicate error code in matrix: {}",
                row.code
            );
        }
    }

    #[test]
    fn matrix_statuses_match_default_statuses() {
        let all = [
            ApiErrorCode::InvalidRequest,
            ApiErrorCode::Unauthorized,
            ApiErrorCode::Forbidden,
            ApiErrorCode::NotFound,
            ApiErrorCode::NonceReplay,
            ApiErrorCode::SignatureHeadersInvalid,
            ApiErrorCode::TimestampExpired,
            ApiErrorCode::BodyHashMismatch,
            ApiErrorCode::InvalidSignature,
            ApiErrorCode::RateLimited,
            ApiErrorCode::InternalError,
        ];
        for code in all {
            let row = api_error_matrix()
                .iter()
                .find(|entry| entry.code == code.as_str())
                .expect("every code has a matrix row");
            assert_eq!(row.status, code.default_status().as_u16());
        }
    }

    #[test]
    fn validation_error_maps_to_expected_shape() {
        let (status, payload) = validation_error("to", "Recipient must not be empty.");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = serde_json::to_value(payload.0).expect("serialize payload");
        assert_eq!(body["error"]["code"], "invalid_request");
        assert_eq!(body["errors"]["to"][0], "Recipient must not be empty.");
    }
}
