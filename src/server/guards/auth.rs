use crate::server::router::FlagsState;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use gmsflags_schema::{ApiErrorBody, ApiErrorObject};
use subtle::ConstantTimeEq;

fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Admits only the process that launched this service.
#[derive(Debug, Clone, Copy)]
pub struct RequireServiceKey;

impl FromRequestParts<FlagsState> for RequireServiceKey {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &FlagsState,
    ) -> Result<Self, Self::Rejection> {
        match extract_bearer_token(&parts.headers) {
            Some(key) => {
                let expected = state.service_key.as_ref();
                if key.as_bytes().ct_eq(expected.as_bytes()).into() {
                    Ok(RequireServiceKey)
                } else {
                    Err(AuthError::InvalidKey)
                }
            }
            None => Err(AuthError::MissingKey),
        }
    }
}

pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingKey => "Missing service key",
            AuthError::InvalidKey => "Invalid service key",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiErrorBody {
                inner: ApiErrorObject {
                    code: "UNAUTHORIZED".to_string(),
                    message: message.to_string(),
                },
            }),
        )
            .into_response()
    }
}
