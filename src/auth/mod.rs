//! Owner identity extraction.
//!
//! Authentication itself happens upstream: a gateway verifies the session and
//! forwards the owner's UUID in a trusted header. The core trusts that value
//! completely and only enforces owner scoping with it.

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::config::OWNER_ID_HEADER;
use crate::error::ErrorResponse;

/// Authentication error for extractors.
#[derive(Debug)]
pub struct AuthError {
    message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message.clone(),
        })
    }
}

/// Extractor for the gateway-verified owner UUID.
///
/// Use this in handlers that operate on owner-scoped records:
/// ```ignore
/// async fn protected_handler(owner: OwnerId) -> impl Responder {
///     // owner.0 is the verified owner UUID
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub Uuid);

impl FromRequest for OwnerId {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header = req
            .headers()
            .get(OWNER_ID_HEADER)
            .and_then(|v| v.to_str().ok());

        let result = match header {
            Some(raw) => Uuid::parse_str(raw).map(OwnerId).map_err(|_| AuthError {
                message: format!("{} header is not a valid UUID", OWNER_ID_HEADER),
            }),
            None => Err(AuthError {
                message: format!("Missing owner identity. Provide {} header.", OWNER_ID_HEADER),
            }),
        };

        ready(result)
    }
}
