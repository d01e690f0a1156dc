//! Request extractors: JSON bodies with API-shaped rejections, and the
//! authenticated user.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

use crate::api::server::AppState;
use crate::auth::TokenType;
use crate::db::{models::User, repo};
use crate::error::AppError;

/// `axum::Json` whose rejections use the `{"detail": ...}` error body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

impl<T: serde::Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

fn reject(rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            let mut response = AppError::BadRequest(
                "Unsupported media type in request. Expected 'application/json'.".to_string(),
            )
            .into_response();
            *response.status_mut() = axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
            response
        }
        JsonRejection::JsonDataError(err) => {
            AppError::BadRequest(format!("JSON parse error - {}", err.body_text())).into_response()
        }
        JsonRejection::JsonSyntaxError(err) => {
            AppError::BadRequest(format!("JSON parse error - {}", err.body_text())).into_response()
        }
        other => AppError::BadRequest(other.body_text()).into_response(),
    }
}

/// The user behind a valid `Authorization: Bearer <access token>` header.
/// Handlers taking this extractor are closed to anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.tokens.validate(token, TokenType::Access)?;

        let user = repo::get_user_by_id(&state.db, claims.user_id)
            .await?
            .ok_or(AppError::AuthenticationFailed {
                detail: "User not found".to_string(),
                code: Some("user_not_found"),
            })?;

        if !user.is_active {
            return Err(AppError::AuthenticationFailed {
                detail: "User is inactive".to_string(),
                code: Some("user_inactive"),
            });
        }

        Ok(AuthUser(user))
    }
}

/// Bearer credentials from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(AppError::NotAuthenticated);
    };

    let value = value.to_str().map_err(|_| {
        AppError::authentication_failed("Invalid Authorization header encoding.")
    })?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        (Some("Bearer"), None, _) => Err(AppError::authentication_failed(
            "Invalid Authorization header. No credentials provided.",
        )),
        (Some("Bearer"), Some(_), Some(_)) => Err(AppError::authentication_failed(
            "Invalid Authorization header. Credentials string should not contain spaces.",
        )),
        _ => Err(AppError::NotAuthenticated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        let headers = headers("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AppError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_other_scheme_is_anonymous() {
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AppError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_malformed_bearer() {
        assert!(matches!(
            bearer_token(&headers("Bearer")),
            Err(AppError::AuthenticationFailed { .. })
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer a b")),
            Err(AppError::AuthenticationFailed { .. })
        ));
    }
}
