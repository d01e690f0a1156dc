//! Account endpoints mounted under `/api/auth/`.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::extract::{AuthUser, Json};
use crate::api::serializers::{
    AccessToken, LoginRequest, RefreshRequest, UserPayload, UserResponse, WriteMode,
};
use crate::api::server::AppState;
use crate::auth::{hash_password, verify_password, verify_unknown_user, TokenPair, TokenType};
use crate::db::{
    models::{NewUser, User},
    repo,
};
use crate::error::{AppError, ErrorDetail};

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/token/refresh/", post(refresh))
        .route(
            "/profile/",
            get(profile).put(replace_profile).patch(update_profile),
        )
}

/// Create an account. Open to anonymous callers.
#[utoipa::path(
    post,
    path = "/api/auth/register/",
    tag = "Authentication",
    request_body = UserPayload,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid or duplicate fields"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserPayload>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.validate(WriteMode::Create)?;

    let username = payload.username.clone().unwrap_or_default();
    if repo::username_taken(&state.db, &username, None).await? {
        return Err(AppError::field("username", USERNAME_TAKEN));
    }

    let password = payload.password.as_deref().unwrap_or_default();
    let new_user = NewUser {
        username,
        email: payload.email.unwrap_or_default(),
        first_name: payload.first_name.unwrap_or_default(),
        last_name: payload.last_name.unwrap_or_default(),
        password_hash: hash_password(password)?,
    };

    let user = repo::insert_user(&state.db, &new_user)
        .await
        .map_err(username_conflict)?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Exchange credentials for an access/refresh token pair.
#[utoipa::path(
    post,
    path = "/api/auth/login/",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Wrong credentials or inactive account", body = ErrorDetail),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let (username, password) = request.credentials()?;

    let user = match repo::get_user(&state.db, username).await? {
        Some(user) if user.is_active && verify_password(password, &user.password_hash) => user,
        found => {
            if found.is_none() {
                verify_unknown_user(password);
            }

            tracing::warn!(username = %username, "Failed login attempt");
            return Err(AppError::authentication_failed(NO_ACTIVE_ACCOUNT));
        }
    };

    let pair = state.tokens.issue_pair(user.id)?;
    repo::touch_last_login(&state.db, user.id).await?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(pair))
}

/// Exchange a refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/api/auth/token/refresh/",
    tag = "Authentication",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessToken),
        (status = 401, description = "Refresh token invalid or expired", body = ErrorDetail),
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AccessToken>, AppError> {
    let claims = state.tokens.validate(request.token()?, TokenType::Refresh)?;

    let active = repo::get_user_by_id(&state.db, claims.user_id)
        .await?
        .is_some_and(|user| user.is_active);
    if !active {
        return Err(AppError::token_not_valid("Token is invalid or expired"));
    }

    Ok(Json(AccessToken {
        access: state.tokens.issue_access(claims.user_id)?,
    }))
}

/// The requesting user's own account.
#[utoipa::path(
    get,
    path = "/api/auth/profile/",
    tag = "Authentication",
    security(("jwtAuth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorDetail),
    )
)]
pub async fn profile(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

/// Replace the requesting user's profile fields.
#[utoipa::path(
    put,
    path = "/api/auth/profile/",
    tag = "Authentication",
    security(("jwtAuth" = [])),
    request_body = UserPayload,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid or duplicate fields"),
        (status = 401, description = "Not authenticated", body = ErrorDetail),
    )
)]
pub async fn replace_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UserPayload>,
) -> Result<Json<UserResponse>, AppError> {
    save_profile(&state, user, payload, WriteMode::Replace).await
}

/// Update only the given profile fields of the requesting user.
#[utoipa::path(
    patch,
    path = "/api/auth/profile/",
    tag = "Authentication",
    security(("jwtAuth" = [])),
    request_body = UserPayload,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid or duplicate fields"),
        (status = 401, description = "Not authenticated", body = ErrorDetail),
    )
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UserPayload>,
) -> Result<Json<UserResponse>, AppError> {
    save_profile(&state, user, payload, WriteMode::Partial).await
}

async fn save_profile(
    state: &AppState,
    mut user: User,
    payload: UserPayload,
    mode: WriteMode,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate(mode)?;

    if let Some(username) = payload.username.as_deref()
        && username != user.username
        && repo::username_taken(&state.db, username, Some(user.id)).await?
    {
        return Err(AppError::field("username", USERNAME_TAKEN));
    }

    payload.apply_to(&mut user, mode);
    if let Some(password) = payload.password.as_deref() {
        user.password_hash = hash_password(password)?;
    }

    let user = repo::update_user(&state.db, &user)
        .await
        .map_err(username_conflict)?;
    tracing::info!(user_id = user.id, "Profile updated");

    Ok(Json(UserResponse::from(&user)))
}

/// A `UNIQUE` violation on write means another request claimed the username
/// after the existence check.
fn username_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::field("username", USERNAME_TAKEN)
        }
        _ => AppError::Database(err),
    }
}
