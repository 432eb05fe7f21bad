use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AccessTokenResponse, AuthResponse, CodeRequest, ConfirmResetRequest, LoginRequest,
            MessageResponse, PublicUser, RefreshRequest, RegisterRequest, ResetTokenResponse,
        },
        extractors::{bearer_token, AuthUser},
        repo_types::{FlowKind, User},
        services,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/token", post(refresh))
        .route("/auth/logout", post(logout))
        .route(
            "/auth/reset-password",
            post(request_password_reset).put(confirm_password_reset),
        )
        .route("/auth/reset-password/:code", get(get_reset_token))
        .route("/auth/verify", post(request_verification))
        .route("/auth/verify/:code", get(confirm_verification))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let identifier = payload.identifier.trim();
    let response =
        services::login(&state, identifier, &payload.password, &addr.ip().to_string()).await?;
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let refresh_token = payload
        .refresh_token
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized user request".into()))?;
    let access_token = services::refresh(&state, &refresh_token).await?;
    Ok(Json(AccessTokenResponse { access_token }))
}

#[instrument(skip(state, payload))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(caller_id): AuthUser,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, ApiError> {
    let refresh_token = payload
        .refresh_token
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized user request".into()))?;
    services::logout(&state, caller_id, &refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
async fn request_password_reset(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::request_code(
        &state,
        payload.reference.trim(),
        &addr.ip().to_string(),
        FlowKind::PasswordReset,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password reset request initiated successfully! Please check your inbox for the verification code.".into(),
    }))
}

#[instrument(skip(state))]
async fn get_reset_token(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ResetTokenResponse>, ApiError> {
    let token = services::get_reset_token(&state, &code).await?;
    Ok(Json(ResetTokenResponse { token }))
}

#[instrument(skip(state, headers, payload))]
async fn confirm_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ConfirmResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized user request".into()))?;
    if payload.new_password != payload.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match".into()));
    }
    if payload.new_password.len() < 8 {
        return Err(ApiError::BadRequest("Password too short".into()));
    }
    services::confirm_password_reset(&state, token, &payload.new_password).await?;
    Ok(Json(MessageResponse {
        message: "Password reset successful".into(),
    }))
}

#[instrument(skip(state, payload))]
async fn request_verification(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::request_code(
        &state,
        payload.reference.trim(),
        &addr.ip().to_string(),
        FlowKind::AccountVerification,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "User verification request initiated successfully! Please check your inbox for the verification code.".into(),
    }))
}

#[instrument(skip(state))]
async fn confirm_verification(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::confirm_verification(&state, &code).await?;
    Ok(Json(MessageResponse {
        message: "Account verification successful".into(),
    }))
}

#[instrument(skip(state))]
async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}
