use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, SignupRequest, SignupResponse},
        jwt::JwtKeys,
        services,
        validation::{validate_login, validate_signup},
    },
    error::{ApiError, FieldError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

/// Unparseable bodies are reported like any other invalid input.
fn body_or_validation<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected request body");
            Err(ApiError::Validation(vec![FieldError::new(
                "body",
                rejection.body_text(),
            )]))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let input = validate_signup(body_or_validation(payload)?).map_err(|errors| {
        warn!(fields = errors.len(), "signup validation failed");
        ApiError::Validation(errors)
    })?;

    let keys = JwtKeys::from_ref(&state);
    let out = services::signup(
        state.store.as_ref(),
        &keys,
        state.config.signup_issues_token,
        input,
    )
    .await?;

    let body = match out.token {
        Some(token) => SignupResponse {
            message: "User created successfully",
            user: None,
            token: Some(token),
        },
        None => SignupResponse {
            message: "User created successfully",
            user: Some(out.user.into()),
            token: None,
        },
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let input = validate_login(body_or_validation(payload)?).map_err(|errors| {
        warn!(fields = errors.len(), "login validation failed");
        ApiError::Validation(errors)
    })?;

    let keys = JwtKeys::from_ref(&state);
    let token = services::login(state.store.as_ref(), &keys, input).await?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
    }))
}
