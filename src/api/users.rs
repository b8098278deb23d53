/// User credential endpoints
use crate::{
    account::{
        AckResponse, AuthenticateRequest, AuthenticateResponse, ConfirmPasswordResetRequest,
        RegisterRequest, RequestPasswordResetRequest, UserResponse,
    },
    auth::AuthUser,
    context::AppContext,
    error::{ServiceError, ServiceResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use validator::Validate;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/api/register", post(register))
        .route("/users/verify-now/:code", get(verify_now))
        .route("/users/api/authenticate", post(authenticate).get(current_user))
        .route("/users/api/reset-password", put(request_password_reset))
        .route("/users/reset-password-now/:token", get(validate_reset_token))
        .route("/users/api/reset-password-now", post(confirm_password_reset))
}

/// Create a new user account
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> ServiceResult<(StatusCode, Json<AckResponse>)> {
    req.validate()
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

    ctx.accounts.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(AckResponse::ok(
            "Your account is created; please verify your email address.",
        )),
    ))
}

/// Verify an account from the emailed link
async fn verify_now(
    State(ctx): State<AppContext>,
    Path(code): Path<String>,
) -> ServiceResult<Json<AckResponse>> {
    ctx.accounts.verify_account(&code).await?;

    Ok(Json(AckResponse::ok("Your account is now verified.")))
}

/// Authenticate with username and password
async fn authenticate(
    State(ctx): State<AppContext>,
    Json(req): Json<AuthenticateRequest>,
) -> ServiceResult<Json<AuthenticateResponse>> {
    let (account, token) = ctx
        .accounts
        .authenticate(&req.username, &req.password)
        .await?;

    Ok(Json(AuthenticateResponse {
        success: true,
        user: account.public_info(),
        token,
    }))
}

/// Get the authenticated user's public info
async fn current_user(auth: AuthUser) -> ServiceResult<Json<UserResponse>> {
    Ok(Json(UserResponse {
        success: true,
        user: auth.account.public_info(),
    }))
}

/// Start a password reset for the given email address
async fn request_password_reset(
    State(ctx): State<AppContext>,
    Json(req): Json<RequestPasswordResetRequest>,
) -> ServiceResult<Json<AckResponse>> {
    ctx.accounts.request_password_reset(&req.email).await?;

    Ok(Json(AckResponse::ok(
        "Password reset instructions were sent to your email address.",
    )))
}

/// Check a reset link before the client renders the reset form
async fn validate_reset_token(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ServiceResult<Json<AckResponse>> {
    ctx.accounts.validate_reset_token(&token).await?;

    Ok(Json(AckResponse::ok("Reset token is valid.")))
}

/// Complete a password reset
async fn confirm_password_reset(
    State(ctx): State<AppContext>,
    Json(req): Json<ConfirmPasswordResetRequest>,
) -> ServiceResult<Json<AckResponse>> {
    req.validate()
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

    ctx.accounts
        .confirm_password_reset(&req.token, &req.new_password)
        .await?;

    Ok(Json(AckResponse::ok(
        "Your password has been reset. You can now log in with the new password.",
    )))
}
