//! HTTP routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, get, post};
use axum::{Json, Router};

use poolgate_core::{ClassifiedError, TokenClaims, VerifyError};

use crate::extract::ValidJson;
use crate::operations::{
    ConfirmLoginRequest, ConfirmNewPasswordRequest, ConfirmSignUpRequest, CreateUserRequest,
    LoginRequest, RefreshTokenRequest, SignUpRequest, UpdateUserRequest, UsernameRequest,
    ValidateTokenRequest,
};
use crate::response::{ApiError, ApiResponse};
use crate::server::GatewayState;

type AppState = State<Arc<GatewayState>>;
type ApiResult = Result<ApiResponse, ApiError>;

/// Swagger 2.0 description of the routes below.
const API_DOC: &str = include_str!("openapi.json");
const API_DOC_PATH: &str = "/swagger/swagger.json";

pub(crate) fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/swagger", get(api_doc_redirect))
        .route(API_DOC_PATH, get(api_doc))
        .route("/user/create", or_get_user("create", post(create_user)))
        .route("/user/login", or_get_user("login", post(login)))
        .route("/user/confirm-login", or_get_user("confirm-login", post(confirm_login)))
        .route("/user/logout/{username}", get(logout))
        .route("/user/reset-password", or_get_user("reset-password", post(reset_password)))
        .route("/user/update", or_get_user("update", post(update_user)))
        .route("/user/forgot-password", or_get_user("forgot-password", post(forgot_password)))
        .route(
            "/user/confirm-new-password",
            or_get_user("confirm-new-password", post(confirm_new_password)),
        )
        .route("/user/sign-up", or_get_user("sign-up", post(sign_up)))
        .route("/user/confirm-sign-up", or_get_user("confirm-sign-up", post(confirm_sign_up)))
        .route("/user/token/refresh", post(refresh_token))
        .route("/user/token/validate", post(validate_token))
        .route("/user/{username}", get(get_user))
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

/// A static `/user/<name>` path still answers `GET` as the lookup of user `<name>`.
fn or_get_user(
    username: &'static str,
    route: MethodRouter<Arc<GatewayState>>,
) -> MethodRouter<Arc<GatewayState>> {
    route.get(move |state: AppState| lookup_user(state, username))
}

async fn method_not_allowed() -> ApiError {
    ApiError::Classified(ClassifiedError::new(405, "Method not allowed"))
}

async fn health() -> &'static str {
    "OK"
}

async fn api_doc_redirect() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, API_DOC_PATH)])
}

async fn api_doc() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], API_DOC)
}

async fn create_user(
    State(state): AppState,
    ValidJson(request): ValidJson<CreateUserRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.create_user(request).await?))
}

async fn login(State(state): AppState, ValidJson(request): ValidJson<LoginRequest>) -> ApiResult {
    Ok(ApiResponse::new(state.operations.login(request).await?))
}

async fn confirm_login(
    State(state): AppState,
    ValidJson(request): ValidJson<ConfirmLoginRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.confirm_login(request).await?))
}

async fn logout(State(state): AppState, Path(username): Path<String>) -> ApiResult {
    Ok(ApiResponse::new(state.operations.logout(&username).await?))
}

async fn reset_password(
    State(state): AppState,
    ValidJson(request): ValidJson<UsernameRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.reset_password(request).await?))
}

async fn update_user(
    State(state): AppState,
    ValidJson(request): ValidJson<UpdateUserRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.update_user(request).await?))
}

async fn forgot_password(
    State(state): AppState,
    ValidJson(request): ValidJson<UsernameRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.forgot_password(request).await?))
}

async fn confirm_new_password(
    State(state): AppState,
    ValidJson(request): ValidJson<ConfirmNewPasswordRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(
        state.operations.confirm_new_password(request).await?,
    ))
}

async fn sign_up(State(state): AppState, ValidJson(request): ValidJson<SignUpRequest>) -> ApiResult {
    Ok(ApiResponse::new(state.operations.sign_up(request).await?))
}

async fn confirm_sign_up(
    State(state): AppState,
    ValidJson(request): ValidJson<ConfirmSignUpRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.confirm_sign_up(request).await?))
}

async fn get_user(State(state): AppState, Path(username): Path<String>) -> ApiResult {
    Ok(ApiResponse::new(state.operations.get_user(&username).await?))
}

async fn lookup_user(State(state): AppState, username: &'static str) -> ApiResult {
    Ok(ApiResponse::new(state.operations.get_user(username).await?))
}

async fn refresh_token(
    State(state): AppState,
    ValidJson(request): ValidJson<RefreshTokenRequest>,
) -> ApiResult {
    Ok(ApiResponse::new(state.operations.refresh_token(request).await?))
}

async fn validate_token(
    State(state): AppState,
    ValidJson(request): ValidJson<ValidateTokenRequest>,
) -> Result<Json<TokenClaims>, ApiError> {
    match state.verifier.verify(&request.auth_parameters.token).await {
        Ok(claims) => Ok(Json(claims)),
        Err(VerifyError::Rejected(_)) => Err(ApiError::NotAuthorized),
        Err(VerifyError::KeyFetch(e)) => {
            tracing::error!(error = %e, "Signing keys unavailable");
            Err(ApiError::internal())
        }
    }
}
