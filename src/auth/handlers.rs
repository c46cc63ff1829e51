use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    accounts::{dto::AccountView, model::Account, services},
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest},
        extractors::AuthAccount,
        jwt::JwtKeys,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn issue_tokens(state: &AppState, account: &Account) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    Ok(AuthResponse {
        access_token: keys.sign_access(account.id())?,
        refresh_token: keys.sign_refresh(account.id())?,
        account: AccountView::from(account),
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let account =
        services::authenticate(state.accounts.as_ref(), &payload.email, &payload.password).await?;
    Ok(Json(issue_tokens(&state, &account)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let claims = JwtKeys::from_ref(&state)
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let account = state
        .accounts
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account not found".into()))?;
    services::ensure_not_deactivated(&account)?;

    info!(account_id = %account.id(), "tokens refreshed");
    Ok(Json(issue_tokens(&state, &account)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthAccount(account_id): AuthAccount,
) -> AppResult<Json<AccountView>> {
    let mut account = state
        .accounts
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account not found".into()))?;
    services::ensure_not_deactivated(&account)?;
    services::record_activity(state.accounts.as_ref(), &mut account).await?;
    Ok(Json(AccountView::from(&account)))
}
