use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AccountPatch, AccountView, AccountWrite, ConfirmRequest, RolesRequest, StatusResponse},
    model::{Account, ROLE_ADMIN},
    services,
};
use crate::{
    auth::extractors::AuthAccount,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/confirm", post(confirm_account))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts/:id",
            get(get_account).patch(patch_account).delete(delete_account),
        )
        .route("/accounts/:id/activate", post(activate_account))
        .route("/accounts/:id/deactivate", post(deactivate_account))
        .route("/accounts/:id/confirmation-token", post(regenerate_token))
        .route("/accounts/:id/roles", put(put_roles))
}

/// Loads the caller; fails unless it is `target` itself or an admin.
async fn authorize(state: &AppState, caller: Uuid, target: Uuid, admin_only: bool) -> AppResult<Account> {
    let account = state
        .accounts
        .find_by_id(caller)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account not found".into()))?;
    services::ensure_not_deactivated(&account)?;
    let allowed = account.has_role(ROLE_ADMIN) || (!admin_only && caller == target);
    if !allowed {
        warn!(caller = %caller, target = %target, "access denied");
        return Err(AppError::Forbidden("Access denied".into()));
    }
    Ok(account)
}

#[instrument(skip(state, payload))]
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<AccountWrite>,
) -> AppResult<(StatusCode, HeaderMap, Json<AccountView>)> {
    let account = services::register(state.accounts.as_ref(), payload).await?;

    let mut headers = HeaderMap::new();
    let location = format!("/api/v1/accounts/{}", account.id());
    if let Ok(value) = location.parse() {
        headers.insert(header::LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(AccountView::from(&account))))
}

#[instrument(skip(state, payload))]
pub async fn confirm_account(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmRequest>,
) -> AppResult<Json<AccountView>> {
    let account = services::confirm(state.accounts.as_ref(), payload.token).await?;
    Ok(Json(AccountView::from(&account)))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AccountView>> {
    authorize(&state, caller, id, false).await?;
    let account = services::load(state.accounts.as_ref(), id).await?;
    Ok(Json(AccountView::from(&account)))
}

#[instrument(skip(state, patch))]
pub async fn patch_account(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
    Json(patch): Json<AccountPatch>,
) -> AppResult<Json<AccountView>> {
    authorize(&state, caller, id, false).await?;
    let account = services::update_profile(state.accounts.as_ref(), id, patch).await?;
    Ok(Json(AccountView::from(&account)))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authorize(&state, caller, id, false).await?;
    services::delete(state.accounts.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn activate_account(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusResponse>> {
    authorize(&state, caller, id, true).await?;
    let account = services::activate(state.accounts.as_ref(), id).await?;
    Ok(Json(StatusResponse { id, status: account.status() }))
}

#[instrument(skip(state))]
pub async fn deactivate_account(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StatusResponse>> {
    authorize(&state, caller, id, false).await?;
    let account = services::deactivate(state.accounts.as_ref(), id).await?;
    Ok(Json(StatusResponse { id, status: account.status() }))
}

#[instrument(skip(state))]
pub async fn regenerate_token(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AccountView>> {
    authorize(&state, caller, id, false).await?;
    let account = services::regenerate_confirmation_token(state.accounts.as_ref(), id).await?;
    Ok(Json(AccountView::from(&account)))
}

#[instrument(skip(state, payload))]
pub async fn put_roles(
    State(state): State<AppState>,
    AuthAccount(caller): AuthAccount,
    Path(id): Path<Uuid>,
    Json(payload): Json<RolesRequest>,
) -> AppResult<Json<AccountView>> {
    authorize(&state, caller, id, true).await?;
    let account = services::set_roles(state.accounts.as_ref(), id, payload.roles).await?;
    Ok(Json(AccountView::from(&account)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{register, send, TestApp};

    #[tokio::test]
    async fn register_returns_read_profile() {
        let app = TestApp::new();
        let body = register(&app, "Ann", "a@example.com").await;
        assert_eq!(body["name"], "Ann");
        assert_eq!(body["email"], "a@example.com");
        assert_eq!(body["roles"], json!(["ROLE_USER"]));
        assert_eq!(body["has_password"], true);
        assert!(body["confirmation_token"].is_string());
        assert!(body["activated_at"].is_null());
        assert!(body["deactivated_at"].is_null());
        assert!(body.get("password").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_ignores_roles_in_body() {
        let app = TestApp::new();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/accounts",
            None,
            Some(json!({
                "name": "Mallory",
                "email": "m@example.com",
                "password": "hunter2222",
                "roles": ["ROLE_ADMIN"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["roles"], json!(["ROLE_USER"]));
    }

    #[tokio::test]
    async fn register_rejects_invalid_and_duplicate() {
        let app = TestApp::new();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/accounts",
            None,
            Some(json!({ "name": "  ", "email": "bad", "password": "hunter2222" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"].as_array().unwrap().len(), 2);

        register(&app, "Ann", "a@example.com").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/accounts",
            None,
            Some(json!({ "name": "Ann Two", "email": "A@EXAMPLE.COM", "password": "hunter2222" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn confirm_activates_once() {
        let app = TestApp::new();
        let body = register(&app, "Ann", "a@example.com").await;
        let token = body["confirmation_token"].clone();

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/accounts/confirm",
            None,
            Some(json!({ "token": token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["activated_at"].is_string());
        assert!(body["confirmation_token"].is_null());

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/accounts/confirm",
            None,
            Some(json!({ "token": token })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn confirm_cannot_reactivate_a_deactivated_account() {
        let app = TestApp::new();
        let ann = register(&app, "Ann", "a@example.com").await;
        let ann_id = ann["id"].as_str().unwrap().to_string();
        let (_, admin_token) = app.login_admin().await;

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/accounts/{}/deactivate", ann_id),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/accounts/confirm",
            None,
            Some(json!({ "token": ann["confirmation_token"] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Account is deactivated");

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "a@example.com", "password": "hunter2222" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/accounts/{}", ann_id),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["activated_at"].is_null());
        assert!(body["deactivated_at"].is_string());
    }

    #[tokio::test]
    async fn owner_can_read_and_patch_but_not_others() {
        let app = TestApp::new();
        let (ann_id, ann_token) = app.login_new("Ann", "a@example.com").await;
        let (bob_id, _) = app.login_new("Bob", "b@example.com").await;

        let (status, body) =
            send(&app, "GET", &format!("/api/v1/accounts/{}", ann_id), Some(&ann_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], ann_id.as_str());

        let (status, _) =
            send(&app, "GET", &format!("/api/v1/accounts/{}", bob_id), Some(&ann_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/v1/accounts/{}", ann_id),
            Some(&ann_token),
            Some(json!({ "phone_number": "+1 555 0100" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone_number"], "+1 555 0100");
        assert_eq!(body["name"], "Ann");
    }

    #[tokio::test]
    async fn roles_and_activation_are_admin_only() {
        let app = TestApp::new();
        let (ann_id, ann_token) = app.login_new("Ann", "a@example.com").await;
        let (_, admin_token) = app.login_admin().await;

        let roles_uri = format!("/api/v1/accounts/{}/roles", ann_id);
        let (status, _) = send(
            &app,
            "PUT",
            &roles_uri,
            Some(&ann_token),
            Some(json!({ "roles": ["ROLE_ADMIN"] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "PUT",
            &roles_uri,
            Some(&admin_token),
            Some(json!({ "roles": ["ROLE_EDITOR", "ROLE_USER"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["roles"], json!(["ROLE_EDITOR", "ROLE_USER"]));

        let activate_uri = format!("/api/v1/accounts/{}/activate", ann_id);
        let (status, _) = send(&app, "POST", &activate_uri, Some(&ann_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send(&app, "POST", &activate_uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn deactivate_then_admin_reactivates() {
        let app = TestApp::new();
        let (ann_id, ann_token) = app.login_new("Ann", "a@example.com").await;
        let (_, admin_token) = app.login_admin().await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/accounts/{}/deactivate", ann_id),
            Some(&ann_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "inactive");

        // the old access token still verifies but the account is refused
        let (status, _) =
            send(&app, "GET", &format!("/api/v1/accounts/{}", ann_id), Some(&ann_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/accounts/{}/activate", ann_id),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn regenerate_token_gives_new_value() {
        let app = TestApp::new();
        let (ann_id, ann_token) = app.login_new("Ann", "a@example.com").await;
        let (_, before) =
            send(&app, "GET", &format!("/api/v1/accounts/{}", ann_id), Some(&ann_token), None).await;
        let (status, after) = send(
            &app,
            "POST",
            &format!("/api/v1/accounts/{}/confirmation-token", ann_id),
            Some(&ann_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(after["confirmation_token"].is_string());
        assert_ne!(before["confirmation_token"], after["confirmation_token"]);
    }

    #[tokio::test]
    async fn delete_own_account() {
        let app = TestApp::new();
        let (ann_id, ann_token) = app.login_new("Ann", "a@example.com").await;
        let uri = format!("/api/v1/accounts/{}", ann_id);
        let (status, _) = send(&app, "DELETE", &uri, Some(&ann_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, Some(&ann_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
