//! Helpers for driving the router in tests.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{accounts::model::ROLE_ADMIN, app::build_app, state::AppState};

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::fake();
        let router = build_app(state.clone());
        Self { state, router }
    }

    /// Registers an account and logs it in. Returns `(id, access_token)`.
    pub async fn login_new(&self, name: &str, email: &str) -> (String, String) {
        let registered = register(self, name, email).await;
        let (status, body) = send(
            self,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter2222" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            registered["id"].as_str().unwrap().to_string(),
            body["access_token"].as_str().unwrap().to_string(),
        )
    }

    /// Like [`TestApp::login_new`] but the account holds `ROLE_ADMIN`.
    pub async fn login_admin(&self) -> (String, String) {
        let (id, token) = self.login_new("Root Admin", "admin@example.com").await;
        self.state
            .accounts
            .modify(id.parse().unwrap(), &|account| {
                account.set_roles(vec![ROLE_ADMIN.to_string()]);
                Ok(())
            })
            .await
            .unwrap();
        (id, token)
    }
}

/// Registers with password `hunter2222` and returns the created view.
pub async fn register(app: &TestApp, name: &str, email: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/accounts",
        None,
        Some(json!({ "name": name, "email": email, "password": "hunter2222" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body
}

pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
