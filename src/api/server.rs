use axum::{routing::get, Router};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{auth, docs, modules};
use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::db;

pub struct AppState {
    pub db: SqlitePool,
    pub tokens: TokenService,
}

/// The routing table.
pub fn build_app(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(docs::SCHEMA_PATH, get(docs::schema))
        .route("/", get(docs::swagger_ui))
        .route("/api/redoc/", get(docs::redoc))
        .nest("/api/auth", auth::router());

    for name in modules::MODULES {
        app = app.merge(modules::include(name));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: &AppConfig) -> anyhow::Result<()> {
    let pool = db::connect(&config.database.url, config.database.max_connections).await?;
    tracing::info!(url = %config.database.url, "Database ready");

    let state = Arc::new(AppState {
        db: pool,
        tokens: TokenService::new(&config.jwt),
    });

    let app = build_app(state);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address).await?;

    tracing::info!("Server running on http://{}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::JwtSettings;

    async fn test_app() -> (Router, Arc<AppState>) {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        let state = Arc::new(AppState {
            db: pool,
            tokens: TokenService::new(&JwtSettings::default()),
        });
        (build_app(state.clone()), state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, username: &str, password: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register/",
            None,
            Some(json!({
                "username": username,
                "password": password,
                "email": format!("{username}@library.org"),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn login(app: &Router, username: &str, password: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login/",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_returns_created_user() {
        let (app, _) = test_app().await;
        let body = register(&app, "reader", "s3cret-pass").await;

        assert_eq!(body["username"], "reader");
        assert_eq!(body["email"], "reader@library.org");
        assert!(body["id"].as_i64().is_some());
        assert!(body.get("password").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let (app, _) = test_app().await;
        register(&app, "reader", "pw").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register/",
            None,
            Some(json!({ "username": "reader", "password": "other" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["username"][0],
            "A user with that username already exists."
        );
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let (app, _) = test_app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register/",
            None,
            Some(json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["username"][0], "This field is required.");
        assert_eq!(body["password"][0], "This field is required.");
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let (app, _) = test_app().await;
        let request = Request::post("/api/auth/register/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["detail"].as_str().unwrap().starts_with("JSON parse error"));
    }

    #[tokio::test]
    async fn test_login_returns_token_pair() {
        let (app, state) = test_app().await;
        register(&app, "reader", "pw").await;

        let body = login(&app, "reader", "pw").await;
        let access = body["access"].as_str().unwrap();
        let refresh = body["refresh"].as_str().unwrap();

        let claims = state
            .tokens
            .validate(access, crate::auth::TokenType::Access)
            .unwrap();
        assert!(
            state
                .tokens
                .validate(refresh, crate::auth::TokenType::Refresh)
                .is_ok()
        );

        let user = db::repo::get_user_by_id(&state.db, claims.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (app, _) = test_app().await;
        register(&app, "reader", "pw").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login/",
            None,
            Some(json!({ "username": "reader", "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["detail"],
            "No active account found with the given credentials"
        );
    }

    #[tokio::test]
    async fn test_login_inactive_user() {
        let (app, state) = test_app().await;
        let user = register(&app, "reader", "pw").await;
        db::repo::set_active(&state.db, user["id"].as_i64().unwrap(), false)
            .await
            .unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login/",
            None,
            Some(json!({ "username": "reader", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_requires_authentication() {
        let (app, _) = test_app().await;

        let response = app
            .clone()
            .oneshot(Request::get("/api/auth/profile/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let (status, body) =
            send(&app, Method::GET, "/api/auth/profile/", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "token_not_valid");
    }

    #[tokio::test]
    async fn test_profile_rejects_refresh_token() {
        let (app, _) = test_app().await;
        register(&app, "reader", "pw").await;
        let tokens = login(&app, "reader", "pw").await;

        let refresh = tokens["refresh"].as_str().unwrap();
        let (status, _) = send(&app, Method::GET, "/api/auth/profile/", Some(refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_returns_own_record() {
        let (app, _) = test_app().await;
        register(&app, "alice", "pw").await;
        register(&app, "bob", "pw").await;
        let tokens = login(&app, "bob", "pw").await;
        let access = tokens["access"].as_str().unwrap();

        let (status, body) = send(&app, Method::GET, "/api/auth/profile/", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "bob");
    }

    #[tokio::test]
    async fn test_profile_patch_and_put() {
        let (app, _) = test_app().await;
        register(&app, "reader", "pw").await;
        let tokens = login(&app, "reader", "pw").await;
        let access = tokens["access"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/auth/profile/",
            Some(access),
            Some(json!({ "first_name": "Ada", "id": 999 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["first_name"], "Ada");
        assert_eq!(body["email"], "reader@library.org");
        assert_ne!(body["id"], 999);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/auth/profile/",
            Some(access),
            Some(json!({ "first_name": "Ada" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["username"][0], "This field is required.");

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/auth/profile/",
            Some(access),
            Some(json!({ "username": "reader2", "last_name": "Lovelace" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["username"], "reader2");
        assert_eq!(body["last_name"], "Lovelace");
        assert_eq!(body["first_name"], "");
        assert_eq!(body["email"], "");
    }

    #[tokio::test]
    async fn test_profile_username_conflict_and_password_change() {
        let (app, _) = test_app().await;
        register(&app, "alice", "pw").await;
        register(&app, "bob", "pw").await;
        let tokens = login(&app, "bob", "pw").await;
        let access = tokens["access"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/api/auth/profile/",
            Some(access),
            Some(json!({ "username": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["username"][0],
            "A user with that username already exists."
        );

        let (status, _) = send(
            &app,
            Method::PATCH,
            "/api/auth/profile/",
            Some(access),
            Some(json!({ "username": "bob", "password": "new-pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        login(&app, "bob", "new-pw").await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login/",
            None,
            Some(json!({ "username": "bob", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_refresh() {
        let (app, _) = test_app().await;
        register(&app, "reader", "pw").await;
        let tokens = login(&app, "reader", "pw").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/token/refresh/",
            None,
            Some(json!({ "refresh": tokens["refresh"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let access = body["access"].as_str().unwrap();

        let (status, _) = send(&app, Method::GET, "/api/auth/profile/", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/token/refresh/",
            None,
            Some(json!({ "refresh": tokens["access"] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "token_not_valid");
    }

    #[tokio::test]
    async fn test_module_prefixes_are_reserved() {
        let (app, _) = test_app().await;

        for uri in ["/api/books/", "/api/circulations/42/", "/api/fines/"] {
            let (status, body) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::NOT_IMPLEMENTED, "{uri}");
            assert!(body["detail"].as_str().unwrap().contains("not available"));
        }

        let (status, _) = send(&app, Method::POST, "/api/books/", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_docs_endpoints() {
        let (app, _) = test_app().await;

        let (status, body) = send(&app, Method::GET, "/api/schema/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/auth/login/"].is_object());

        for uri in ["/", "/api/redoc/"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let html = String::from_utf8(bytes.to_vec()).unwrap();
            assert!(html.contains("/api/schema/"));
        }
    }

    #[tokio::test]
    async fn test_concurrent_registration_same_username() {
        let (app, state) = test_app().await;
        let body = json!({ "username": "race", "password": "pw" });

        let (first, second) = tokio::join!(
            send(&app, Method::POST, "/api/auth/register/", None, Some(body.clone())),
            send(&app, Method::POST, "/api/auth/register/", None, Some(body.clone())),
        );

        let mut statuses = [first.0, second.0];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

        let rejected = if first.0 == StatusCode::BAD_REQUEST { first.1 } else { second.1 };
        assert_eq!(
            rejected["username"][0],
            "A user with that username already exists."
        );
        assert!(db::repo::get_user(&state.db, "race").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deactivated_user_token_rejected() {
        let (app, state) = test_app().await;
        let user = register(&app, "reader", "pw").await;
        let tokens = login(&app, "reader", "pw").await;
        db::repo::set_active(&state.db, user["id"].as_i64().unwrap(), false)
            .await
            .unwrap();

        let access = tokens["access"].as_str().unwrap();
        let (status, body) = send(&app, Method::GET, "/api/auth/profile/", Some(access), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "user_inactive");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/token/refresh/",
            None,
            Some(json!({ "refresh": tokens["refresh"] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "token_not_valid");
    }

    #[tokio::test]
    async fn test_deleted_user_token_rejected() {
        let (app, state) = test_app().await;
        let user = register(&app, "reader", "pw").await;
        let tokens = login(&app, "reader", "pw").await;
        db::repo::delete_user(&state.db, user["id"].as_i64().unwrap())
            .await
            .unwrap();

        let access = tokens["access"].as_str().unwrap();
        let (status, body) = send(&app, Method::GET, "/api/auth/profile/", Some(access), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "user_not_found");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/token/refresh/",
            None,
            Some(json!({ "refresh": tokens["refresh"] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_unknown_username() {
        let (app, _) = test_app().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login/",
            None,
            Some(json!({ "username": "ghost", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["detail"],
            "No active account found with the given credentials"
        );
    }
}
