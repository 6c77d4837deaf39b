use std::net::SocketAddr;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{admin, auth, categories, images, notifications, posts, profile, wardrobe};

const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(profile::router())
                .merge(categories::router())
                .merge(wardrobe::router())
                .merge(posts::router())
                .merge(images::router())
                .merge(notifications::router())
                .merge(admin::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn request_span<B>(req: &axum::http::Request<B>) -> tracing::Span {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::info_span!(
        "http_request",
        %method,
        uri = %uri,
        status = tracing::field::Empty
    )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn signup_body(email: &str) -> Value {
        json!({
            "first_name": "Ana",
            "last_name": "Reyes",
            "email": email,
            "password": "secret1",
            "confirm_password": "secret1",
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn request_span_has_room_for_the_status() {
        let req = Request::get("/api/v1/health").body(Body::empty()).unwrap();
        let span = request_span(&req);
        assert!(span.has_field("status"));
        assert!(span.has_field("method"));
    }

    #[tokio::test]
    async fn signup_then_manage_categories() {
        let app = build_app(AppState::fake());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(signup_body("ana@example.com")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["landing"], "profileSetup");
        assert_eq!(body["user"]["display_name"], "Ana Reyes");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/me/categories",
            Some(&token),
            Some(json!({ "name": "Gym" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["custom"], json!(["Gym"]));

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/me/categories",
            Some(&token),
            Some(json!({ "name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["title"], "Oops");
        assert_eq!(body["message"], "Please enter a category name.");
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected_before_sign_up() {
        let app = build_app(AppState::fake());
        let mut body = signup_body("ana@example.com");
        body["confirm_password"] = json!("other1");
        let (status, body) = call(&app, Method::POST, "/api/v1/auth/signup", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Passwords do not match.");
    }

    #[tokio::test]
    async fn seller_portal_turns_away_shoppers() {
        let app = build_app(AppState::fake());
        call(
            &app,
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(signup_body("shopper@example.com")),
        )
        .await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "shopper@example.com",
                "password": "secret1",
                "portal": "seller",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["title"], "Access Denied");
        assert_eq!(body["message"], "This is not a seller account.");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = build_app(AppState::fake());
        let (status, _) = call(&app, Method::GET, "/api/v1/me/categories", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/v1/me/wardrobe",
            Some("not-a-token"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let app = build_app(AppState::fake());
        let (_, body) = call(
            &app,
            Method::POST,
            "/api/v1/auth/signup",
            None,
            Some(signup_body("ana@example.com")),
        )
        .await;
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, Method::GET, "/api/v1/me/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
