//! API router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//! The dispatch trigger and push-token registration additionally pass
//! `require_trigger_secret`.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let cors = cors_layer(&ctx.core.config().origin_url);

    if ctx.trigger_secret_hash.is_none() {
        tracing::warn!("No trigger secret configured; dispatch and token registration are open");
    }

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/reminders/dispatch", post(endpoints::reminders::dispatch))
        .route("/users/:id/push-tokens", post(endpoints::push_tokens::register))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(
            middleware::trigger_auth::require_trigger_secret,
        ))
        .layer(axum::Extension(ctx.clone()));

    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/reminders/last", get(endpoints::reminders::last))
        .route("/flows/symptom-check", post(endpoints::flows::symptom_check))
        .route("/flows/wellness-tip", post(endpoints::flows::wellness_tip))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .nest("/api", open)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
}

/// Allow the configured web client origin only.
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "Origin URL is not a valid header value; CORS disabled");
            layer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::core_state::testing::{test_core, TestCore};
    use crate::db;
    use crate::db::repository::fixtures::{at, medication, seed_user};
    use crate::flows::client::mock::MockCompletion;
    use crate::flows::FlowError;

    const TIP: &str = r#"{"title": "Hydrate", "tip": "Keep a glass of water next to your pill box."}"#;

    fn core_with(config: AppConfig, completion: MockCompletion) -> TestCore {
        let t = test_core(config, completion, at(2026, 3, 2, 8, 0));
        t.core
            .db()
            .with_conn(|conn| {
                seed_user(conn, "u-1", &["tok-a"]);
                db::insert_medication(conn, &medication("med-1", "u-1", &["08:00"], &["Lundi"]))
            })
            .unwrap();
        t
    }

    fn core() -> TestCore {
        core_with(AppConfig::default(), MockCompletion::new(TIP))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_open() {
        let t = core();
        let response = api_router(t.core.clone())
            .oneshot(request("GET", "/api/health", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["scan_running"], false);
    }

    #[tokio::test]
    async fn dispatch_returns_summary_and_is_idempotent() {
        let t = core();
        let app = api_router(t.core.clone());

        let response = app
            .clone()
            .oneshot(request("POST", "/api/reminders/dispatch", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["medicationsSent"], 1);
        assert_eq!(json["welcomeSent"], 1);

        let response = app
            .oneshot(request("POST", "/api/reminders/dispatch", None, None))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["medicationsSent"], 0);
        assert_eq!(t.push.sent_count(), 2);
    }

    #[tokio::test]
    async fn dispatch_requires_configured_secret() {
        let config = AppConfig {
            trigger_secret: Some("cron-secret".into()),
            ..AppConfig::default()
        };
        let t = core_with(config, MockCompletion::new(TIP));
        let app = api_router(t.core.clone());

        let missing = app
            .clone()
            .oneshot(request("POST", "/api/reminders/dispatch", None, None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(request("POST", "/api/reminders/dispatch", Some("guess"), None))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(t.push.sent_count(), 0);

        let right = app
            .oneshot(request("POST", "/api/reminders/dispatch", Some("cron-secret"), None))
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn last_reports_previous_scan() {
        let t = core();
        let app = api_router(t.core.clone());

        let before = json_body(
            app.clone()
                .oneshot(request("GET", "/api/reminders/last", None, None))
                .await
                .unwrap(),
        )
        .await;
        assert!(before["summary"].is_null());

        app.clone()
            .oneshot(request("POST", "/api/reminders/dispatch", None, None))
            .await
            .unwrap();

        let after = json_body(
            app.oneshot(request("GET", "/api/reminders/last", None, None))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(after["running"], false);
        assert_eq!(after["summary"]["medicationsSent"], 1);
    }

    #[tokio::test]
    async fn push_token_registration_is_idempotent() {
        let t = core();
        let app = api_router(t.core.clone());
        let body = r#"{"token": "tok-new"}"#;

        let first = app
            .clone()
            .oneshot(request("POST", "/api/users/u-1/push-tokens", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .clone()
            .oneshot(request("POST", "/api/users/u-1/push-tokens", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(json_body(second).await["registered"], false);

        let unknown = app
            .clone()
            .oneshot(request("POST", "/api/users/ghost/push-tokens", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let blank = app
            .oneshot(request("POST", "/api/users/u-1/push-tokens", None, Some(r#"{"token": " "}"#)))
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn push_token_registration_requires_configured_secret() {
        let config = AppConfig {
            trigger_secret: Some("cron-secret".into()),
            ..AppConfig::default()
        };
        let t = core_with(config, MockCompletion::new(TIP));
        let app = api_router(t.core.clone());
        let body = r#"{"token": "attacker-device"}"#;

        let missing = app
            .clone()
            .oneshot(request("POST", "/api/users/u-1/push-tokens", None, Some(body)))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(request("POST", "/api/users/u-1/push-tokens", Some("guess"), Some(body)))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let tokens = t
            .core
            .db()
            .with_conn(|conn| db::get_user(conn, "u-1"))
            .unwrap()
            .unwrap()
            .push_tokens;
        assert_eq!(tokens, vec!["tok-a".to_string()]);

        let right = app
            .oneshot(request("POST", "/api/users/u-1/push-tokens", Some("cron-secret"), Some(body)))
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn wellness_tip_completes_and_caches() {
        let t = core();
        let app = api_router(t.core.clone());
        let body = r#"{"topic": "hydration"}"#;

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request("POST", "/api/flows/wellness-tip", None, Some(body)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = json_body(response).await;
            assert_eq!(json["status"], "completed");
            assert_eq!(json["result"]["title"], "Hydrate");
        }
        assert_eq!(t.completion.calls(), 1);
    }

    #[tokio::test]
    async fn symptom_check_falls_back_when_backend_is_down() {
        let t = core_with(
            AppConfig::default(),
            MockCompletion::failing(FlowError::Connection("http://localhost:11434".into())),
        );
        let response = api_router(t.core.clone())
            .oneshot(request(
                "POST",
                "/api/flows/symptom-check",
                None,
                Some(r#"{"symptoms": ["headache"]}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "fallback");
        assert!(json["message"].as_str().unwrap().contains("doctor"));
    }

    #[tokio::test]
    async fn symptom_check_rejects_empty_input() {
        let t = core();
        let response = api_router(t.core.clone())
            .oneshot(request(
                "POST",
                "/api/flows/symptom-check",
                None,
                Some(r#"{"symptoms": []}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let t = core();
        let response = api_router(t.core.clone())
            .oneshot(request("GET", "/api/nope", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
