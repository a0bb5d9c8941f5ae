pub mod health;

use std::any::Any;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::errors::AppError;
use crate::finder::handlers;
use crate::request_id::{
    make_span_with_request_id, propagate_request_id_layer, set_request_id_layer,
};
use crate::state::AppState;

/// Maps a panic inside a handler to the standard 500 body.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

/// Builds the full application. `Router::layer` wraps every route separately, so the
/// in-flight limit uses one shared semaphore rather than a per-route one.
pub fn build_router(state: AppState) -> Router {
    let max_in_flight = state.config.max_concurrent_requests;

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/pajama-finder", post(handlers::handle_pajama_finder))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(set_request_id_layer())
        .layer(CorsLayer::permissive()) // storefront pages call this cross-origin
        .layer(GlobalConcurrencyLimitLayer::new(max_in_flight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::finder::recommender::FALLBACK_REASON;
    use crate::llm_client::{CompletionService, LlmError, PromptPair};
    use crate::request_id::REQUEST_ID_HEADER;

    enum Behavior {
        Reply(&'static str),
        Fail,
        Panic,
        Hang,
    }

    struct CountingCompletion {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for CountingCompletion {
        async fn complete(&self, _prompt: &PromptPair) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Reply(content) => Ok(content.to_string()),
                Behavior::Fail => Err(LlmError::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
                Behavior::Panic => panic!("completion backend exploded"),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn test_config() -> Config {
        Config {
            openai_api_key: Some("sk-test".to_string()),
            openai_base_url: "http://localhost:0".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            port: 3000,
            upstream_timeout: Duration::from_secs(5),
            max_concurrent_requests: 8,
            rust_log: "info".to_string(),
        }
    }

    fn app_with(behavior: Behavior) -> (Router, Arc<CountingCompletion>) {
        app_with_config(behavior, test_config())
    }

    fn app_with_config(behavior: Behavior, config: Config) -> (Router, Arc<CountingCompletion>) {
        let llm = Arc::new(CountingCompletion {
            behavior,
            calls: AtomicUsize::new(0),
        });
        let state = AppState {
            config,
            llm: Some(llm.clone() as Arc<dyn CompletionService>),
        };
        (build_router(state), llm)
    }

    fn app_without_key() -> Router {
        build_router(AppState {
            config: Config {
                openai_api_key: None,
                ..test_config()
            },
            llm: None,
        })
    }

    fn finder_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/pajama-finder")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn christmas_body() -> String {
        json!({
            "question": "Family of 4, cold winters, loves Christmas, budget under 150",
            "kits": [
                {
                    "handle": "winter-wonderland-family-set",
                    "title": "Winter Wonderland Family Set",
                    "description": "Cozy flannel Christmas pajamas for the whole family.",
                    "product_titles": "Women’s Red Top | Men’s Navy Top | Kids Pajama Set",
                    "url": "https://hatley.com"
                },
                {
                    "handle": "summer-beach-family-set",
                    "title": "Summer Beach Family Set",
                    "description": "Lightweight cotton pajamas with beach and ocean motifs.",
                    "product_titles": "Women’s Tank | Men’s Tee | Kids Shorts Set",
                    "url": "https://hatley.com"
                }
            ]
        })
        .to_string()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_root_liveness() {
        let (app, _) = app_with(Behavior::Fail);
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Pajama Finder server is running");
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(Behavior::Fail);
        let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "pajama-finder");
    }

    #[tokio::test]
    async fn test_successful_recommendation() {
        let (app, llm) = app_with(Behavior::Reply(
            r#"{"recommendations":[{"handle":"winter-wonderland-family-set","title":"Winter Wonderland Family Set","reason":"Matches cold climate and Christmas theme"}]}"#,
        ));

        let (status, body) = send(app, finder_request(christmas_body())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"recommendations": [{
                "handle": "winter-wonderland-family-set",
                "title": "Winter Wonderland Family Set",
                "reason": "Matches cold climate and Christmas theme"
            }]})
        );
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_question_is_bad_request_without_upstream_call() {
        let (app, llm) = app_with(Behavior::Fail);
        let body = json!({"question": "", "kits": [{"handle": "a", "title": "A"}]}).to_string();

        let (status, body) = send(app, finder_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"recommendations": []}));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_or_empty_kits_is_bad_request_without_upstream_call() {
        for body in [
            json!({"question": "Family of 4"}),
            json!({"question": "Family of 4", "kits": []}),
            json!({"question": "Family of 4", "kits": "winter"}),
        ] {
            let (app, llm) = app_with(Behavior::Fail);
            let (status, response) = send(app, finder_request(body.to_string())).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(response, json!({"recommendations": []}));
            assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_malformed_json_body_is_bad_request() {
        let (app, llm) = app_with(Behavior::Fail);
        let (status, body) = send(app, finder_request("{not json".to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"recommendations": []}));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_server_error() {
        let (status, body) = send(app_without_key(), finder_request(christmas_body())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"recommendations": []}));
    }

    #[tokio::test]
    async fn test_bad_request_checked_before_missing_key() {
        let body = json!({"question": "", "kits": []}).to_string();
        let (status, _) = send(app_without_key(), finder_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_to_fallback() {
        let (app, _) = app_with(Behavior::Fail);

        let (status, body) = send(app, finder_request(christmas_body())).await;

        assert_eq!(status, StatusCode::OK);
        let recs = body["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["handle"], "winter-wonderland-family-set");
        assert_eq!(recs[1]["handle"], "summer-beach-family-set");
        assert_eq!(recs[0]["reason"], FALLBACK_REASON);
    }

    #[tokio::test]
    async fn test_panic_in_pipeline_is_server_error() {
        let (app, _) = app_with(Behavior::Panic);

        let (status, body) = send(app, finder_request(christmas_body())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"recommendations": []}));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed_or_generated() {
        let (app, _) = app_with(Behavior::Fail);
        let id = "3f2c1a9e-8d4b-4c6f-9a1e-2b7d5c8e0f13";
        let response = app
            .clone()
            .oneshot(
                Request::get("/")
                    .header(REQUEST_ID_HEADER, id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], id);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[tokio::test]
    async fn test_cors_preflight_is_answered() {
        let (app, llm) = app_with(Behavior::Fail);
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/pajama-finder")
                    .header(header::ORIGIN, "https://shop.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cors_header_on_finder_response() {
        let (app, _) = app_with(Behavior::Fail);
        let mut request = finder_request(christmas_body());
        request.headers_mut().insert(
            header::ORIGIN,
            "https://shop.example.com".parse().unwrap(),
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_in_flight_limit_is_shared_across_routes() {
        let config = Config {
            max_concurrent_requests: 1,
            ..test_config()
        };
        let (app, llm) = app_with_config(Behavior::Hang, config);

        let stuck = tokio::spawn(app.clone().oneshot(finder_request(christmas_body())));
        while llm.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // The only slot is held by the hanging finder call, so a different route must wait.
        let root = app.oneshot(Request::get("/").body(Body::empty()).unwrap());
        let blocked = tokio::time::timeout(Duration::from_millis(200), root).await;
        assert!(blocked.is_err());

        stuck.abort();
    }

    #[tokio::test]
    async fn test_in_flight_limit_admits_up_to_configured_count() {
        let config = Config {
            max_concurrent_requests: 2,
            ..test_config()
        };
        let (app, llm) = app_with_config(Behavior::Hang, config);

        let stuck = tokio::spawn(app.clone().oneshot(finder_request(christmas_body())));
        while llm.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let root = app.oneshot(Request::get("/").body(Body::empty()).unwrap());
        let response = tokio::time::timeout(Duration::from_secs(5), root)
            .await
            .expect("second slot should be free")
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        stuck.abort();
    }
}
