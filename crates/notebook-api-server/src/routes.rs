use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::warn;

use crate::config::ServerConfig;
use crate::handlers;
use crate::middleware::process_time_middleware;
use crate::state::AppState;

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

pub fn build_router(state: AppState) -> Router {
    // Document text arrives inline; leave headroom over the size limit for JSON framing
    let body_limit = (state.settings.documents.max_file_size_mb * 1024.0 * 1024.0) as usize * 2;

    let chat_routes = Router::new()
        .route("/send", post(handlers::chat::send_message))
        .route("/{chat_id}/retry", post(handlers::chat::retry_answer))
        .route("/{chat_id}/messages", get(handlers::chat::list_messages))
        .route("/{chat_id}/turns", post(handlers::chat::record_turn));

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .nest("/chat", chat_routes)
        .route(
            "/documents",
            get(handlers::documents::list_documents).post(handlers::documents::register_document),
        )
        .route(
            "/documents/",
            get(handlers::documents::list_documents).post(handlers::documents::register_document),
        )
        .route("/documents/upload", post(handlers::documents::register_document))
        .route("/documents/{document_id}", get(handlers::documents::get_document))
        .route(
            "/notebooks",
            get(handlers::notebooks::list_notebooks).post(handlers::notebooks::create_notebook),
        )
        .route(
            "/notebooks/",
            get(handlers::notebooks::list_notebooks).post(handlers::notebooks::create_notebook),
        )
        .route("/notebooks/{notebook_id}", get(handlers::notebooks::get_notebook))
        .route("/notebooks/{notebook_id}/cells", post(handlers::notebooks::add_cell))
        .layer(middleware::from_fn(process_time_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.settings.server))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::services::conversation::{
        EmbeddingProvider, GenerationRequest, InMemoryConversationStore, LlmProvider,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Counts keyword hits; enough to separate documents by topic.
    struct KeywordEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingProvider for KeywordEmbedding {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let text = text.to_lowercase();
            Ok(vec![
                text.matches("revenue").count() as f32,
                text.matches("hiring").count() as f32,
                0.01,
            ])
        }
    }

    /// Echoes the first excerpt it was given, or fails while `down` is set.
    #[derive(Default)]
    struct EchoLlm {
        down: AtomicBool,
    }

    #[async_trait::async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("model offline");
            }
            Ok(request
                .documents
                .first()
                .and_then(|d| d.excerpts.first())
                .map(|e| format!("Based on the documents: {}", e))
                .unwrap_or_else(|| "I found nothing relevant.".to_string()))
        }
    }

    fn app_with(llm: Arc<EchoLlm>) -> Router {
        let state = AppState::from_parts(
            Settings::default(),
            Box::new(InMemoryConversationStore::new()),
            Arc::new(KeywordEmbedding),
            llm,
        );
        build_router(state)
    }

    fn app() -> Router {
        app_with(Arc::new(EchoLlm::default()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, name: &str, content: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/documents",
            Some(json!({"file_name": name, "content": content})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["file_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = app();

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "service": "notebook-backend"}));

        let (_, body) = call(&app, "GET", "/", None).await;
        assert_eq!(body["message"], "Notebook LM Clone Backend");

        let (status, body) = call(&app, "GET", "/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["conversations"], 0);
    }

    #[tokio::test]
    async fn test_responses_carry_process_time() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let header = response.headers().get("x-process-time-ms").unwrap();
        assert!(header.to_str().unwrap().parse::<f64>().is_ok());
    }

    #[tokio::test]
    async fn test_chat_cites_only_scoped_documents() {
        let app = app();
        let doc_a = register(&app, "finance.md", "Revenue grew by ten percent in Q3.").await;
        let doc_b = register(&app, "people.txt", "Hiring slowed in the second half.").await;

        let (status, body) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({
                "chat_id": "c1",
                "documents": [doc_a, doc_b],
                "message": "What happened to revenue?"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["chat_id"], "c1");
        assert_eq!(body["citations"], json!([doc_a]));
        assert_eq!(body["grounded"], true);
        assert!(body["answer"].as_str().unwrap().contains("Revenue grew"));

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["source_documents"], json!([doc_a]));

        // Restricting to the other document never cites the first one
        let (_, body) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({"chat_id": "c1", "documents": [doc_b], "message": "revenue?"})),
        )
        .await;
        assert_eq!(body["citations"], json!([]));
        assert_eq!(body["grounded"], false);
        assert!(body["notice"].is_string());
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_chat_without_id_starts_new_conversation() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({"message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let chat_id = body["chat_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(chat_id).is_ok());

        let (status, body) = call(&app, "POST", "/chat/send", Some(json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BadRequest");
    }

    #[tokio::test]
    async fn test_notebook_scopes_chat() {
        let app = app();
        let doc_a = register(&app, "finance.md", "Revenue grew by ten percent.").await;
        let doc_b = register(&app, "people.md", "Hiring slowed down.").await;

        let (status, body) = call(
            &app,
            "POST",
            "/notebooks",
            Some(json!({"title": "People", "documents": [doc_b]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let notebook_id = body["notebook"]["id"].as_str().unwrap().to_string();

        let (_, body) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({"notebook_id": notebook_id, "message": "revenue and hiring"})),
        )
        .await;
        assert_eq!(body["citations"], json!([doc_b]));

        // Explicit documents override the notebook
        let (_, body) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({"notebook_id": notebook_id, "documents": [doc_a], "message": "revenue"})),
        )
        .await;
        assert_eq!(body["citations"], json!([doc_a]));

        let (status, _) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({"notebook_id": "nb_missing", "message": "revenue"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generation_failure_then_retry() {
        let llm = Arc::new(EchoLlm::default());
        let app = app_with(llm.clone());
        llm.down.store(true, Ordering::SeqCst);

        let (status, body) = call(
            &app,
            "POST",
            "/chat/send",
            Some(json!({"chat_id": "c9", "message": "Summarize"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "GenerationFailed");
        assert_eq!(body["chat_id"], "c9");
        assert_eq!(body["user_turn_saved"], true);

        let (_, body) = call(&app, "GET", "/chat/c9/messages", None).await;
        assert_eq!(body["status"], "active");
        assert_eq!(body["awaiting_answer"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);

        llm.down.store(false, Ordering::SeqCst);
        let (status, body) = call(&app, "POST", "/chat/c9/retry", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let (status, body) = call(&app, "POST", "/chat/c9/retry", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
    }

    #[tokio::test]
    async fn test_record_turn_and_history() {
        let app = app();

        let (status, body) = call(&app, "GET", "/chat/unknown/messages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "empty");
        assert_eq!(body["messages"], json!([]));

        let (status, body) = call(
            &app,
            "POST",
            "/chat/c2/turns",
            Some(json!({"role": "system", "content": "Be concise."})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message_count"], 1);
        assert_eq!(body["turn"]["role"], "system");

        let (status, body) = call(
            &app,
            "POST",
            "/chat/c2/turns",
            Some(json!({"role": "narrator", "content": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("narrator"));

        let (_, body) = call(&app, "GET", "/chat/c2/messages", None).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["awaiting_answer"], false);
    }

    #[tokio::test]
    async fn test_document_and_notebook_listing() {
        let app = app();
        let (status, _) = call(
            &app,
            "POST",
            "/documents",
            Some(json!({"file_name": "virus.exe", "content": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let doc = register(&app, "data.csv", "revenue,hiring\n1,2").await;
        let (_, body) = call(&app, "GET", "/documents", None).await;
        assert_eq!(body["documents"].as_array().unwrap().len(), 1);
        assert_eq!(body["documents"][0]["file_id"], doc.as_str());

        let (status, _) = call(&app, "GET", "/documents/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, uploaded) = call(
            &app,
            "POST",
            "/documents/upload",
            Some(json!({"file_name": "notes.txt", "content": "hiring plan"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = call(
            &app,
            "GET",
            &format!("/documents/{}", uploaded["file_id"].as_str().unwrap()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["file_name"], "notes.txt");

        let (_, created) = call(&app, "POST", "/notebooks/", Some(json!({"title": "Q3"}))).await;
        let id = created["notebook"]["id"].as_str().unwrap();

        let (status, body) = call(
            &app,
            "POST",
            &format!("/notebooks/{}/cells", id),
            Some(json!({"cell_type": "ai", "content": "Summarize Q3"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["notebook"]["cells"][0]["cell_type"], "ai");

        let (_, body) = call(&app, "GET", "/notebooks", None).await;
        assert_eq!(body["notebooks"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "GET", "/notebooks/nb_missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
