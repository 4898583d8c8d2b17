use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use routine_proxy::client::{Catalog, ChatReply, ChatRequest, ClientError, RoutineSession};
use routine_proxy::config::{AppConfig, Credential};
use routine_proxy::routing::dispatch::dispatch_request;
use routine_proxy::state::AppState;
use routine_proxy::transport::HttpTransport;
use serde_json::json;

const CATALOG: &str = r#"{
  "products": [
    {"id": 1, "name": "Hydrating Facial Cleanser", "brand": "CeraVe", "category": "cleanser", "image": "a.png", "description": "Gentle cleanser"},
    {"id": 2, "name": "Revitalift Serum", "brand": "L'Oréal Paris", "category": "skincare", "image": "b.png", "description": "Hyaluronic acid serum"},
    {"id": 3, "name": "Voluminous Mascara", "brand": "L'Oréal Paris", "category": "makeup", "image": "c.png", "description": "Lash mascara"}
  ]
}"#;

/// Upstream that echoes the last message back as the assistant reply.
async fn spawn_echo_upstream() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(request): Json<ChatRequest>| async move {
            let last = request
                .messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            Json(json!({
                "id": "chatcmpl_echo",
                "object": "chat.completion",
                "model": request.model,
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": format!("Routine for: {last}")},
                    "finish_reason": "stop"
                }]
            }))
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1/chat/completions"), server)
}

fn build_state(upstream_url: String) -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.upstream.url = upstream_url;
    let transport = HttpTransport::new(&config.server);
    Arc::new(AppState::new(config, transport, Credential::new("sk-test")).expect("build state"))
}

async fn post_through_proxy(
    state: Arc<AppState>,
    request: &ChatRequest,
) -> (StatusCode, ChatReply) {
    let body = serde_json::to_vec(request).expect("serialize request");
    let http_request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("build request");
    let response = dispatch_request(state, Arc::<str>::from(""), http_request)
        .await
        .expect("dispatch");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("chat reply"))
}

#[tokio::test]
async fn test_routine_then_followup_through_proxy() {
    let (upstream_url, server) = spawn_echo_upstream().await;
    let state = build_state(upstream_url);
    let catalog: Catalog = serde_json::from_str(CATALOG).expect("catalog");

    let mut session = RoutineSession::default();
    assert_eq!(
        session.routine_request().unwrap_err(),
        ClientError::NoProductsSelected
    );

    session.selection.toggle(&catalog.products[0]);
    session.selection.toggle(&catalog.products[1]);

    let routine_request = session.routine_request().expect("routine request");
    let (status, reply) = post_through_proxy(Arc::clone(&state), &routine_request).await;
    assert_eq!(status, StatusCode::OK);
    let routine = session.record_reply(&reply, true).expect("routine text");
    assert!(routine.contains("Hydrating Facial Cleanser by CeraVe"));
    assert!(routine.contains("Revitalift Serum by L'Oréal Paris"));
    assert_eq!(session.last_routine(), Some(routine.as_str()));

    let followup = session
        .followup_request("Can I use this every morning?")
        .expect("followup request");
    let (status, reply) = post_through_proxy(state, &followup).await;
    assert_eq!(status, StatusCode::OK);
    let answer = session.record_reply(&reply, false).expect("answer text");
    assert!(answer.contains("Here is the routine you suggested earlier"));
    assert!(answer.ends_with("Can I use this every morning?"));
    assert_eq!(session.last_routine(), Some(routine.as_str()));

    server.abort();
}
