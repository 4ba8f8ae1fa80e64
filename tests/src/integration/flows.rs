//! # Request Pipeline Flows
//!
//! Drives the assembled gateway router end to end:
//!
//! 1. **Account flow**: register → login → protected route with and without a token
//! 2. **Fallbacks**: undeclared routes, preflight, bad credentials
//! 3. **Upstream policy**: node failures surface as `{status: "error"}`

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode},
        Router,
    };
    use insight_gateway::{
        Collaborators, GatewayConfig, GatewayService, NodeRpc, RpcError,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Node answering from a fixed method → result table
    #[derive(Default)]
    struct CannedNode {
        results: HashMap<&'static str, Value>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NodeRpc for CannedNode {
        async fn call(&self, method: &str, _params: Vec<Value>) -> Result<Value, RpcError> {
            self.calls.lock().push(method.to_string());
            self.results
                .get(method)
                .cloned()
                .ok_or_else(|| RpcError::Transport("connection refused".into()))
        }
    }

    fn tip() -> String {
        "00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048".to_string()
    }

    fn node() -> Arc<CannedNode> {
        let mut results = HashMap::new();
        results.insert("getbestblockhash", json!(tip()));
        results.insert(
            "getblock",
            json!({ "hash": tip(), "height": 1, "size": 215, "time": 1231469665, "nTx": 1 }),
        );
        Arc::new(CannedNode {
            results,
            ..Default::default()
        })
    }

    fn gateway(node: Arc<CannedNode>) -> Router {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = "integration-secret".into();
        let mut collaborators = Collaborators::from_config(&config);
        collaborators.rpc = node;
        GatewayService::new(config, collaborators)
            .expect("valid config")
            .router()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // =============================================================================
    // ACCOUNT FLOW
    // =============================================================================

    #[tokio::test]
    async fn test_register_login_and_protected_route() {
        let node = node();
        let app = gateway(node.clone());
        let alice = json!({ "username": "alice", "password": "secret123" });

        let response = app
            .clone()
            .oneshot(post_json("/user/register", alice.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json("/user/login", alice))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let token = json_body(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                "/user/login",
                json!({ "username": "alice", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(get("/blocks?limit=1", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["length"], 1);
        assert_eq!(body["blocks"][0]["hash"], tip());

        let calls_before = node.calls.lock().len();
        let response = app.oneshot(get("/blocks", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({ "status": 401, "url": "/blocks", "error": "Unauthorized" })
        );
        assert_eq!(node.calls.lock().len(), calls_before);
    }

    #[tokio::test]
    async fn test_register_requires_all_fields() {
        let app = gateway(node());
        let response = app
            .oneshot(post_json("/user/register", json!({ "username": "bob" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "All fields required" })
        );
    }

    // =============================================================================
    // FALLBACKS
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_route_envelope() {
        let app = gateway(node());
        let response = app.oneshot(get("/api/v9/nothing", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({ "status": 404, "url": "/api/v9/nothing", "error": "Not found" })
        );
    }

    #[tokio::test]
    async fn test_preflight_never_reaches_node() {
        let node = node();
        let app = gateway(node.clone());
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/addr/1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response
            .headers()
            .contains_key("access-control-allow-methods"));
        assert!(node.calls.lock().is_empty());
    }

    // =============================================================================
    // UPSTREAM POLICY
    // =============================================================================

    #[tokio::test]
    async fn test_node_failure_is_generic_error() {
        let app = gateway(node());
        let response = app.oneshot(get("/sync", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({ "status": "error" }));
    }

    #[tokio::test]
    async fn test_public_status_route() {
        let app = gateway(node());
        let response = app
            .oneshot(get("/status?q=getBestBlockHash", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["cache-control"],
            "public, max-age=30"
        );
        assert_eq!(json_body(response).await["bestblockhash"], tip());
    }
}
