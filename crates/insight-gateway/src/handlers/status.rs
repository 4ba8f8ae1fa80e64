//! Node status: `/status`, `/sync`, `/peer`, `/version`.

use super::AppState;
use crate::domain::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub q: Option<String>,
}

/// `GET /status?q=getInfo|getDifficulty|getBestBlockHash|getLastBlockHash`
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    match query.q.as_deref().unwrap_or("getInfo") {
        "getInfo" => {
            let chain = state.rpc_call("getblockchaininfo", vec![]).await?;
            let network = state.rpc_call("getnetworkinfo", vec![]).await?;
            Ok(Json(json!({
                "info": {
                    "version": network["version"],
                    "protocolversion": network["protocolversion"],
                    "blocks": chain["blocks"],
                    "timeoffset": network["timeoffset"],
                    "connections": network["connections"],
                    "proxy": network["networks"][0]["proxy"].as_str().unwrap_or(""),
                    "difficulty": chain["difficulty"],
                    "testnet": chain["chain"] != "main",
                    "relayfee": network["relayfee"],
                    "errors": network["warnings"].as_str().unwrap_or(""),
                    "network": state.config.chain.network.as_str(),
                }
            })))
        }
        "getDifficulty" => {
            let difficulty = state.rpc_call("getdifficulty", vec![]).await?;
            Ok(Json(json!({ "difficulty": difficulty })))
        }
        "getBestBlockHash" => {
            let hash = state.rpc_call("getbestblockhash", vec![]).await?;
            Ok(Json(json!({ "bestblockhash": hash })))
        }
        "getLastBlockHash" => {
            let hash = state.rpc_call("getbestblockhash", vec![]).await?;
            Ok(Json(json!({ "syncTipHash": hash, "lastblockhash": hash })))
        }
        other => Err(ApiError::bad_request(format!("Invalid query: {other}"))),
    }
}

/// `GET /sync`
pub async fn sync(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let info = state.rpc_call("getblockchaininfo", vec![]).await?;
    let blocks = info["blocks"].as_u64().unwrap_or(0);
    let headers = info["headers"].as_u64().unwrap_or(blocks);
    let percentage = if headers == 0 {
        100.0
    } else {
        (blocks as f64 / headers as f64 * 100.0).min(100.0)
    };
    let finished = blocks >= headers;

    Ok(Json(json!({
        "status": if finished { "finished" } else { "syncing" },
        "blockChainHeight": headers,
        "syncPercentage": (percentage * 100.0).round() / 100.0,
        "height": blocks,
        "error": null,
        "type": "bitcoind node",
    })))
}

/// `GET /peer`
pub async fn peer(State(state): State<AppState>) -> Json<Value> {
    let (host, port) = reqwest::Url::parse(&state.config.rpc.url)
        .ok()
        .map(|url| {
            (
                url.host_str().unwrap_or_default().to_string(),
                url.port_or_known_default(),
            )
        })
        .unwrap_or_default();

    Json(json!({
        "connected": state.rpc.call("getconnectioncount", vec![]).await.is_ok(),
        "host": host,
        "port": port,
    }))
}

/// `GET /version`
pub async fn version() -> Json<Value> {
    Json(json!({ "version": crate::VERSION }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{state, MockNode};
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn node() -> Arc<MockNode> {
        let node = Arc::new(MockNode::default());
        node.returns(
            "getblockchaininfo",
            json!({ "chain": "main", "blocks": 90, "headers": 100, "difficulty": 1.5 }),
        )
        .returns(
            "getnetworkinfo",
            json!({ "version": 250000, "protocolversion": 70016, "connections": 8,
                    "relayfee": 0.00001, "timeoffset": 0, "warnings": "" }),
        )
        .returns("getbestblockhash", json!("00".repeat(32)))
        .returns("getdifficulty", json!(1.5));
        node
    }

    fn q(value: &str) -> Query<StatusQuery> {
        Query(StatusQuery {
            q: Some(value.to_string()),
        })
    }

    #[tokio::test]
    async fn test_status_info() {
        let Json(body) = status(State(state(node())), Query(StatusQuery::default()))
            .await
            .unwrap();
        assert_eq!(body["info"]["blocks"], 90);
        assert_eq!(body["info"]["connections"], 8);
        assert_eq!(body["info"]["testnet"], false);
        assert_eq!(body["info"]["network"], "livenet");
    }

    #[tokio::test]
    async fn test_status_variants() {
        let s = state(node());
        let Json(body) = status(State(s.clone()), q("getDifficulty")).await.unwrap();
        assert_eq!(body["difficulty"], 1.5);

        let Json(body) = status(State(s.clone()), q("getLastBlockHash")).await.unwrap();
        assert_eq!(body["syncTipHash"], body["lastblockhash"]);

        let err = status(State(s), q("getNothing")).await.unwrap_err();
        assert_eq!(err.http_status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sync_percentage() {
        let Json(body) = sync(State(state(node()))).await.unwrap();
        assert_eq!(body["status"], "syncing");
        assert_eq!(body["syncPercentage"], 90.0);
        assert_eq!(body["height"], 90);
        assert_eq!(body["blockChainHeight"], 100);
        assert!(body["error"].is_null());
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_configured_status() {
        let err = sync(State(state(Arc::new(MockNode::default()))))
            .await
            .unwrap_err();
        assert_eq!(err.http_status, StatusCode::NOT_FOUND);
        assert_eq!(err.to_body("/sync"), json!({ "status": "error" }));
    }

    #[tokio::test]
    async fn test_peer_reports_rpc_endpoint() {
        let n = node();
        n.returns("getconnectioncount", json!(8));
        let Json(body) = peer(State(state(n))).await;
        assert_eq!(body["connected"], true);
        assert_eq!(body["host"], "127.0.0.1");
        assert_eq!(body["port"], 8332);
    }

    #[tokio::test]
    async fn test_version() {
        let Json(body) = version().await;
        assert_eq!(body["version"], crate::VERSION);
    }
}
