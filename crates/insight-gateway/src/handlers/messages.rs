//! Signed-message verification and fee estimation.

use super::{AppState, Payload};
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::network::is_valid_address;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    pub address: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
}

/// `GET|POST /messages/verify`
pub async fn verify(
    State(state): State<AppState>,
    Payload(params): Payload<VerifyParams>,
) -> ApiResult<Json<Value>> {
    let (Some(address), Some(signature), Some(message)) =
        (params.address, params.signature, params.message)
    else {
        return Err(ApiError::bad_request(
            "Missing parameters (expected \"address\", \"signature\" and \"message\")",
        ));
    };
    if !is_valid_address(&address, state.config.chain.network) {
        return Err(ApiError::bad_request("Invalid address"));
    }

    let result = state
        .rpc_call(
            "verifymessage",
            vec![json!(address), json!(signature), json!(message)],
        )
        .await?;
    Ok(Json(json!({ "result": result.as_bool().unwrap_or(false) })))
}

#[derive(Debug, Default, Deserialize)]
pub struct EstimateFeeQuery {
    #[serde(rename = "nbBlocks")]
    pub nb_blocks: Option<String>,
}

fn block_targets(raw: Option<&str>) -> Result<Vec<u32>, ApiError> {
    match raw {
        None | Some("") => Ok(vec![2]),
        Some(list) => list
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ApiError::bad_request("Invalid nbBlocks"))
            })
            .collect(),
    }
}

/// `GET /utils/estimatefee?nbBlocks=2,3` → `{"2": fee, "3": fee}`
///
/// A target the node cannot estimate reports `-1`.
pub async fn estimate_fee(
    State(state): State<AppState>,
    Query(query): Query<EstimateFeeQuery>,
) -> ApiResult<Json<Value>> {
    let mut fees = Map::new();
    for target in block_targets(query.nb_blocks.as_deref())? {
        let estimate = state.rpc_call("estimatesmartfee", vec![json!(target)]).await?;
        let fee = estimate["feerate"].as_f64().unwrap_or(-1.0);
        fees.insert(target.to_string(), json!(fee));
    }
    Ok(Json(Value::Object(fees)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{state, MockNode};
    use axum::http::StatusCode;
    use std::sync::Arc;

    const GENESIS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    #[tokio::test]
    async fn test_verify_message() {
        let node = Arc::new(MockNode::default());
        node.returns("verifymessage", json!(true));
        let params = VerifyParams {
            address: Some(GENESIS.into()),
            signature: Some("H/sig=".into()),
            message: Some("hello".into()),
        };
        let Json(body) = verify(State(state(node.clone())), Payload(params)).await.unwrap();
        assert_eq!(body, json!({ "result": true }));
        assert_eq!(node.called("verifymessage"), 1);
    }

    #[tokio::test]
    async fn test_verify_missing_params() {
        let params = VerifyParams {
            address: Some(GENESIS.into()),
            ..Default::default()
        };
        let err = verify(State(state(Arc::new(MockNode::default()))), Payload(params))
            .await
            .unwrap_err();
        assert_eq!(err.http_status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_block_targets() {
        assert_eq!(block_targets(None).unwrap(), vec![2]);
        assert_eq!(block_targets(Some("2, 6,12")).unwrap(), vec![2, 6, 12]);
        assert!(block_targets(Some("0")).is_err());
        assert!(block_targets(Some("two")).is_err());
    }

    #[tokio::test]
    async fn test_estimate_fee() {
        let node = Arc::new(MockNode::default());
        node.on("estimatesmartfee", |params| {
            if params[0] == json!(2) {
                Ok(json!({ "feerate": 0.0002, "blocks": 2 }))
            } else {
                Ok(json!({ "errors": ["Insufficient data"], "blocks": 0 }))
            }
        });
        let query = EstimateFeeQuery {
            nb_blocks: Some("2,1008".into()),
        };
        let Json(body) = estimate_fee(State(state(node)), Query(query)).await.unwrap();
        assert_eq!(body, json!({ "2": 0.0002, "1008": -1.0 }));
    }
}
