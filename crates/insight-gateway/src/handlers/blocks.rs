//! Block queries.

use super::{is_hash, AppState};
use crate::domain::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct BlocksQuery {
    pub limit: Option<String>,
}

/// Requested list length, clamped to the configured maximum
fn block_limit(raw: Option<&str>, default: usize, max: usize) -> Result<usize, ApiError> {
    match raw {
        None | Some("") => Ok(default.min(max)),
        Some(s) => s
            .parse::<usize>()
            .map(|n| n.min(max))
            .map_err(|_| ApiError::bad_request("Invalid limit")),
    }
}

fn checked_hash(hash: &str) -> Result<&str, ApiError> {
    if is_hash(hash) {
        Ok(hash)
    } else {
        Err(ApiError::bad_request("Invalid block hash"))
    }
}

fn summary(block: &Value) -> Value {
    json!({
        "hash": block["hash"],
        "height": block["height"],
        "size": block["size"],
        "time": block["time"],
        "txlength": block["nTx"].as_u64()
            .or_else(|| block["tx"].as_array().map(|txs| txs.len() as u64))
            .unwrap_or(0),
    })
}

/// `GET /blocks?limit=n` - most recent blocks, newest first
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<BlocksQuery>,
) -> ApiResult<Json<Value>> {
    let limits = &state.config.limits;
    let limit = block_limit(
        query.limit.as_deref(),
        limits.default_block_list,
        limits.max_block_list,
    )?;

    let mut blocks = Vec::with_capacity(limit);
    let mut next = state.rpc_call("getbestblockhash", vec![]).await?;
    while blocks.len() < limit {
        let Some(hash) = next.as_str().map(str::to_string) else {
            break;
        };
        let block = state.rpc_call("getblock", vec![json!(hash), json!(1)]).await?;
        blocks.push(summary(&block));
        next = block["previousblockhash"].clone();
    }

    Ok(Json(json!({ "length": blocks.len(), "blocks": blocks })))
}

/// `GET /block/:blockHash`
pub async fn block(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<Value>> {
    let hash = checked_hash(&hash)?;
    let block = state.rpc_call("getblock", vec![json!(hash), json!(1)]).await?;
    Ok(Json(block))
}

/// `GET /rawblock/:blockHash`
pub async fn raw_block(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<Value>> {
    let hash = checked_hash(&hash)?;
    let raw = state.rpc_call("getblock", vec![json!(hash), json!(0)]).await?;
    Ok(Json(json!({ "rawblock": raw })))
}

/// `GET /block-index/:height`
pub async fn block_index(
    State(state): State<AppState>,
    Path(height): Path<String>,
) -> ApiResult<Json<Value>> {
    let height: u64 = height
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid block height"))?;
    let hash = state.rpc_call("getblockhash", vec![json!(height)]).await?;
    Ok(Json(json!({ "blockHash": hash })))
}
