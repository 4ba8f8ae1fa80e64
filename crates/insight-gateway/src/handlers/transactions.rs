//! Transaction queries and broadcast.

use super::{is_hash, AppState, Payload};
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::network::is_valid_address;
use crate::rpc::RpcError;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Transactions per `/txs` page
pub const TXS_PAGE_SIZE: usize = 10;

fn checked_txid(txid: &str) -> Result<&str, ApiError> {
    if is_hash(txid) {
        Ok(txid)
    } else {
        Err(ApiError::bad_request("Invalid transaction id"))
    }
}

/// `GET /tx/:txid`
pub async fn tx(State(state): State<AppState>, Path(txid): Path<String>) -> ApiResult<Json<Value>> {
    let txid = checked_txid(&txid)?;
    let tx = state
        .rpc_call("getrawtransaction", vec![json!(txid), json!(true)])
        .await?;
    Ok(Json(tx))
}

/// `GET /rawtx/:txid`
pub async fn raw_tx(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> ApiResult<Json<Value>> {
    let txid = checked_txid(&txid)?;
    let raw = state
        .rpc_call("getrawtransaction", vec![json!(txid), json!(false)])
        .await?;
    Ok(Json(json!({ "rawtx": raw })))
}

#[derive(Debug, Default, Deserialize)]
pub struct TxsQuery {
    pub block: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "pageNum")]
    pub page_num: Option<String>,
}

/// `GET /txs?block=<hash>` or `GET /txs?address=<addr>`, paged
pub async fn txs(
    State(state): State<AppState>,
    Query(query): Query<TxsQuery>,
) -> ApiResult<Json<Value>> {
    let page: usize = match query.page_num.as_deref() {
        None | Some("") => 0,
        Some(s) => s
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid page number"))?,
    };

    let txids: Vec<String> = if let Some(block) = query.block.as_deref() {
        if !is_hash(block) {
            return Err(ApiError::bad_request("Invalid block hash"));
        }
        let block = state.rpc_call("getblock", vec![json!(block), json!(1)]).await?;
        string_list(&block["tx"])
    } else if let Some(address) = query.address.as_deref() {
        if !is_valid_address(address, state.config.chain.network) {
            return Err(ApiError::bad_request("Invalid address"));
        }
        let ids = state
            .rpc_call("getaddresstxids", vec![json!({ "addresses": [address] })])
            .await?;
        // node returns oldest first
        let mut ids = string_list(&ids);
        ids.reverse();
        ids
    } else {
        return Err(ApiError::bad_request("Block hash or address expected"));
    };

    let pages_total = txids.len().div_ceil(TXS_PAGE_SIZE);
    let mut txs = Vec::new();
    for txid in txids.iter().skip(page.saturating_mul(TXS_PAGE_SIZE)).take(TXS_PAGE_SIZE) {
        txs.push(
            state
                .rpc_call("getrawtransaction", vec![json!(txid), json!(true)])
                .await?,
        );
    }

    Ok(Json(json!({ "pagesTotal": pages_total, "txs": txs })))
}

pub(crate) fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
pub struct SendTx {
    pub rawtx: Option<String>,
}

/// `POST /tx/send` - broadcast a signed raw transaction
pub async fn send(
    State(state): State<AppState>,
    Payload(body): Payload<SendTx>,
) -> ApiResult<Json<Value>> {
    let rawtx = body
        .rawtx
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing parameter: rawtx"))?;

    match state.rpc_call_raw("sendrawtransaction", vec![json!(rawtx)]).await {
        Ok(txid) => Ok(Json(json!({ "txid": txid }))),
        Err(RpcError::Node { message, .. }) => Err(ApiError::bad_request(message)),
        Err(error) => Err(state.upstream_error("sendrawtransaction", error)),
    }
}
