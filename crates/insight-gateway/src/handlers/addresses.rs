//! Address queries backed by the node's address index.

use super::transactions::string_list;
use super::{to_coins, AppState, Payload};
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::network::{is_valid_address, Network};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Page size of `/addrs/txs` when `to` is omitted
const DEFAULT_ADDRESS_PAGE: usize = 10;

fn checked_address(address: &str, network: Network) -> Result<String, ApiError> {
    let address = address.trim();
    if is_valid_address(address, network) {
        Ok(address.to_string())
    } else {
        Err(ApiError::bad_request("Invalid address"))
    }
}

/// Comma-separated address list; every entry must be valid
pub fn parse_address_list(raw: &str, network: Network) -> Result<Vec<String>, ApiError> {
    let addresses = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| checked_address(s, network))
        .collect::<Result<Vec<_>, _>>()?;
    if addresses.is_empty() {
        return Err(ApiError::bad_request("Invalid address"));
    }
    Ok(addresses)
}

struct Balance {
    balance: i64,
    received: i64,
    unconfirmed: i64,
    unconfirmed_txs: usize,
}

impl Balance {
    fn sent(&self) -> i64 {
        self.received - self.balance
    }
}

async fn balance_of(state: &AppState, addresses: &[String]) -> Result<Balance, ApiError> {
    let filter = json!({ "addresses": addresses });
    let confirmed = state.rpc_call("getaddressbalance", vec![filter.clone()]).await?;
    let mempool = state.rpc_call("getaddressmempool", vec![filter]).await?;

    let entries = mempool.as_array().map(Vec::as_slice).unwrap_or_default();
    Ok(Balance {
        balance: confirmed["balance"].as_i64().unwrap_or(0),
        received: confirmed["received"].as_i64().unwrap_or(0),
        unconfirmed: entries.iter().filter_map(|e| e["satoshis"].as_i64()).sum(),
        unconfirmed_txs: entries.len(),
    })
}

/// Confirmed txids for `addresses`, newest first
async fn txids_of(state: &AppState, addresses: &[String]) -> Result<Vec<String>, ApiError> {
    let ids = state
        .rpc_call("getaddresstxids", vec![json!({ "addresses": addresses })])
        .await?;
    let mut ids = string_list(&ids);
    ids.reverse();
    Ok(ids)
}

/// `GET /addr/:addr`
pub async fn address(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> ApiResult<Json<Value>> {
    let addresses = vec![checked_address(&addr, state.config.chain.network)?];
    let balance = balance_of(&state, &addresses).await?;
    let txids = txids_of(&state, &addresses).await?;

    Ok(Json(json!({
        "addrStr": addresses[0],
        "balance": to_coins(balance.balance),
        "balanceSat": balance.balance,
        "totalReceived": to_coins(balance.received),
        "totalReceivedSat": balance.received,
        "totalSent": to_coins(balance.sent()),
        "totalSentSat": balance.sent(),
        "unconfirmedBalance": to_coins(balance.unconfirmed),
        "unconfirmedBalanceSat": balance.unconfirmed,
        "unconfirmedTxApperances": balance.unconfirmed_txs,
        "txApperances": txids.len(),
        "transactions": txids,
    })))
}

async fn utxos_of(state: &AppState, addresses: &[String]) -> Result<Vec<Value>, ApiError> {
    let utxos = state
        .rpc_call("getaddressutxos", vec![json!({ "addresses": addresses })])
        .await?;
    Ok(utxos
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|u| {
            let satoshis = u["satoshis"].as_i64().unwrap_or(0);
            json!({
                "address": u["address"],
                "txid": u["txid"],
                "vout": u["outputIndex"],
                "scriptPubKey": u["script"],
                "amount": to_coins(satoshis),
                "satoshis": satoshis,
                "height": u["height"],
            })
        })
        .collect())
}

/// `GET /addr/:addr/utxo`
pub async fn utxo(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> ApiResult<Json<Value>> {
    let addresses = vec![checked_address(&addr, state.config.chain.network)?];
    Ok(Json(Value::Array(utxos_of(&state, &addresses).await?)))
}

/// Parameters of the multi-address routes, from the path, query or body
#[derive(Debug, Default, Deserialize)]
pub struct AddrsParams {
    pub addrs: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn addrs_from(
    path: Option<Path<String>>,
    params: &AddrsParams,
    network: Network,
) -> Result<Vec<String>, ApiError> {
    let raw = path
        .map(|Path(p)| p)
        .or_else(|| params.addrs.clone())
        .ok_or_else(|| ApiError::bad_request("Missing parameter: addrs"))?;
    parse_address_list(&raw, network)
}

/// `GET /addrs/:addrs/utxo`, `POST /addrs/utxo`
pub async fn multi_utxo(
    State(state): State<AppState>,
    path: Option<Path<String>>,
    Payload(params): Payload<AddrsParams>,
) -> ApiResult<Json<Value>> {
    let addresses = addrs_from(path, &params, state.config.chain.network)?;
    Ok(Json(Value::Array(utxos_of(&state, &addresses).await?)))
}

/// `from`/`to` window, `to` exclusive
fn page_window(
    from: Option<&str>,
    to: Option<&str>,
    max: usize,
) -> Result<(usize, usize), ApiError> {
    let parse = |raw: Option<&str>, name: &str| -> Result<Option<usize>, ApiError> {
        match raw {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid {name}"))),
        }
    };
    let from = parse(from, "from")?.unwrap_or(0);
    let to = parse(to, "to")?.unwrap_or(from.saturating_add(DEFAULT_ADDRESS_PAGE));
    if from > to {
        return Err(ApiError::bad_request(format!(
            "\"from\" ({from}) is expected to be less than \"to\" ({to})"
        )));
    }
    Ok((from, to.min(from.saturating_add(max))))
}

/// `GET /addrs/:addrs/txs`, `POST /addrs/txs`
pub async fn multi_txs(
    State(state): State<AppState>,
    path: Option<Path<String>>,
    Payload(params): Payload<AddrsParams>,
) -> ApiResult<Json<Value>> {
    let addresses = addrs_from(path, &params, state.config.chain.network)?;
    let (from, to) = page_window(
        params.from.as_deref(),
        params.to.as_deref(),
        state.config.limits.max_address_page,
    )?;

    let txids = txids_of(&state, &addresses).await?;
    let to = to.min(txids.len());
    let mut items = Vec::new();
    for txid in txids.iter().take(to).skip(from) {
        items.push(
            state
                .rpc_call("getrawtransaction", vec![json!(txid), json!(true)])
                .await?,
        );
    }

    Ok(Json(json!({
        "totalItems": txids.len(),
        "from": from,
        "to": to.max(from),
        "items": items,
    })))
}

/// Which single number an `/addr/:addr/<property>` route reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressProperty {
    Balance,
    TotalReceived,
    TotalSent,
    UnconfirmedBalance,
}

async fn property(state: AppState, addr: String, which: AddressProperty) -> ApiResult<Json<Value>> {
    let addresses = vec![checked_address(&addr, state.config.chain.network)?];
    let balance = balance_of(&state, &addresses).await?;
    let satoshis = match which {
        AddressProperty::Balance => balance.balance,
        AddressProperty::TotalReceived => balance.received,
        AddressProperty::TotalSent => balance.sent(),
        AddressProperty::UnconfirmedBalance => balance.unconfirmed,
    };
    Ok(Json(json!(satoshis)))
}

/// `GET /addr/:addr/balance`
pub async fn balance(State(state): State<AppState>, Path(addr): Path<String>) -> ApiResult<Json<Value>> {
    property(state, addr, AddressProperty::Balance).await
}

/// `GET /addr/:addr/totalReceived`
pub async fn total_received(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> ApiResult<Json<Value>> {
    property(state, addr, AddressProperty::TotalReceived).await
}

/// `GET /addr/:addr/totalSent`
pub async fn total_sent(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> ApiResult<Json<Value>> {
    property(state, addr, AddressProperty::TotalSent).await
}

/// `GET /addr/:addr/unconfirmedBalance`
pub async fn unconfirmed_balance(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> ApiResult<Json<Value>> {
    property(state, addr, AddressProperty::UnconfirmedBalance).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorBody;
    use crate::handlers::testing::{state, MockNode};
    use axum::http::StatusCode;
    use std::sync::Arc;

    const GENESIS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
    const SCRIPT_HASH: &str = "33FFrcn4Tv1qgGEuXPkkPdr44DuWp3RzPo";

    fn node() -> Arc<MockNode> {
        let node = Arc::new(MockNode::default());
        node.returns(
            "getaddressbalance",
            json!({ "balance": 150_000_000, "received": 500_000_000 }),
        )
        .returns(
            "getaddressmempool",
            json!([{ "satoshis": 1000 }, { "satoshis": -200 }]),
        )
        .returns("getaddresstxids", json!(["aa", "bb", "cc"]))
        .returns(
            "getaddressutxos",
            json!([{ "address": GENESIS, "txid": "aa", "outputIndex": 0,
                     "script": "76a9", "satoshis": 5_000_000_000i64, "height": 0 }]),
        );
        node.on("getrawtransaction", |params| Ok(json!({ "txid": params[0] })));
        node
    }

    #[test]
    fn test_parse_address_list() {
        let list = format!("{GENESIS}, {SCRIPT_HASH},");
        assert_eq!(
            parse_address_list(&list, Network::Livenet).unwrap(),
            vec![GENESIS.to_string(), SCRIPT_HASH.to_string()]
        );
        assert!(parse_address_list("", Network::Livenet).is_err());
        assert!(parse_address_list(&format!("{GENESIS},bogus"), Network::Livenet).is_err());
        assert!(parse_address_list(GENESIS, Network::Testnet).is_err());
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(None, None, 50).unwrap(), (0, 10));
        assert_eq!(page_window(Some("5"), Some("8"), 50).unwrap(), (5, 8));
        assert_eq!(page_window(Some("0"), Some("500"), 50).unwrap(), (0, 50));
        assert!(page_window(Some("9"), Some("3"), 50).is_err());

        let last = usize::MAX.to_string();
        assert_eq!(
            page_window(Some(&last), None, 50).unwrap(),
            (usize::MAX, usize::MAX)
        );
        assert_eq!(
            page_window(Some(&last), Some(&last), 50).unwrap(),
            (usize::MAX, usize::MAX)
        );
    }

    #[tokio::test]
    async fn test_address_summary() {
        let Json(body) = address(State(state(node())), Path(GENESIS.into()))
            .await
            .unwrap();
        assert_eq!(body["addrStr"], GENESIS);
        assert_eq!(body["balanceSat"], 150_000_000);
        assert_eq!(body["balance"], 1.5);
        assert_eq!(body["totalSentSat"], 350_000_000);
        assert_eq!(body["unconfirmedBalanceSat"], 800);
        assert_eq!(body["unconfirmedTxApperances"], 2);
        assert_eq!(body["transactions"], json!(["cc", "bb", "aa"]));
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_rpc() {
        let n = node();
        let err = address(State(state(n.clone())), Path("nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body, ErrorBody::Envelope("Invalid address".into()));
        assert!(n.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_properties() {
        let s = state(node());
        let Json(v) = total_received(State(s.clone()), Path(GENESIS.into())).await.unwrap();
        assert_eq!(v, json!(500_000_000));
        let Json(v) = unconfirmed_balance(State(s), Path(GENESIS.into())).await.unwrap();
        assert_eq!(v, json!(800));
    }

    #[tokio::test]
    async fn test_utxo_shape() {
        let Json(body) = utxo(State(state(node())), Path(GENESIS.into())).await.unwrap();
        assert_eq!(body[0]["vout"], 0);
        assert_eq!(body[0]["amount"], 50.0);
        assert_eq!(body[0]["scriptPubKey"], "76a9");
    }

    #[tokio::test]
    async fn test_multi_txs_from_body() {
        let params = AddrsParams {
            addrs: Some(format!("{GENESIS},{SCRIPT_HASH}")),
            from: Some("1".into()),
            to: Some("3".into()),
        };
        let Json(body) = multi_txs(State(state(node())), None, Payload(params))
            .await
            .unwrap();
        assert_eq!(body["totalItems"], 3);
        assert_eq!(body["from"], 1);
        assert_eq!(body["to"], 3);
        let ids: Vec<_> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["txid"].clone())
            .collect();
        assert_eq!(ids, vec![json!("bb"), json!("aa")]);
    }

    #[tokio::test]
    async fn test_multi_txs_from_past_the_end() {
        let node = node();
        let params = AddrsParams {
            addrs: Some(GENESIS.into()),
            from: Some(usize::MAX.to_string()),
            to: None,
        };
        let Json(body) = multi_txs(State(state(node.clone())), None, Payload(params))
            .await
            .unwrap();
        assert_eq!(body["totalItems"], 3);
        assert!(body["items"].as_array().unwrap().is_empty());
        assert_eq!(node.called("getrawtransaction"), 0);
    }

    #[tokio::test]
    async fn test_multi_utxo_requires_addrs() {
        let err = multi_utxo(State(state(node())), None, Payload(AddrsParams::default()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status, StatusCode::BAD_REQUEST);
    }
}
