//! HTTP router assembled from the declarative route table.
//!
//! Each [`RouteSpec`] becomes one method route wrapped in its cache layer
//! and, when its access level requires it, the auth guard. Routes sharing a
//! path are merged into one method router whose fallback is the 404
//! envelope, so a known path with an undeclared method is "not found" too.

use crate::domain::config::GatewayConfig;
use crate::domain::error::ApiError;
use crate::domain::routes::{Endpoint, HttpMethod, RouteSpec, ROUTE_TABLE};
use crate::handlers::{addresses, blocks, chain, messages, status, transactions, users, AppState};
use crate::middleware::{panic_response, CacheLayer, CachePolicy, MiddlewareStack};
use axum::{
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use std::collections::BTreeMap;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer};
use tracing::debug;

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

/// Handler for one endpoint, bound to one method
fn endpoint_route(method: HttpMethod, endpoint: Endpoint) -> MethodRouter<AppState> {
    let filter = method_filter(method);
    match endpoint {
        Endpoint::Status => on(filter, status::status),
        Endpoint::Sync => on(filter, status::sync),
        Endpoint::Peer => on(filter, status::peer),
        Endpoint::Version => on(filter, status::version),
        Endpoint::Blocks => on(filter, blocks::list),
        Endpoint::Block => on(filter, blocks::block),
        Endpoint::RawBlock => on(filter, blocks::raw_block),
        Endpoint::BlockIndex => on(filter, blocks::block_index),
        Endpoint::Tx => on(filter, transactions::tx),
        Endpoint::Txs => on(filter, transactions::txs),
        Endpoint::RawTx => on(filter, transactions::raw_tx),
        Endpoint::SendTx => on(filter, transactions::send),
        Endpoint::Address => on(filter, addresses::address),
        Endpoint::AddressUtxo => on(filter, addresses::utxo),
        Endpoint::MultiAddressUtxo => on(filter, addresses::multi_utxo),
        Endpoint::MultiAddressTxs => on(filter, addresses::multi_txs),
        Endpoint::AddressBalance => on(filter, addresses::balance),
        Endpoint::AddressTotalReceived => on(filter, addresses::total_received),
        Endpoint::AddressTotalSent => on(filter, addresses::total_sent),
        Endpoint::AddressUnconfirmedBalance => on(filter, addresses::unconfirmed_balance),
        Endpoint::VerifyMessage => on(filter, messages::verify),
        Endpoint::EstimateFee => on(filter, messages::estimate_fee),
        Endpoint::OpReturn => on(filter, chain::op_return),
        Endpoint::PhoneNumber => on(filter, chain::phone_number),
        Endpoint::Outstanding => on(filter, chain::outstanding),
        Endpoint::Register => on(filter, users::register),
        Endpoint::Login => on(filter, users::login),
        Endpoint::UserAdd => on(filter, users::add_user),
        Endpoint::UserGet => on(filter, users::get_users),
        Endpoint::UserUpdate => on(filter, users::update_user),
        Endpoint::UserDelete => on(filter, users::delete_user),
    }
}

/// One table entry with its per-route layers
fn layered_route(
    entry: &RouteSpec,
    config: &GatewayConfig,
    stack: &MiddlewareStack,
) -> MethodRouter<AppState> {
    let route = endpoint_route(entry.method, entry.endpoint)
        .route_layer(CacheLayer::new(CachePolicy::new(&config.cache, entry.cache)));

    if entry.access.requires_auth(config.auth.protect_user_admin) {
        route.route_layer(stack.auth.clone())
    } else {
        route
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

/// Route table without the global stages
pub fn routes(config: &GatewayConfig, stack: &MiddlewareStack) -> Router<AppState> {
    let mut by_path: BTreeMap<&'static str, MethodRouter<AppState>> = BTreeMap::new();
    for entry in ROUTE_TABLE.iter() {
        let route = layered_route(entry, config, stack);
        let merged = match by_path.remove(entry.path) {
            Some(existing) => existing.merge(route),
            None => route,
        };
        by_path.insert(entry.path, merged);
    }

    debug!(paths = by_path.len(), routes = ROUTE_TABLE.len(), "route table loaded");
    let mut router = Router::new();
    for (path, method_router) in by_path {
        router = router.route(path, method_router.fallback(not_found));
    }
    router.fallback(not_found)
}

/// Full pipeline, outermost stage last:
/// catch-panic, rate limit, access log, compression, CORS, shaping, routes
pub fn build_router(state: AppState, stack: &MiddlewareStack) -> Router {
    let config = state.config.clone();
    routes(&config, stack)
        .with_state(state)
        .layer(stack.shaping)
        .layer(stack.cors.clone())
        .layer(CompressionLayer::new())
        .layer(stack.access_log.clone())
        .layer(stack.rate_limit.clone())
        .layer(CatchPanicLayer::custom(panic_response))
}
