//! Declarative route table.
//!
//! Every HTTP route is declared once here with its method, path, access tier
//! and cache preset. The router is built from this table at startup; nothing
//! registers routes dynamically.

use std::sync::LazyLock;

/// HTTP method of a declared route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Route access tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// No token required
    Public,
    /// Bearer token required
    Protected,
    /// User administration. Public unless `auth.protect_user_admin` is set
    Admin,
}

impl Access {
    /// Whether the authentication guard runs for this tier
    pub fn requires_auth(&self, protect_admin: bool) -> bool {
        match self {
            Access::Public => false,
            Access::Protected => true,
            Access::Admin => protect_admin,
        }
    }
}

/// Freshness preset attached by the cache policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePreset {
    None,
    Short,
    Long,
}

/// Handler a route dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    // status
    Status,
    Sync,
    Peer,
    Version,
    // blocks
    Blocks,
    Block,
    RawBlock,
    BlockIndex,
    // transactions
    Tx,
    Txs,
    RawTx,
    SendTx,
    // addresses
    Address,
    AddressUtxo,
    MultiAddressUtxo,
    MultiAddressTxs,
    AddressBalance,
    AddressTotalReceived,
    AddressTotalSent,
    AddressUnconfirmedBalance,
    // messages / utils
    VerifyMessage,
    EstimateFee,
    // chain extras
    OpReturn,
    PhoneNumber,
    Outstanding,
    // accounts
    Register,
    Login,
    UserAdd,
    UserGet,
    UserUpdate,
    UserDelete,
}

/// One declared route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: HttpMethod,
    /// axum path syntax (`/block/:blockHash`)
    pub path: &'static str,
    pub access: Access,
    pub cache: CachePreset,
    pub endpoint: Endpoint,
}

impl RouteSpec {
    const fn public(method: HttpMethod, path: &'static str, cache: CachePreset, endpoint: Endpoint) -> Self {
        Self {
            method,
            path,
            access: Access::Public,
            cache,
            endpoint,
        }
    }

    const fn protected(
        method: HttpMethod,
        path: &'static str,
        cache: CachePreset,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            method,
            path,
            access: Access::Protected,
            cache,
            endpoint,
        }
    }

    const fn admin(method: HttpMethod, path: &'static str, endpoint: Endpoint) -> Self {
        Self {
            method,
            path,
            access: Access::Admin,
            cache: CachePreset::None,
            endpoint,
        }
    }
}

/// All routes served by the gateway, in declaration order
pub static ROUTE_TABLE: LazyLock<Vec<RouteSpec>> = LazyLock::new(|| {
    use CachePreset::{Long, None as NoCache, Short};
    use Endpoint::*;
    use HttpMethod::*;

    vec![
        // --- Status (public) ---
        RouteSpec::public(Get, "/status", Short, Status),
        RouteSpec::public(Get, "/sync", Short, Sync),
        RouteSpec::public(Get, "/peer", Short, Peer),
        RouteSpec::public(Get, "/version", Short, Version),
        // --- Blocks ---
        RouteSpec::protected(Get, "/blocks", Short, Blocks),
        RouteSpec::protected(Get, "/block/:blockHash", Short, Block),
        RouteSpec::protected(Get, "/rawblock/:blockHash", Long, RawBlock),
        RouteSpec::protected(Get, "/block-index/:height", Short, BlockIndex),
        // --- Transactions ---
        RouteSpec::protected(Get, "/tx/:txid", Short, Tx),
        RouteSpec::protected(Get, "/txs", Short, Txs),
        RouteSpec::protected(Get, "/rawtx/:txid", Long, RawTx),
        RouteSpec::public(Post, "/tx/send", NoCache, SendTx),
        // --- Addresses ---
        RouteSpec::protected(Get, "/addr/:addr", Short, Address),
        RouteSpec::protected(Get, "/addr/:addr/utxo", Short, AddressUtxo),
        RouteSpec::protected(Get, "/addrs/:addrs/utxo", Short, MultiAddressUtxo),
        RouteSpec::protected(Post, "/addrs/utxo", Short, MultiAddressUtxo),
        RouteSpec::protected(Get, "/addrs/:addrs/txs", Short, MultiAddressTxs),
        RouteSpec::protected(Post, "/addrs/txs", Short, MultiAddressTxs),
        RouteSpec::protected(Get, "/addr/:addr/balance", Short, AddressBalance),
        RouteSpec::protected(Get, "/addr/:addr/totalReceived", Short, AddressTotalReceived),
        RouteSpec::protected(Get, "/addr/:addr/totalSent", Short, AddressTotalSent),
        RouteSpec::protected(
            Get,
            "/addr/:addr/unconfirmedBalance",
            Short,
            AddressUnconfirmedBalance,
        ),
        // --- Messages / utils ---
        RouteSpec::protected(Get, "/messages/verify", NoCache, VerifyMessage),
        RouteSpec::protected(Post, "/messages/verify", NoCache, VerifyMessage),
        RouteSpec::protected(Get, "/utils/estimatefee", NoCache, EstimateFee),
        // --- Chain extras ---
        RouteSpec::protected(Get, "/opreturn/:opreturnHash", NoCache, OpReturn),
        RouteSpec::protected(Get, "/phonenumber/:phoneNumber", NoCache, PhoneNumber),
        RouteSpec::protected(Get, "/outstanding", NoCache, Outstanding),
        // --- Accounts ---
        RouteSpec::public(Post, "/user/register", NoCache, Register),
        RouteSpec::public(Post, "/user/login", NoCache, Login),
        RouteSpec::admin(Post, "/user/add", UserAdd),
        RouteSpec::admin(Get, "/user/get", UserGet),
        RouteSpec::admin(Post, "/user/update", UserUpdate),
        RouteSpec::admin(Put, "/user/update", UserUpdate),
        RouteSpec::admin(Delete, "/user/delete", UserDelete),
    ]
});

/// Look up the declared route for a method and path pattern
pub fn find_route(method: HttpMethod, path: &str) -> Option<&'static RouteSpec> {
    ROUTE_TABLE
        .iter()
        .find(|r| r.method == method && r.path == path)
}

/// Distinct path patterns in declaration order
pub fn declared_paths() -> Vec<&'static str> {
    let mut paths: Vec<&'static str> = Vec::new();
    for route in ROUTE_TABLE.iter() {
        if !paths.contains(&route.path) {
            paths.push(route.path);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_duplicate_routes() {
        let mut seen = HashSet::new();
        for route in ROUTE_TABLE.iter() {
            assert!(
                seen.insert((route.method, route.path)),
                "duplicate route {:?} {}",
                route.method,
                route.path
            );
        }
    }

    #[test]
    fn test_status_routes_public() {
        for path in ["/status", "/sync", "/peer", "/version"] {
            let route = find_route(HttpMethod::Get, path).unwrap();
            assert_eq!(route.access, Access::Public, "{path}");
        }
    }

    #[test]
    fn test_broadcast_public_reads_protected() {
        assert_eq!(find_route(HttpMethod::Post, "/tx/send").unwrap().access, Access::Public);
        assert_eq!(find_route(HttpMethod::Get, "/blocks").unwrap().access, Access::Protected);
        assert_eq!(find_route(HttpMethod::Get, "/tx/:txid").unwrap().access, Access::Protected);
    }

    #[test]
    fn test_raw_routes_long_cache() {
        assert_eq!(find_route(HttpMethod::Get, "/rawblock/:blockHash").unwrap().cache, CachePreset::Long);
        assert_eq!(find_route(HttpMethod::Get, "/rawtx/:txid").unwrap().cache, CachePreset::Long);
        assert_eq!(find_route(HttpMethod::Get, "/block/:blockHash").unwrap().cache, CachePreset::Short);
    }

    #[test]
    fn test_chain_lookups_uncached() {
        for path in ["/opreturn/:opreturnHash", "/phonenumber/:phoneNumber", "/outstanding"] {
            assert_eq!(find_route(HttpMethod::Get, path).unwrap().cache, CachePreset::None);
        }
    }

    #[test]
    fn test_admin_tier() {
        let route = find_route(HttpMethod::Delete, "/user/delete").unwrap();
        assert!(!route.access.requires_auth(false));
        assert!(route.access.requires_auth(true));
        assert!(!Access::Public.requires_auth(true));
    }

    #[test]
    fn test_declared_paths_are_unique() {
        let paths = declared_paths();
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(paths.len(), unique.len());
        assert!(paths.contains(&"/user/update"));
    }
}
