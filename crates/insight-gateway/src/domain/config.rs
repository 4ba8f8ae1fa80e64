//! Gateway configuration with validation.
//!
//! Every section defaults to the values the public Insight deployment used;
//! [`GatewayConfig::from_env`] overlays the process environment.

use crate::domain::network::Network;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Cache-Control annotation
    pub cache: CacheConfig,
    /// CORS headers
    pub cors: CorsConfig,
    /// Session tokens and guard behavior
    pub auth: AuthConfig,
    /// Full node RPC endpoint
    pub rpc: RpcConfig,
    /// External phone-number lookup endpoint
    pub phone: PhoneConfig,
    /// Chain information
    pub chain: ChainConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// Node event source feeding the fan-out
    pub events: NodeEventsConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::InvalidRateLimit(
                "window cannot be 0".into(),
            ));
        }

        if self.rpc.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("rpc timeout cannot be 0".into()));
        }

        if !(self.rpc.url.starts_with("http://") || self.rpc.url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "rpc url must be http(s): {}",
                self.rpc.url
            )));
        }

        if self.events.enabled && self.events.poll_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "event poll interval cannot be 0".into(),
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigError::Invalid("event channel capacity cannot be 0".into()));
        }

        if self.limits.max_block_list == 0 {
            return Err(ConfigError::Invalid("max_block_list cannot be 0".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Build configuration from defaults plus environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (env in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secret) = lookup("JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Some(host) = lookup("INSIGHT_HOST") {
            config.http.host = parse_env("INSIGHT_HOST", &host)?;
        }
        if let Some(port) = lookup("INSIGHT_PORT") {
            config.http.port = parse_env("INSIGHT_PORT", &port)?;
        }
        if let Some(url) = lookup("BITCOIND_RPC_URL") {
            config.rpc.url = url;
        }
        if let Some(user) = lookup("BITCOIND_RPC_USER") {
            config.rpc.user = user;
        }
        if let Some(password) = lookup("BITCOIND_RPC_PASSWORD") {
            config.rpc.password = password;
        }
        if let Some(secs) = lookup("BITCOIND_RPC_TIMEOUT_SECS") {
            config.rpc.timeout =
                Duration::from_secs(parse_env("BITCOIND_RPC_TIMEOUT_SECS", &secs)?);
        }
        if let Some(endpoint) = lookup("PHONENUMBERSOCKET") {
            config.phone.endpoint = Some(endpoint);
        }
        if let Some(flag) = lookup("INSIGHT_ENABLE_CACHE") {
            config.cache.enabled = parse_flag(&flag);
        }
        if let Some(secs) = lookup("INSIGHT_CACHE_SHORT_SECONDS") {
            config.cache.short_seconds = parse_env("INSIGHT_CACHE_SHORT_SECONDS", &secs)?;
        }
        if let Some(secs) = lookup("INSIGHT_CACHE_LONG_SECONDS") {
            config.cache.long_seconds = parse_env("INSIGHT_CACHE_LONG_SECONDS", &secs)?;
        }
        if let Some(flag) = lookup("INSIGHT_DISABLE_RATE_LIMITER") {
            config.rate_limit.enabled = !parse_flag(&flag);
        }
        if let Some(flag) = lookup("INSIGHT_DISABLE_EVENTS") {
            config.events.enabled = !parse_flag(&flag);
        }
        if let Some(millis) = lookup("INSIGHT_EVENT_POLL_MS") {
            config.events.poll_interval =
                Duration::from_millis(parse_env("INSIGHT_EVENT_POLL_MS", &millis)?);
        }
        if let Some(network) = lookup("INSIGHT_NETWORK") {
            config.chain.network = network
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("unknown network: {}", network)))?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has invalid value {:?}", key, value)))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3001)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3001,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Requests per window for ordinary clients
    pub limit: u32,
    /// Requests per window for whitelisted clients
    pub whitelist_limit: u32,
    /// Requests per window for blacklisted clients (0 = always rejected)
    pub blacklist_limit: u32,
    /// Counter reset window
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Clients with the raised limit
    pub whitelist: Vec<IpAddr>,
    /// Clients with the lowered limit
    pub blacklist: Vec<IpAddr>,
    /// Header carrying the client address when behind a trusted proxy
    pub client_ip_header: String,
    /// HTTP status used for rejections
    pub rejection_status: u16,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 3600 * 3,
            whitelist_limit: 3600 * 3 * 10,
            blacklist_limit: 0,
            window: Duration::from_secs(3 * 60 * 60),
            whitelist: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            blacklist: Vec::new(),
            client_ip_header: "cf-connecting-ip".to_string(),
            rejection_status: 429,
        }
    }
}

/// Cache-Control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Attach Cache-Control headers at all
    pub enabled: bool,
    /// max-age for short-lived responses
    pub short_seconds: u64,
    /// max-age for long-lived responses
    pub long_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            short_seconds: 30,
            long_seconds: 86400,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Access-Control-Allow-Origin value
    pub allow_origin: String,
    /// Access-Control-Allow-Methods value
    pub allow_methods: String,
    /// Access-Control-Allow-Headers value
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, HEAD, PUT, POST, OPTIONS".to_string(),
            allow_headers: "Origin, X-Requested-With, Content-Type, Accept, Content-Length, Cache-Control, cf-connecting-ip".to_string(),
        }
    }
}

/// Session token and guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Process-wide signing secret
    pub jwt_secret: String,
    /// Token validity window
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    /// Numeric `status` field of the unauthorized envelope (HTTP status is always 401)
    pub unauthorized_body_status: u16,
    /// Report "Incorrect username." / "Incorrect password." instead of one message
    pub distinguish_login_failures: bool,
    /// Put the /user add/get/update/delete routes behind the guard
    pub protect_user_admin: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            unauthorized_body_status: 401,
            distinguish_login_failures: false,
            protect_user_admin: false,
        }
    }
}

/// Full node RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint URL
    pub url: String,
    /// Basic auth user
    pub user: String,
    /// Basic auth password
    pub password: String,
    /// Upper bound for a single call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// HTTP status surfaced for generic RPC failures
    pub failure_status: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332".to_string(),
            user: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
            failure_status: 404,
        }
    }
}

/// Phone-number lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// Base URL; the phone number is appended as a path segment
    pub endpoint: Option<String>,
    /// Upper bound for a single lookup
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Chain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Network used for address rendering and validation
    pub network: Network,
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Default number of blocks returned by /blocks
    pub default_block_list: usize,
    /// Upper bound for /blocks?limit
    pub max_block_list: usize,
    /// Upper bound for the addrs/txs page size
    pub max_address_page: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_block_list: 10,
            max_block_list: 200,
            max_address_page: 50,
        }
    }
}

/// Node event source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeEventsConfig {
    /// Poll the node for new blocks and mempool transactions
    pub enabled: bool,
    /// Delay between polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Buffered notifications between the source and the listener
    pub channel_capacity: usize,
}

impl Default for NodeEventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(2),
            channel_capacity: 1024,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No signing secret configured
    #[error("JWT_SECRET must be set")]
    MissingSecret,
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime-style Duration serialization ("30s", "500ms", "3h")
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .map_err(|_| "invalid minutes")
        } else if let Some(hours) = s.strip_suffix('h') {
            hours
                .trim()
                .parse::<u64>()
                .map(|h| Duration::from_secs(h.saturating_mul(3600)))
                .map_err(|_| "invalid hours")
        } else if let Some(days) = s.strip_suffix('d') {
            days.trim()
                .parse::<u64>()
                .map(|d| Duration::from_secs(d.saturating_mul(86400)))
                .map_err(|_| "invalid days")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
