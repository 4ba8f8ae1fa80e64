//! Gateway service: owns the collaborators, the middleware stack and the
//! event fan-out, and runs the HTTP server.

use crate::auth::{CredentialStore, InMemoryCredentialStore, SessionIssuer};
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::events::{EventFanOut, NodeEvent, NodeEventListener, NodePoller};
use crate::handlers::AppState;
use crate::middleware::{rate_limit::cleanup_task, GatewayMetrics, MiddlewareStack};
use crate::ports::{AuthHooks, LoggingAuthHooks, SystemTimeSource, TimeSource};
use crate::router::build_router;
use crate::rpc::{HttpNodeRpc, HttpPhoneDirectory, NodeRpc, PhoneDirectory};
use axum::Router;
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How often stale rate-limit windows are swept
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// External collaborators the gateway talks to
#[derive(Clone)]
pub struct Collaborators {
    pub rpc: Arc<dyn NodeRpc>,
    pub phone: Arc<dyn PhoneDirectory>,
    pub store: Arc<dyn CredentialStore>,
    pub hooks: Arc<dyn AuthHooks>,
    pub clock: Arc<dyn TimeSource>,
}

impl Collaborators {
    /// HTTP node bridge, HTTP phone directory, in-memory credential store
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            rpc: Arc::new(HttpNodeRpc::from_config(&config.rpc)),
            phone: Arc::new(HttpPhoneDirectory::from_config(&config.phone)),
            store: Arc::new(InMemoryCredentialStore::new()),
            hooks: Arc::new(LoggingAuthHooks),
            clock: Arc::new(SystemTimeSource),
        }
    }
}

/// Insight gateway service
pub struct GatewayService {
    config: Arc<GatewayConfig>,
    state: AppState,
    stack: MiddlewareStack,
    fanout: Arc<EventFanOut>,
    node_events: mpsc::Sender<NodeEvent>,
    listener: Mutex<Option<NodeEventListener>>,
}

impl GatewayService {
    pub fn new(config: GatewayConfig, collaborators: Collaborators) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let config = Arc::new(config);
        let metrics = Arc::new(GatewayMetrics::new());
        let issuer = Arc::new(SessionIssuer::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl,
            collaborators.clock,
        ));
        let stack = MiddlewareStack::from_config(
            &config,
            Arc::clone(&issuer),
            collaborators.hooks,
            Arc::clone(&metrics),
        );
        let fanout = Arc::new(EventFanOut::new(config.chain.network).with_metrics(metrics));
        let (node_events, listener) =
            NodeEventListener::channel(Arc::clone(&fanout), config.events.channel_capacity);

        let state = AppState {
            rpc: collaborators.rpc,
            phone: collaborators.phone,
            store: collaborators.store,
            issuer,
            config: Arc::clone(&config),
        };

        Ok(Self {
            config,
            state,
            stack,
            fanout,
            node_events,
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Complete request pipeline
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.stack)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.stack.metrics()
    }

    /// Event fan-out manager; hand it to whatever publishes node events
    pub fn fanout(&self) -> Arc<EventFanOut> {
        Arc::clone(&self.fanout)
    }

    /// Sender for raw node notifications; they reach subscribers once
    /// [`start_events`](Self::start_events) has run
    pub fn node_events(&self) -> mpsc::Sender<NodeEvent> {
        self.node_events.clone()
    }

    /// Spawn the node event listener and, when enabled, the node poller.
    /// Only the first call starts anything.
    pub fn start_events(&self) -> Vec<JoinHandle<()>> {
        let Some(listener) = self.listener.lock().take() else {
            debug!("node event tasks already started");
            return Vec::new();
        };

        let mut tasks = vec![listener.spawn()];
        if self.config.events.enabled {
            let poller = NodePoller::new(
                Arc::clone(&self.state.rpc),
                self.node_events(),
                self.config.events.poll_interval,
            );
            tasks.push(poller.spawn());
        }
        tasks
    }

    pub fn issuer(&self) -> Arc<SessionIssuer> {
        Arc::clone(&self.state.issuer)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.config.http_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        info!(addr = %local, network = %self.config.chain.network, "insight gateway listening");

        let cleanup = tokio::spawn(cleanup_task(
            self.stack.rate_limit_state(),
            RATE_LIMIT_CLEANUP_INTERVAL,
            self.config.rate_limit.window,
        ));
        let event_tasks = self.start_events();

        let result = axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Serve(e.to_string()));

        cleanup.abort();
        for task in event_tasks {
            task.abort();
        }
        info!("insight gateway stopped");
        result
    }
}
