//! `FillmathServer` builder and server loop.
//!
//! This is the entry point for running a Fillmath server. It ties the
//! layers together: transport → protocol → gateway checks → engine.

use std::sync::Arc;

use fillmath_identity::{GuestIdentity, IdentityProvider};
use fillmath_protocol::{Codec, JsonCodec};
use fillmath_room::{spawn_engine, EngineConfig, EngineHandle};
use fillmath_transport::{Transport, WebSocketTransport};

use crate::flight::SingleFlight;
use crate::handler::handle_connection;
use crate::rate_limit::RateLimiter;
use crate::{FillmathError, RateLimitConfig, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Room state is not here: it belongs to the engine actor, reached through
/// `engine`. The limiter and the single-flight set are the only structures
/// connections share directly.
pub(crate) struct ServerState<I: IdentityProvider, C: Codec> {
    pub(crate) engine: EngineHandle,
    pub(crate) identity: I,
    pub(crate) codec: C,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) flights: SingleFlight,
}

/// Builder for configuring and starting a Fillmath server.
///
/// # Example
///
/// ```rust,no_run
/// use fillmath::prelude::*;
///
/// # async fn run() -> Result<(), FillmathError> {
/// let server = FillmathServer::<GuestIdentity>::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct FillmathServerBuilder {
    config: ServerConfig,
}

impl FillmathServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets clock, scoring, and action-delay settings for the engine.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.config.engine = config;
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Binds the listener and starts the engine, accepting guests.
    pub async fn build(self) -> Result<FillmathServer<GuestIdentity>, FillmathError> {
        self.build_with_identity(GuestIdentity::new()).await
    }

    /// Binds the listener and starts the engine with a custom identity
    /// provider.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build_with_identity<I: IdentityProvider>(
        self,
        identity: I,
    ) -> Result<FillmathServer<I>, FillmathError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let limiter = Arc::new(RateLimiter::new(self.config.rate_limit));
        limiter.spawn_sweeper();

        let state = Arc::new(ServerState {
            engine: spawn_engine(self.config.engine),
            identity,
            codec: JsonCodec,
            limiter,
            flights: SingleFlight::new(),
        });

        Ok(FillmathServer { transport, state })
    }
}

impl Default for FillmathServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Fillmath server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FillmathServer<I: IdentityProvider, C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<I, C>>,
}

impl<I, C> FillmathServer<I, C>
where
    I: IdentityProvider,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> FillmathServerBuilder {
        FillmathServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the session engine, for inspection or shutdown.
    pub fn engine(&self) -> EngineHandle {
        self.state.engine.clone()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task per accepted connection. Runs until the engine
    /// stops.
    pub async fn run(mut self) -> Result<(), FillmathError> {
        tracing::info!("Fillmath server running");

        while !self.state.engine.is_closed() {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        tracing::info!("session engine stopped, no longer accepting");
        Ok(())
    }
}
