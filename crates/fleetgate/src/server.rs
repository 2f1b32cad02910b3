//! `GatewayServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → gateway (router,
//! sessions, accounts) → engine, plus publication in the name registry.

use std::future::{Future, pending};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fleetgate_account::{AccountPersister, AccountStore, JsonFileAccountPersister};
use fleetgate_protocol::JsonCodec;
use fleetgate_transport::{Transport, TransportError, WebSocketTransport};
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::{
    Engine, Gateway, GatewayConfig, GatewayError, InMemoryRegistry, REGISTRATION_NAME, Registry,
};

/// Builder for a [`GatewayServer`].
///
/// ```rust,ignore
/// let server = GatewayServerBuilder::new()
///     .config(config)
///     .build(Arc::new(MyEngine::new()))
///     .await?;
/// server.run().await
/// ```
pub struct GatewayServerBuilder {
    config: GatewayConfig,
    persister: Option<Arc<dyn AccountPersister>>,
    registry: Option<Arc<dyn Registry>>,
}

impl GatewayServerBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            persister: None,
            registry: None,
        }
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Where accounts are loaded from and saved to. Defaults to
    /// `<home_dir>/data/accounts.json`.
    pub fn persister(mut self, persister: Arc<dyn AccountPersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Where the server publishes its address. Defaults to a fresh
    /// [`InMemoryRegistry`].
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Loads accounts and binds the listener.
    ///
    /// # Errors
    /// [`GatewayError::Persistence`] if accounts cannot be loaded or the
    /// bootstrap account cannot be saved, [`GatewayError::Transport`] if
    /// the listen address cannot be bound.
    pub async fn build<E: Engine>(
        self,
        engine: Arc<E>,
    ) -> Result<GatewayServer<E>, GatewayError> {
        let persister = self
            .persister
            .unwrap_or_else(|| Arc::new(JsonFileAccountPersister::new(&self.config.home_dir)));
        let accounts = AccountStore::load(persister).await?;

        let bind_addr = self.config.registry.socket_addr();
        let transport = WebSocketTransport::bind(&bind_addr).await?;
        let addr = transport
            .local_addr()
            .map_err(|source| TransportError::BindFailed {
                addr: bind_addr,
                source,
            })?;

        let gateway = Arc::new(Gateway::new(engine, accounts, self.config.sweep_config()));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(InMemoryRegistry::new()));

        Ok(GatewayServer {
            transport,
            addr,
            gateway,
            registry,
            codec: JsonCodec,
            handshake_timeout: self.config.handshake_timeout(),
        })
    }
}

impl Default for GatewayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, not yet running gateway server.
pub struct GatewayServer<E: Engine> {
    transport: WebSocketTransport,
    addr: SocketAddr,
    gateway: Arc<Gateway<E>>,
    registry: Arc<dyn Registry>,
    codec: JsonCodec,
    handshake_timeout: Duration,
}

impl<E: Engine> GatewayServer<E> {
    /// The address the listener actually bound, with any port 0 resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn gateway(&self) -> &Arc<Gateway<E>> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), GatewayError> {
        self.run_until(pending()).await
    }

    /// Starts the gateway, publishes the listen address under
    /// [`REGISTRATION_NAME`] and accepts connections until `shutdown`
    /// resolves. Then closes every connection, unpublishes and terminates
    /// the gateway.
    ///
    /// # Errors
    /// [`GatewayError::Registry`] if publishing fails; the gateway is
    /// terminated again before returning.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), GatewayError> {
        self.gateway.start().await;

        let addr = self.addr;
        if let Err(e) = self.registry.bind(REGISTRATION_NAME, addr) {
            tracing::error!(error = %e, "could not publish gateway in registry");
            self.gateway.terminate().await;
            return Err(e.into());
        }
        tracing::info!(%addr, name = REGISTRATION_NAME, "gateway server running");

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let gateway = Arc::clone(&self.gateway);
                        connections.spawn(handle_connection(
                            incoming,
                            self.handshake_timeout,
                            gateway,
                            self.codec,
                        ));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(open = connections.len(), "gateway server shutting down");
        connections.shutdown().await;
        if let Err(e) = self.registry.unbind(REGISTRATION_NAME) {
            tracing::warn!(error = %e, "could not unpublish gateway");
        }
        self.gateway.terminate().await;
        Ok(())
    }
}
