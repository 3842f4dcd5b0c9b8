//! The bundle that owns the eventing machinery.

use std::sync::Arc;

use rusonos_model::{Player, PlayerRegistry};
use rusonos_upnp::{Service, SoapClient};

use crate::config::EventConfig;
use crate::error::Result;
use crate::event::EventHandler;
use crate::registry::SubscriptionRegistry;
use crate::server::EventServer;
use crate::subscription::{Subscription, UnsubscribeOutcome};

/// Owner of the subscription registry and the event server.
///
/// Everything that was process-global in older Sonos libraries lives here
/// as plain owned state: the shared HTTP session, the configuration, the
/// SID directory and the callback server. Construct one per application
/// (the top-level `rusonos` handle does this) and every instance is fully
/// isolated from every other.
pub struct EventSystem {
    soap: SoapClient,
    config: EventConfig,
    registry: Arc<SubscriptionRegistry>,
    server: Arc<EventServer>,
}

impl EventSystem {
    /// Create an event system with default configuration.
    pub fn new(soap: SoapClient, players: Arc<PlayerRegistry>) -> Self {
        // The default config always validates.
        Self::with_config(soap, players, EventConfig::default())
            .unwrap_or_else(|e| unreachable!("default EventConfig rejected: {e}"))
    }

    /// Create an event system with the given configuration.
    pub fn with_config(
        soap: SoapClient,
        players: Arc<PlayerRegistry>,
        config: EventConfig,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(SubscriptionRegistry::new());
        let server = Arc::new(EventServer::new(registry.clone(), players));
        Ok(Self {
            soap,
            config,
            registry,
            server,
        })
    }

    /// The SID directory, shared with the event server.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// The callback server.
    pub fn server(&self) -> &Arc<EventServer> {
        &self.server
    }

    /// Create a subscription without establishing it.
    ///
    /// The returned subscription is in the new state; call
    /// [`Subscription::subscribe`] to bring it live. Most callers want
    /// [`EventSystem::subscribe`] instead.
    pub fn new_subscription(
        &self,
        player: Player,
        service: Service,
        handler: EventHandler,
    ) -> Subscription {
        Subscription::new(
            self.soap.clone(),
            self.config.clone(),
            self.server.clone(),
            self.registry.clone(),
            player,
            service,
            handler,
        )
    }

    /// Subscribe `handler` to `service` events from `player`.
    pub async fn subscribe(
        &self,
        player: &Player,
        service: Service,
        handler: EventHandler,
        auto_renew: bool,
    ) -> Result<Subscription> {
        let subscription = self.new_subscription(player.clone(), service, handler);
        subscription.subscribe(auto_renew).await?;
        Ok(subscription)
    }

    /// All live subscriptions for one player.
    pub fn list_for_player(&self, player: &Player) -> Vec<Subscription> {
        self.registry.list_for_player(player)
    }

    /// Best-effort teardown of every live subscription.
    pub async fn unsubscribe_all(&self) -> Vec<UnsubscribeOutcome> {
        self.registry.unsubscribe_all().await
    }

    /// Drain the registry and stop the event server.
    pub async fn shutdown(&self) {
        self.unsubscribe_all().await;
        self.server.shutdown().await;
    }
}
