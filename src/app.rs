//! Component wiring: build the relay once at startup and hand the event
//! sink to whatever gateway driver hosts it.

use crate::config::Config;
use crate::gateway::{ChatGateway, EventSink, GatewayEvent};
use crate::lifecycle::PairLifecycle;
use crate::provision::{GuildLanguages, GuildProvisioner};
use crate::reaper::IdleReaper;
use crate::registry::PairRegistry;
use crate::router::Router;
use crate::scheduler;
use crate::translator::{TokenProvider, TranslationClient};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The assembled relay: a router loop plus its scheduled jobs.
///
/// Construction is pure wiring; nothing talks to the network until
/// [`Relay::run`].
pub struct Relay {
    config: Arc<Config>,
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    reaper: Arc<IdleReaper>,
    router: Router,
}

impl Relay {
    /// Wire every component against `gateway` and return the relay
    /// together with the sink the gateway driver must push events into.
    pub fn new(config: Config, gateway: Arc<dyn ChatGateway>) -> (Self, EventSink) {
        let config = Arc::new(config);
        let http = reqwest::Client::new();
        let tokens = TokenProvider::new();
        let translator = TranslationClient::new(http.clone(), Arc::clone(&config), Arc::clone(&tokens));

        let registry = Arc::new(PairRegistry::new());
        let languages = GuildLanguages::new();
        let reaper = IdleReaper::new(Arc::clone(&gateway), config.idle_timeout_minutes);
        let lifecycle = Arc::new(PairLifecycle::new(
            Arc::clone(&gateway),
            translator.clone(),
            Arc::clone(&registry),
            Arc::clone(&languages),
        ));
        let provisioner = Arc::new(GuildProvisioner::new(
            Arc::clone(&gateway),
            translator.clone(),
            Arc::clone(&languages),
            Arc::clone(&registry),
        ));

        let (event_tx, event_rx) = mpsc::unbounded_channel::<GatewayEvent>();
        let router = Router::new(
            gateway,
            translator,
            registry,
            lifecycle,
            languages,
            provisioner,
            Arc::clone(&reaper),
            event_rx,
        );

        (
            Self {
                config,
                http,
                tokens,
                reaper,
                router,
            },
            event_tx,
        )
    }

    /// Start the scheduled jobs and run the router loop until the gateway
    /// goes away. A non-resumable disconnect surfaces as the returned
    /// error, which is the caller's cue to shut the process down.
    pub async fn run(self) -> Result<()> {
        let mut scheduler = scheduler::start_jobs(
            Arc::clone(&self.config),
            self.http.clone(),
            Arc::clone(&self.tokens),
            Arc::clone(&self.reaper),
        )
        .await?;

        let result = self.router.run().await;
        scheduler.shutdown().await.ok();
        result
    }
}
