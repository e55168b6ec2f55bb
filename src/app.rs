//! Application wiring.
//!
//! Builds every component from configuration and runs the scheduler loop
//! and web server until shutdown.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::delivery::{build_sink, DeliverySink};
use crate::feed::{FeedFetcher, HttpFeedFetcher};
use crate::ledger::DedupLedger;
use crate::scheduler::PollScheduler;
use crate::store::{open_store, Store};
use crate::subscription::{SubscriptionRegistry, SubscriptionService};
use crate::web::{AppState, WebServer};
use crate::Result;

/// A fully wired newswire instance.
pub struct Application {
    config: Config,
    store: Arc<dyn Store>,
    service: SubscriptionService,
    ledger: Arc<DedupLedger>,
    scheduler: Arc<PollScheduler>,
}

impl Application {
    /// Build the application from configuration.
    pub async fn build(config: Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage).await?;
        let fetcher = Arc::new(HttpFeedFetcher::new(&config.fetcher)?);
        let sink = build_sink(&config.delivery)?;
        Self::from_parts(config, store, fetcher, sink).await
    }

    /// Build the application around an existing store, fetcher and sink.
    pub async fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn FeedFetcher>,
        sink: Arc<dyn DeliverySink>,
    ) -> Result<Self> {
        let catalog = Arc::new(Catalog::from_entries(&config.catalog));
        let registry = Arc::new(SubscriptionRegistry::load(catalog, Arc::clone(&store)).await?);
        let ledger = Arc::new(
            DedupLedger::load(Arc::clone(&store), config.ledger.max_ids_per_channel).await?,
        );
        let scheduler = Arc::new(PollScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            fetcher,
            sink,
            &config.scheduler,
        ));

        info!(
            "Loaded {} channel(s) from {} store",
            registry.all_channels().await.len(),
            store.backend_name()
        );

        Ok(Self {
            config,
            store,
            service: SubscriptionService::new(registry),
            ledger,
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Command interface over subscriptions.
    pub fn service(&self) -> &SubscriptionService {
        &self.service
    }

    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    /// Shared state for the web API.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(
            self.service.clone(),
            Arc::clone(&self.scheduler),
        ))
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the scheduler and web server until `shutdown` resolves, then stop
    /// both. Returns once any in-flight cycle, scheduled or triggered, has
    /// finished.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let server = if self.config.web.enabled {
            Some(WebServer::new(&self.config.web, self.app_state())?)
        } else {
            info!("Web server disabled");
            None
        };

        let scheduler_task = self.scheduler.start();

        let (stop_web, web_stopped) = oneshot::channel::<()>();
        let web_task = server.map(|server| {
            tokio::spawn(async move {
                let shutdown = async move {
                    let _ = web_stopped.await;
                };
                if let Err(e) = server.run(shutdown).await {
                    error!("Web server error: {}", e);
                }
            })
        });

        shutdown.await;
        info!("Shutting down");

        let _ = stop_web.send(());
        self.scheduler.shutdown().await;

        if let Err(e) = scheduler_task.await {
            error!("Scheduler task failed: {}", e);
        }
        if let Some(task) = web_task {
            if let Err(e) = task.await {
                error!("Web server task failed: {}", e);
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}
