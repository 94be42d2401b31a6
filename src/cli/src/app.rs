//! Shared command context: configuration, caller identity and the entity store.

use anyhow::{Context, Result};
use std::sync::Arc;

use cms_core::access::{EntityQueries, RequestContext};
use cms_core::config::Config;
use cms_core::domain::EventProcessor;
use cms_core::store::{self, EntityStore};

/// Everything a command needs, built once per invocation.
pub struct App {
    pub config: Config,
    pub caller: RequestContext,
}

impl App {
    /// Load configuration from `path` (or the environment) and resolve the caller.
    pub fn bootstrap(path: Option<&str>, user: &str) -> Result<Self> {
        let config = match path {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?,
            None => Config::load().context("Failed to load configuration from environment")?,
        };

        let caller = RequestContext::for_user(user, &config.access);
        Ok(Self { config, caller })
    }

    /// Connect to the configured store.
    pub async fn store(&self) -> Result<Arc<dyn EntityStore>> {
        store::connect(&self.config.store)
            .await
            .context("Failed to open entity store")
    }

    pub async fn processor(&self) -> Result<EventProcessor> {
        Ok(EventProcessor::new(self.store().await?))
    }

    pub async fn queries(&self) -> Result<EntityQueries> {
        Ok(EntityQueries::new(self.store().await?))
    }
}
