//! Database schema bootstrap.

use anyhow::{bail, Context, Result};

use cms_core::config::StoreBackend;
use cms_core::store::PostgresStore;

use crate::app::App;
use crate::output;

pub async fn execute(app: &App) -> Result<()> {
    if app.config.store.backend != StoreBackend::Postgres {
        bail!("The schema command requires store.backend = \"postgres\"");
    }

    let store = PostgresStore::connect(&app.config.store)
        .await
        .context("Failed to connect to PostgreSQL")?;
    store.ensure_schema().await.context("Failed to create tables")?;

    output::print_success("Schema is up to date");
    Ok(())
}
