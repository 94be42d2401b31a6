//! Entity read and admin commands.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use cms_core::access::EntityView;

use crate::app::App;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
pub struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Latest Published")]
    latest_published_version: String,
    #[tabled(rename = "Payload")]
    payload: String,
}

impl From<&EntityView> for EntityRow {
    fn from(view: &EntityView) -> Self {
        Self {
            id: view.id.clone(),
            latest_published_version: view
                .latest_published_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            payload: view.payload.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub async fn get(id: &str, app: &App, format: OutputFormat) -> Result<()> {
    let view = app.queries().await?.get_by_id(&app.caller, id).await?;

    match format {
        OutputFormat::Table => {
            let row = EntityRow::from(&view);
            output::print_header(&format!("Entity: {}", row.id));
            output::print_detail("Latest Published", &row.latest_published_version);
            output::print_detail("Payload", &row.payload);
            Ok(())
        }
        _ => output::print_item(&view, format),
    }
}

pub async fn list(app: &App, format: OutputFormat) -> Result<()> {
    let views = app.queries().await?.list(&app.caller).await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<EntityRow> = views.iter().map(EntityRow::from).collect();
            output::print_list(&rows, format)
        }
        _ => output::print_item(&views, format),
    }
}

pub async fn disable(id: &str, app: &App, format: OutputFormat) -> Result<()> {
    app.queries().await?.disable(&app.caller, id).await?;

    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Entity {} disabled", id));
            Ok(())
        }
        _ => output::print_item(&serde_json::json!({ "id": id, "disabled": true }), format),
    }
}
