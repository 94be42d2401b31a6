//! Event ingestion.
//!
//! Reads a JSON array of lifecycle events and applies them in order.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::io::Read;
use tabled::Tabled;

use cms_core::access::EntityQueries;
use cms_core::domain::{BatchReport, CmsEvent};

use super::entity::EntityRow;
use crate::app::App;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct IngestArgs {
    /// JSON file holding an array of events (`-` reads stdin)
    pub file: String,

    /// List visible entities once the batch is applied
    #[arg(long)]
    pub show: bool,
}

#[derive(Serialize, Tabled)]
struct FailureRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Type")]
    event_type: String,
    #[tabled(rename = "Entity")]
    entity_id: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn read_events(file: &str) -> Result<Vec<CmsEvent>> {
    let content = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read events from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read event file: {}", file))?
    };

    serde_json::from_str(&content).context("Failed to parse events; expected a JSON array")
}

fn print_report(report: &BatchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let summary = format!(
                "Processed {} events: {} applied, {} ignored, {} failed",
                report.total(),
                report.applied,
                report.ignored,
                report.failures.len()
            );
            if report.is_clean() {
                output::print_success(&summary);
                return Ok(());
            }
            output::print_warning(&summary);

            let rows: Vec<FailureRow> = report
                .failures
                .iter()
                .map(|f| FailureRow {
                    index: f.index,
                    event_type: f.event_type.clone(),
                    entity_id: f.entity_id.clone(),
                    code: f.code.to_string(),
                    message: f.message.clone(),
                })
                .collect();
            output::print_list(&rows, format)
        }
        _ => output::print_item(report, format),
    }
}

pub async fn execute(args: IngestArgs, app: &App, format: OutputFormat) -> Result<()> {
    let events = read_events(&args.file)?;
    let processor = app.processor().await?;

    let report = processor.process_batch(&events).await;
    print_report(&report, format)?;

    if args.show {
        let queries = EntityQueries::new(processor.store().clone());
        let views = queries.list(&app.caller).await?;
        if matches!(format, OutputFormat::Table) {
            output::print_header(&format!("Entities visible to {}", app.caller.username));
        }
        let rows: Vec<EntityRow> = views.iter().map(EntityRow::from).collect();
        output::print_list(&rows, format)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_core::domain::EventFailure;
    use cms_core::ErrorCode;
    use std::io::Write;

    fn report_with_failure() -> BatchReport {
        BatchReport {
            applied: 1,
            ignored: 0,
            failures: vec![EventFailure {
                index: 1,
                event_type: "publish".to_string(),
                entity_id: "doc".to_string(),
                code: ErrorCode::OrderingViolation,
                message: "Published version must be greater than the last published version."
                    .to_string(),
            }],
        }
    }

    #[test]
    fn test_failures_render_in_every_format() {
        let report = report_with_failure();
        for format in [OutputFormat::Table, OutputFormat::Json, OutputFormat::Yaml] {
            assert!(print_report(&report, format).is_ok());
        }
    }

    #[test]
    fn test_failure_row_serializes() {
        let row = FailureRow {
            index: 3,
            event_type: "unpublish".to_string(),
            entity_id: "doc".to_string(),
            code: ErrorCode::VersionNotFound.to_string(),
            message: "Version not found for unpublish.".to_string(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["index"], 3);
        assert_eq!(value["code"], "VersionNotFound");
    }

    #[test]
    fn test_read_events_rejects_non_array() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"type":"delete","id":"doc"}}"#).unwrap();

        let err = read_events(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("expected a JSON array"));
    }
}
