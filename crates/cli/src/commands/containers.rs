//! Container identifier table

use anyhow::Result;
use serde::Serialize;
use state_lib::ContainerId;
use tabled::Tabled;

use crate::output::{print_json, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct IdRow {
    #[tabled(rename = "Token")]
    token: &'static str,
    #[tabled(rename = "Display Name")]
    display_name: &'static str,
}

/// Print the mapping between tokens and display names
pub fn list_containers(format: OutputFormat) -> Result<()> {
    let rows: Vec<IdRow> = ContainerId::ALL
        .iter()
        .map(|id| IdRow {
            token: id.token(),
            display_name: id.display_name(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => print_table(rows),
    }

    Ok(())
}
