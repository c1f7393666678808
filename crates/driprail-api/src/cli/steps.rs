//! Step-kind listing for the CLI.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::state::AppState;

/// Summaries shown beside each built-in kind. New kinds without an entry
/// still list, just without a blurb.
fn describe(kind: &str) -> &'static str {
    match kind {
        "append_row" => "Append a row to a connected spreadsheet",
        "post_webhook" => "POST the payload to an outbound webhook URL",
        "send_sms" => "Send a templated SMS through the gateway",
        "tag_contact" => "Apply a tag to a CRM contact",
        "untag_contact" => "Remove a tag from a CRM contact",
        "update_field" => "Update fields on a CRM contact record",
        _ => "",
    }
}

/// List the registered step kinds.
pub async fn list_steps(state: &AppState, json: bool) -> Result<()> {
    let kinds = state.registry.kinds();

    if json {
        println!("{}", serde_json::to_string_pretty(&kinds)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Kind").fg(Color::White),
        Cell::new("Description").fg(Color::White),
    ]);

    for kind in &kinds {
        table.add_row(vec![
            Cell::new(kind).fg(Color::Cyan),
            Cell::new(describe(kind)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} step kind{}",
        style(kinds.len()).bold(),
        if kinds.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
