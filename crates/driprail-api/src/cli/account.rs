//! Account lifecycle CLI commands: create, list.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use driprail_core::repository::account::AccountRepository;
use driprail_types::account::{Account, AccountId};

use crate::state::AppState;

/// Create a new tenant account.
///
/// # Examples
///
/// ```bash
/// drail create account --name "Acme Marketing"
/// ```
pub async fn create_account(state: &AppState, name: &str, json: bool) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("account name must not be empty");
    }

    let account = Account {
        id: AccountId::new(),
        name: name.to_string(),
        created_at: chrono::Utc::now(),
    };
    let account = state.accounts.create(&account).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }

    println!();
    println!("  {} Account created!", style("✓").green().bold());
    println!();
    println!(
        "  {}  {}",
        style("Name:").bold(),
        style(&account.name).cyan()
    );
    println!(
        "  {}  {}",
        style("ID:").bold(),
        style(account.id.to_string()).dim()
    );
    println!();
    println!(
        "  Issue an API key: {}",
        style(format!("drail key issue --account {}", account.id)).yellow()
    );
    println!();

    Ok(())
}

/// List all accounts in a table.
pub async fn list_accounts(state: &AppState, json: bool) -> Result<()> {
    let accounts = state.accounts.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!();
        println!(
            "  {} No accounts yet. Create one with: {}",
            style("i").blue().bold(),
            style("drail create account --name \"Acme\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for account in &accounts {
        table.add_row(vec![
            Cell::new(&account.name).fg(Color::Cyan),
            Cell::new(account.id.to_string()).fg(Color::White),
            Cell::new(format_relative_time(&account.created_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} account{}",
        style(accounts.len()).bold(),
        if accounts.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

// --- Formatting helpers ---

fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}
