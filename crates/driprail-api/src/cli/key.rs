//! API-key management CLI commands: issue, list, revoke.
//!
//! Keys authenticate REST callers as one account. The plaintext is printed
//! exactly once at issue time; storage only ever sees the SHA-256 hash.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use driprail_core::repository::account::AccountRepository;
use driprail_core::repository::api_key::ApiKeyRepository;
use driprail_types::account::{AccountId, ApiKey};

use crate::http::extractors::auth::generate_api_key;
use crate::state::AppState;

/// API-key management subcommands.
#[derive(clap::Subcommand)]
pub enum KeyCommand {
    /// Issue a new API key for an account (plaintext shown once).
    Issue {
        /// Account id the key authenticates as.
        #[arg(long)]
        account: String,

        /// Key label (e.g., "ci", "zapier").
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// List an account's keys (hashes are never shown).
    List {
        /// Account id to list keys for.
        #[arg(long)]
        account: String,
    },

    /// Revoke a key by id. Takes effect on the next request.
    Revoke {
        /// Key id to revoke.
        id: String,
    },
}

/// Handle an API-key management subcommand.
pub async fn handle_key_command(cmd: KeyCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        KeyCommand::Issue { account, name } => issue_key(state, &account, &name, json).await,
        KeyCommand::List { account } => list_keys(state, &account, json).await,
        KeyCommand::Revoke { id } => revoke_key(state, &id, json).await,
    }
}

async fn issue_key(state: &AppState, account: &str, name: &str, json: bool) -> Result<()> {
    let account_id: AccountId = account
        .parse()
        .with_context(|| format!("invalid account id: '{account}'"))?;

    // The account must exist; a key for a missing account could never
    // authenticate anything.
    let account = state
        .accounts
        .get_by_id(&account_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("account {account_id} not found"))?;

    let (plaintext, hash) = generate_api_key();
    let key = ApiKey {
        id: uuid::Uuid::now_v7(),
        account_id: account.id.clone(),
        name: name.to_string(),
        created_at: chrono::Utc::now(),
        last_used_at: None,
    };
    state.api_keys.insert(&key, &hash).await?;

    if json {
        let out = serde_json::json!({
            "id": key.id,
            "account_id": key.account_id,
            "name": key.name,
            "key": plaintext,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} API key issued for '{}' (save this -- it won't be shown again):",
        style("🔑").bold(),
        style(&account.name).cyan()
    );
    println!();
    println!("  {}", style(&plaintext).yellow().bold());
    println!();
    println!(
        "  {}  {}",
        style("Key ID:").bold(),
        style(key.id.to_string()).dim()
    );
    println!("  {}  {}", style("Label:").bold(), &key.name);
    println!();

    Ok(())
}

async fn list_keys(state: &AppState, account: &str, json: bool) -> Result<()> {
    let account_id: AccountId = account
        .parse()
        .with_context(|| format!("invalid account id: '{account}'"))?;

    let keys = state.api_keys.list_by_account(&account_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    if keys.is_empty() {
        println!();
        println!(
            "  {} No keys for this account. Issue one with: {}",
            style("i").blue().bold(),
            style(format!("drail key issue --account {account_id}")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Label").fg(Color::White),
        Cell::new("Key ID").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Last Used").fg(Color::White),
    ]);

    for key in &keys {
        let last_used = match &key.last_used_at {
            Some(dt) => format_relative_time(dt),
            None => "never".to_string(),
        };
        table.add_row(vec![
            Cell::new(&key.name).fg(Color::Cyan),
            Cell::new(key.id.to_string()).fg(Color::White),
            Cell::new(format_relative_time(&key.created_at)).fg(Color::DarkGrey),
            Cell::new(last_used).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

async fn revoke_key(state: &AppState, id: &str, json: bool) -> Result<()> {
    let key_id: uuid::Uuid = id
        .parse()
        .with_context(|| format!("invalid key id: '{id}'"))?;

    state.api_keys.revoke(&key_id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "revoked": key_id }))?
        );
        return Ok(());
    }

    println!();
    println!("  {} Key revoked.", style("✓").green().bold());
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
