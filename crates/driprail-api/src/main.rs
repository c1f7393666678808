//! Driprail CLI and REST API entry point.
//!
//! Binary name: `drail`
//!
//! Parses CLI arguments, initializes the database and dispatch engine, then
//! dispatches to the appropriate command handler, the REST API server, or
//! the queue worker loop.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands, CreateResource, ListResource};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity (RUST_LOG overrides)
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,driprail=debug",
        _ => "trace",
    };

    driprail_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "drail", &mut std::io::stdout());
        return Ok(());
    }

    // Initialize application state (DB, vault, registry, dispatcher)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Create { resource } => match resource {
            CreateResource::Account { name } => {
                cli::account::create_account(&state, &name, cli.json).await?;
            }
        },

        Commands::List { resource } => match resource {
            ListResource::Accounts => {
                cli::account::list_accounts(&state, cli.json).await?;
            }
        },

        Commands::Key { action } => {
            cli::key::handle_key_command(action, &state, cli.json).await?;
        }

        Commands::Steps => {
            cli::steps::list_steps(&state, cli.json).await?;
        }

        Commands::Enqueue {
            account,
            step,
            contact,
            payload,
            connections,
            delay_seconds,
        } => {
            cli::enqueue::enqueue_event(
                &state,
                &account,
                &step,
                contact,
                payload,
                &connections,
                delay_seconds,
                cli.json,
            )
            .await?;
        }

        Commands::Serve {
            port,
            host,
            no_worker,
        } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);

            // Embedded worker drains the queue in-process unless the
            // deployment runs `drail work` separately.
            let worker_token = CancellationToken::new();
            let worker_handle = if no_worker {
                None
            } else {
                let worker = state.worker();
                let token = worker_token.clone();
                Some(tokio::spawn(async move { worker.run(token).await }))
            };

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} Driprail API listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            if worker_handle.is_some() {
                println!(
                    "  {}",
                    console::style("Embedded queue worker running").dim()
                );
            }
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            // HTTP has stopped accepting traffic; drain the worker's batch
            // in flight before exiting.
            worker_token.cancel();
            if let Some(handle) = worker_handle {
                let _ = handle.await;
            }

            println!("\n  Server stopped.");
        }

        Commands::Work => {
            let worker = state.worker();
            let token = CancellationToken::new();
            let signal_token = token.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                signal_token.cancel();
            });

            println!(
                "  {} Driprail queue worker running",
                console::style("⚙").bold()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            worker.run(token).await;

            println!("\n  Worker stopped.");
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    driprail_observe::tracing_setup::shutdown_tracing();

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
