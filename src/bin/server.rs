//! Chat server binary.
//!
//! Usage: server <port>
//!
//! The port must fall in [1024, 65535]. Credentials load from and save
//! to `users.db` in the working directory; SIGINT/SIGTERM stops the
//! accept loop, closes all sockets and flushes the credential store.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use srpchat::server::{Server, ServerConfig};

const CREDENTIAL_FILE: &str = "users.db";

fn parse_port(args: &[String]) -> Option<u16> {
    if args.len() != 2 {
        return None;
    }
    let port: u16 = args[1].parse().ok()?;
    (port >= 1024).then_some(port)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing — respects RUST_LOG env var (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(port) = parse_port(&args) else {
        eprintln!("usage: server <port>  (port in 1024..=65535)");
        return ExitCode::from(2);
    };

    match run(port).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("server error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(port: u16) -> anyhow::Result<()> {
    let config = ServerConfig::new(port, CREDENTIAL_FILE);
    let server = Arc::new(Server::bind(config).await?);

    let run_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    server.stop();
    run_handle.await??;

    // A failed credential flush must surface as a non-zero exit.
    server.save_credentials()?;
    tracing::info!("credentials saved");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!("cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
