// Command handler for the microboard CLI

use crate::board::*;
use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

/// Execute a parsed command line
pub async fn execute_command(cli: MicroboardCli) -> Result<()> {
    let store = Arc::new(
        MessageStore::open(&cli.data_dir)
            .await
            .with_context(|| format!("Failed to load message table from {:?}", cli.data_dir))?,
    );

    match cli.command {
        MicroboardCommand::Serve {
            host,
            port,
            admin_key,
            admin_key_sha256,
        } => {
            let admin = resolve_admin_key(admin_key, admin_key_sha256)?;
            handle_serve(store, &cli.data_dir, host, port, admin).await
        }
        MicroboardCommand::List {
            limit,
            offset,
            sort,
        } => handle_list(store, limit, offset, sort).await,
        MicroboardCommand::Stats => handle_stats(store).await,
        MicroboardCommand::Delete { id } => handle_delete(store, id).await,
    }
}

/// Build the admin key from whichever form was configured.
pub fn resolve_admin_key(plain: Option<String>, sha256_hex: Option<String>) -> Result<AdminKey> {
    match (plain, sha256_hex) {
        (Some(plain), _) if !plain.is_empty() => Ok(AdminKey::from_secret(&plain)),
        (_, Some(digest)) if !digest.is_empty() => AdminKey::from_sha256_hex(&digest)
            .context("ADMIN_KEY_SHA256 is not a hex SHA-256 digest"),
        _ => Ok(AdminKey::disabled()),
    }
}

async fn handle_serve(
    store: Arc<MessageStore>,
    data_dir: &Path,
    host: IpAddr,
    port: u16,
    admin: AdminKey,
) -> Result<()> {
    tracing::info!("Data directory: {:?}", data_dir);
    tracing::info!("Messages loaded: {}", store.len().await);
    if !admin.is_configured() {
        tracing::warn!("No admin key configured; deletes are disabled");
    }

    let ctx = Arc::new(HttpContext { store, admin });
    let addr = SocketAddr::new(host, port);

    crate::board::http::serve(addr, ctx, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    })
    .await
}

async fn handle_list(
    store: Arc<MessageStore>,
    limit: i64,
    offset: i64,
    sort: SortOrder,
) -> Result<()> {
    let messages = store.list(limit, offset, sort).await?;
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

async fn handle_stats(store: Arc<MessageStore>) -> Result<()> {
    let stats = store.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn handle_delete(store: Arc<MessageStore>, id: String) -> Result<()> {
    // Local access to the data directory is the authorization here
    let deleted = store.delete(&id, true).await?;
    println!("✓ Deleted message {}", deleted);
    Ok(())
}
