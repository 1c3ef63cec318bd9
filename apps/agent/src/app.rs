//! Application orchestrator: wires registry, router and server together.

use std::sync::Arc;

use deskbridge_agent_server::{AgentServer, Router, issue_pairing_info};
use deskbridge_transfer::{FileAssembler, TransferRegistry};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::host::HostCapabilities;

/// Runs the agent until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let pairing = issue_pairing_info(config.port);
    tracing::info!(
        server_ip = %pairing.server_ip,
        port = pairing.port_no,
        token = %pairing.pairing_token,
        "pairing identity issued"
    );
    tracing::info!(payload = %pairing.qr_payload()?, "pairing payload");

    let downloads = config.downloads_path();
    tracing::info!(path = %downloads.display(), "uploads will be saved here");

    let router = Router::new(
        pairing,
        Arc::new(TransferRegistry::new(config.registry_limits())),
        FileAssembler::new(downloads),
        Arc::new(HostCapabilities::new()),
        config.router_options(),
    );
    let server = AgentServer::with_cancel(config.server_config(), router, cancel.clone());

    let server_run = Arc::clone(&server);
    let mut server_task = tokio::spawn(async move { server_run.run().await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        result = &mut server_task => {
            // The listener only stops on its own when binding fails.
            return match result {
                Ok(inner) => inner.map_err(Into::into),
                Err(e) => Err(e.into()),
            };
        }
    }

    cancel.cancel();
    server_task.await??;
    Ok(())
}
