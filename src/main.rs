use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use rustis_server::config::{Cli, Config};
use rustis_server::connection;
use rustis_server::dispatcher::SharedState;
use rustis_server::models::{ReplicationInfo, Role};
use rustis_server::rdb;
use rustis_server::replication;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_cli(cli)?);

    let role = if config.is_replica() { Role::Slave } else { Role::Master };
    let replication_info = ReplicationInfo::new(role);
    let state = Arc::new(SharedState::new(config.clone(), replication_info.clone()));

    if let Some(path) = config.rdb_path() {
        if let Err(err) = rdb::load(&path, &state.keyspace) {
            log::warn!("failed to load RDB file {path:?}: {err}; starting with an empty keyspace");
        }
    }

    if config.is_replica() {
        let config = config.clone();
        let keyspace = state.keyspace.clone();
        let replication_info = replication_info.clone();
        tokio::spawn(async move {
            if let Err(err) = replication::replica::run(config, keyspace, replication_info).await {
                log::error!("replication link to master failed: {err}");
            }
        });
    }

    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
    log::info!("listening on port {}", config.port);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let state = state.clone();
                tokio::spawn(async move {
                    connection::handle(stream, state).await;
                });
            }
            _ = shutdown_signal() => {
                log::info!("shutting down");
                return Ok(());
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
