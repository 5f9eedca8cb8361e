//! `pool-watch`: prints the PicaFund pool snapshot from a public RPC node.
//!
//! Runs the same refresh path as the browser front end against a read-only
//! client. One-shot by default; set `POOL_WATCH_INTERVAL_SECS` to keep
//! polling until Ctrl-C.

mod config;
mod report;

use config::WatchConfig;
use pf_contract_client::{ClientHandle, ContractReader};
use pf_dapp_core::TokenMetadata;
use pf_dapp_core::refresh::RefreshEngine;
use pf_rpc_client::{HttpTransport, RpcClient};
use report::PoolReport;
use std::rc::Rc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = WatchConfig::from_env()?;
    if config.contracts.funding.is_none() {
        warn!("POOL_WATCH_FUNDING not set; pool reads will fail");
    }

    let transport = HttpTransport::new(config.rpc_url.clone());
    info!(
        endpoint = transport.endpoint(),
        lookback = config.lookback_blocks,
        "pool-watch starting"
    );
    let reader: Rc<dyn ContractReader> =
        Rc::new(RpcClient::new(transport, config.contracts.clone()));
    let client = ClientHandle::ReadOnly(reader);

    let engine = RefreshEngine::new(config.lookback_blocks, config.leaderboard_size);
    let token = engine.load_token_metadata(&client).await;

    let Some(interval) = config.interval else {
        return print_snapshot(&engine, &client, &token, config.json).await;
    };

    let mut ticker = tokio::time::interval(interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => print_snapshot(&engine, &client, &token, config.json).await?,
            _ = &mut shutdown => {
                info!("pool-watch stopping");
                return Ok(());
            }
        }
    }
}

async fn print_snapshot(
    engine: &RefreshEngine,
    client: &ClientHandle,
    token: &TokenMetadata,
    json: bool,
) -> anyhow::Result<()> {
    let refresh = engine.refresh_pool_snapshot(client).await;
    for (read, err) in &refresh.failed {
        warn!(?read, error = %err, "pool read failed");
    }

    let report = PoolReport::new(token, refresh);
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}
