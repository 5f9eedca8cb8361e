use anyhow::{Context, Result};
use pf_api_types::{Address, ContractAddresses};
use pf_dapp_core::config::{DEFAULT_FUNDER_LOOKBACK_BLOCKS, DEFAULT_LEADERBOARD_SIZE};
use std::time::Duration;

/// Runtime settings, read from `POOL_WATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// `None` leaves the choice to `HttpTransport` (`PF_PUBLIC_RPC_URL`, then localhost).
    pub rpc_url: Option<String>,
    pub contracts: ContractAddresses,
    pub lookback_blocks: u64,
    pub leaderboard_size: usize,
    /// `None` prints a single snapshot and exits.
    pub interval: Option<Duration>,
    pub json: bool,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            get(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let address = |key: &str| -> Result<Option<Address>> {
            get(key)
                .map(|raw| {
                    Address::parse(&raw)
                        .with_context(|| format!("{key}: invalid address {raw:?}"))
                })
                .transpose()
        };
        let contracts = ContractAddresses {
            funding: address("POOL_WATCH_FUNDING")?,
            nft: address("POOL_WATCH_NFT")?,
            reward_token: address("POOL_WATCH_TOKEN")?,
        };

        let lookback_blocks = match get("POOL_WATCH_LOOKBACK") {
            Some(raw) => raw.parse().with_context(|| {
                format!("POOL_WATCH_LOOKBACK: expected a block count, got {raw:?}")
            })?,
            None => DEFAULT_FUNDER_LOOKBACK_BLOCKS,
        };
        let leaderboard_size = match get("POOL_WATCH_TOP") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("POOL_WATCH_TOP: expected a count, got {raw:?}"))?,
            None => DEFAULT_LEADERBOARD_SIZE,
        };
        let interval = match get("POOL_WATCH_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().with_context(|| {
                    format!("POOL_WATCH_INTERVAL_SECS: expected seconds, got {raw:?}")
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };
        let json = matches!(get("POOL_WATCH_JSON").as_deref(), Some("1" | "true" | "yes"));

        Ok(Self {
            rpc_url: get("POOL_WATCH_RPC_URL"),
            contracts,
            lookback_blocks,
            leaderboard_size,
            interval,
            json,
        })
    }
}
