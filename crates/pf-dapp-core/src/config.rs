use pf_api_types::ContractAddresses;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FUNDER_LOOKBACK_BLOCKS: u64 = 10_000;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;
pub const DEFAULT_PICA_MULTIPLIER: u64 = 2;
pub const DEFAULT_NOTIFICATION_TTL_MS: u64 = 5_000;
pub const DEFAULT_EVENT_POLL_INTERVAL_MS: u64 = 4_000;
pub const DEFAULT_DISCONNECT_FLAG_KEY: &str = "pf_wallet_disconnected";

/// Front-end configuration. Every field has a default so partial JSON is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DappConfig {
    pub contracts: ContractAddresses,
    /// Public endpoint used for read-only snapshots while no wallet session exists.
    pub public_rpc_url: Option<String>,
    /// When set, sessions on any other chain are refused.
    pub expected_chain_id: Option<u64>,
    pub funder_lookback_blocks: u64,
    pub leaderboard_size: usize,
    /// USD value of one reward token is `1 / pica_multiplier`.
    pub pica_multiplier: u64,
    pub notification_ttl_ms: u64,
    pub event_poll_interval_ms: u64,
    pub disconnect_flag_key: String,
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            contracts: ContractAddresses::default(),
            public_rpc_url: None,
            expected_chain_id: None,
            funder_lookback_blocks: DEFAULT_FUNDER_LOOKBACK_BLOCKS,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            pica_multiplier: DEFAULT_PICA_MULTIPLIER,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
            event_poll_interval_ms: DEFAULT_EVENT_POLL_INTERVAL_MS,
            disconnect_flag_key: DEFAULT_DISCONNECT_FLAG_KEY.to_owned(),
        }
    }
}

impl DappConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
