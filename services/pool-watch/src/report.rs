use pf_api_types::PoolSnapshot;
use pf_dapp_core::TokenMetadata;
use pf_dapp_core::format;
use pf_dapp_core::refresh::PoolRefresh;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct PoolReport {
    pub token: TokenMetadata,
    pub pool: PoolSnapshot,
    /// Reads that failed; their fields show zero.
    pub failed_reads: Vec<String>,
}

impl PoolReport {
    pub fn new(token: &TokenMetadata, refresh: PoolRefresh) -> Self {
        Self {
            token: token.clone(),
            failed_reads: refresh
                .failed
                .iter()
                .map(|(read, err)| format!("{read:?}: {err}"))
                .collect(),
            pool: refresh.snapshot,
        }
    }

    pub fn to_text(&self) -> String {
        let pool = &self.pool;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Total raised:   {} ETH",
            format::ether(pool.total_raised_wei, format::TOTAL_RAISED_WIDTH)
        );
        let _ = writeln!(
            out,
            "Reward pool:    {} {}",
            format::token(
                pool.reward_token_balance,
                self.token.decimals,
                format::REWARD_BALANCE_WIDTH
            ),
            self.token.symbol
        );
        let _ = writeln!(out, "NFTs minted:    {}", pool.nft_supply);
        let _ = writeln!(out, "Contributors:   {}", pool.distinct_funders);
        if pool.funder_leaderboard.is_empty() {
            let _ = writeln!(out, "No contributors yet.");
        }
        for (rank, entry) in pool.funder_leaderboard.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3}. {}  {} ETH",
                rank + 1,
                entry.address.short(),
                format::ether(entry.cumulative_wei, format::FUNDER_AMOUNT_WIDTH)
            );
        }
        for failure in &self.failed_reads {
            let _ = writeln!(out, "warning: {failure}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_api_types::{Address, FunderEntry, Wei};
    use pf_dapp_core::DappError;
    use pf_dapp_core::refresh::PoolRead;

    fn sample() -> PoolRefresh {
        PoolRefresh {
            snapshot: PoolSnapshot {
                total_raised_wei: Wei::parse_ether("1.5").unwrap(),
                reward_token_balance: Wei::parse_ether("2500").unwrap(),
                nft_supply: 2,
                funder_leaderboard: vec![FunderEntry {
                    address: Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap(),
                    cumulative_wei: Wei::parse_ether("1").unwrap(),
                }],
                distinct_funders: 1,
            },
            failed: Vec::new(),
            superseded: false,
        }
    }

    #[test]
    fn text_report_lists_pool_and_leaderboard() {
        let report = PoolReport::new(&TokenMetadata::default(), sample());
        let text = report.to_text();
        assert!(text.contains("Total raised:   1.5 ETH"), "{text}");
        assert!(text.contains("Reward pool:    2500.0 PICA"), "{text}");
        assert!(text.contains("NFTs minted:    2"));
        assert!(text.contains("  1. 0xabcd...ef01  1.0 ETH"), "{text}");
        assert!(!text.contains("warning"));
    }

    #[test]
    fn failed_reads_are_reported() {
        let mut refresh = sample();
        refresh.snapshot.funder_leaderboard.clear();
        refresh
            .failed
            .push((PoolRead::NftSupply, DappError::ReadFailure("timeout".into())));
        let report = PoolReport::new(&TokenMetadata::default(), refresh);

        let text = report.to_text();
        assert!(text.contains("No contributors yet."));
        assert!(text.contains("warning: NftSupply"), "{text}");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pool"]["nft_supply"], 2);
        assert_eq!(json["token"]["symbol"], "PICA");
        assert_eq!(json["failed_reads"].as_array().unwrap().len(), 1);
    }
}
