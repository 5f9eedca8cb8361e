//! Funding form: amount parsing and the reward/NFT preview.

use crate::error::DappError;
use crate::format;
use pf_api_types::{Address, BRONZE_USD, GOLD_USD, SILVER_USD, Wei};
use pf_contract_client::{CallValue, ClientError, ContractReader, ReadCall};
use serde::Serialize;

pub const SUBMITTED_TITLE: &str = "Transaction submitted";
pub const CONFIRMED_TITLE: &str = "Funding confirmed";
pub const CONFIRMED_MESSAGE: &str =
    "Successfully funded! You will receive your PICA tokens shortly.";

/// Parses the amount typed into the form. Zero and malformed input are rejected.
pub fn parse_amount(raw: &str) -> Result<Wei, DappError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DappError::InvalidAmount("empty amount".into()));
    }
    let value = Wei::parse_ether(trimmed).map_err(|err| DappError::InvalidAmount(err.to_string()))?;
    if value.is_zero() {
        return Err(DappError::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "usd_missing", rename_all = "snake_case")]
pub enum FundingPreviewStatus {
    FirstNft,
    UpgradeGold,
    UpgradeSilver,
    NeedMore(f64),
    MaintainTier,
}

impl FundingPreviewStatus {
    /// First match wins, in declaration order.
    pub fn classify(current_usd: f64, added_usd: f64) -> Self {
        let after = current_usd + added_usd;
        if current_usd < BRONZE_USD && after >= BRONZE_USD {
            FundingPreviewStatus::FirstNft
        } else if after >= GOLD_USD && current_usd < GOLD_USD {
            FundingPreviewStatus::UpgradeGold
        } else if after >= SILVER_USD && current_usd < SILVER_USD {
            FundingPreviewStatus::UpgradeSilver
        } else if after < BRONZE_USD {
            FundingPreviewStatus::NeedMore(BRONZE_USD - after)
        } else {
            FundingPreviewStatus::MaintainTier
        }
    }

    pub fn message(&self) -> String {
        match self {
            FundingPreviewStatus::FirstNft => "🎉 You will receive your first NFT!".into(),
            FundingPreviewStatus::UpgradeGold => "⬆️ Upgrade to GOLD tier!".into(),
            FundingPreviewStatus::UpgradeSilver => "⬆️ Upgrade to SILVER tier!".into(),
            FundingPreviewStatus::NeedMore(missing) => {
                format!("Need {} more for NFT", format::usd_fixed(*missing))
            }
            FundingPreviewStatus::MaintainTier => "✓ Maintaining current tier".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardPreview {
    pub eth_value: Wei,
    /// Whole reward tokens, as the funding contract reports them.
    pub pica_tokens: u64,
    pub usd_value: f64,
    pub current_usd: f64,
    pub status: FundingPreviewStatus,
}

impl RewardPreview {
    pub fn pica_display(&self, symbol: &str) -> String {
        let amount = format!("{:.6}", self.pica_tokens as f64);
        format!("{} {symbol}", format::truncate_chars(&amount, format::REWARD_PREVIEW_WIDTH))
    }

    pub fn usd_display(&self) -> String {
        format::usd_fixed(self.usd_value)
    }
}

pub async fn fetch_preview(
    reader: &dyn ContractReader,
    address: &Address,
    eth_value: Wei,
    pica_multiplier: u64,
) -> Result<RewardPreview, ClientError> {
    let (reward, current) = tokio::join!(
        reader.call(ReadCall::RewardFor(eth_value)),
        reader.call(ReadCall::ContributionUsd(address.clone())),
    );
    let pica_tokens = Wei(reward.and_then(CallValue::into_uint)?).saturating_u64();
    let current_usd = Wei(current.and_then(CallValue::into_uint)?).saturating_u64() as f64;
    let usd_value = pica_tokens as f64 / pica_multiplier.max(1) as f64;

    Ok(RewardPreview {
        eth_value,
        pica_tokens,
        usd_value,
        current_usd,
        status: FundingPreviewStatus::classify(current_usd, usd_value),
    })
}
