pub use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Fixed-point scale of the native currency and the reward token.
pub const ETHER_DECIMALS: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 20 bytes of hex, got {0} characters")]
    BadLength(usize),
    #[error("address contains non-hex characters")]
    BadHex,
}

/// 20-byte account address, stored lowercase so comparisons ignore checksum casing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        let Some(body) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) else {
            return Err(AddressError::MissingPrefix);
        };
        if body.len() != 40 {
            return Err(AddressError::BadLength(body.len()));
        }
        if !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::BadHex);
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Right-most 20 bytes of a 32-byte ABI word (indexed event topics).
    pub fn from_word(word: &[u8]) -> Result<Self, AddressError> {
        if word.len() < 20 {
            return Err(AddressError::BadLength(word.len() * 2));
        }
        Ok(Self(format!("0x{}", hex::encode(&word[word.len() - 20..]))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0_u8; 20];
        // Validated as 40 hex characters on construction.
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }

    /// `0x1234...abcd` form used on buttons and leaderboard rows.
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount is not a decimal number: {0}")]
    Malformed(String),
    #[error("fractional component exceeds {ETHER_DECIMALS} decimals")]
    TooManyDecimals,
    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Integer amount with an implicit 18-decimal scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(pub U256);

impl Wei {
    pub const ZERO: Wei = Wei(U256::zero());

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn saturating_add(self, other: Wei) -> Wei {
        Wei(self.0.saturating_add(other.0))
    }

    pub fn from_dec_str(raw: &str) -> Result<Self, AmountError> {
        U256::from_dec_str(raw)
            .map(Wei)
            .map_err(|_| AmountError::Malformed(raw.to_owned()))
    }

    /// Parses a decimal ether string such as `"0.05"` into wei.
    pub fn parse_ether(raw: &str) -> Result<Self, AmountError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::Malformed(raw.to_owned()));
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(AmountError::Malformed(raw.to_owned()));
        }
        if fraction.len() > ETHER_DECIMALS {
            return Err(AmountError::TooManyDecimals);
        }

        let whole = if whole.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(whole).map_err(|_| AmountError::Overflow)?
        };
        let padded = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
        let fraction = U256::from_dec_str(&padded).map_err(|_| AmountError::Overflow)?;

        whole
            .checked_mul(U256::exp10(ETHER_DECIMALS))
            .and_then(|scaled| scaled.checked_add(fraction))
            .map(Wei)
            .ok_or(AmountError::Overflow)
    }

    /// Renders like `formatEther`: always one fractional digit, trailing zeros dropped.
    pub fn format_ether(&self) -> String {
        self.format_units(ETHER_DECIMALS)
    }

    pub fn format_units(&self, decimals: usize) -> String {
        if decimals == 0 {
            return format!("{}.0", self.0);
        }
        let (whole, fraction) = self.0.div_mod(U256::exp10(decimals));
        let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals);
        let trimmed = fraction.trim_end_matches('0');
        if trimmed.is_empty() {
            format!("{whole}.0")
        } else {
            format!("{whole}.{trimmed}")
        }
    }

    /// Clamps to `u64`, for values that are plain counters on chain.
    pub fn saturating_u64(&self) -> u64 {
        if self.0 > U256::from(u64::MAX) {
            u64::MAX
        } else {
            self.0.low_u64()
        }
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Wei::from_dec_str(&raw).map_err(serde::de::Error::custom)
    }
}

pub const BRONZE_USD: f64 = 10.0;
pub const SILVER_USD: f64 = 100.0;
pub const GOLD_USD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn for_usd(usd: f64) -> Tier {
        if usd >= GOLD_USD {
            Tier::Gold
        } else if usd >= SILVER_USD {
            Tier::Silver
        } else if usd >= BRONZE_USD {
            Tier::Bronze
        } else {
            Tier::None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::None => "-",
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub funding: Option<Address>,
    pub nft: Option<Address>,
    pub reward_token: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractRef {
    Funding,
    Nft,
    RewardToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Funded,
    NftMinted,
    TierUpgraded,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::Funded,
        EventKind::NftMinted,
        EventKind::TierUpgraded,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContractEvent {
    Funded {
        funder: Address,
        eth_amount: Wei,
        pica_awarded: Wei,
    },
    NftMinted {
        recipient: Address,
    },
    TierUpgraded {
        user: Address,
        total_usd: Wei,
    },
}

impl ContractEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ContractEvent::Funded { .. } => EventKind::Funded,
            ContractEvent::NftMinted { .. } => EventKind::NftMinted,
            ContractEvent::TierUpgraded { .. } => EventKind::TierUpgraded,
        }
    }

    /// The account the event is about.
    pub fn subject(&self) -> &Address {
        match self {
            ContractEvent::Funded { funder, .. } => funder,
            ContractEvent::NftMinted { recipient } => recipient,
            ContractEvent::TierUpgraded { user, .. } => user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
    pub event: ContractEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionSnapshot {
    pub user_usd_contributed: f64,
    pub tier: Tier,
}

impl ContributionSnapshot {
    pub fn from_usd(user_usd_contributed: f64) -> Self {
        Self {
            user_usd_contributed,
            tier: Tier::for_usd(user_usd_contributed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunderEntry {
    pub address: Address,
    pub cumulative_wei: Wei,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub total_raised_wei: Wei,
    pub reward_token_balance: Wei,
    pub nft_supply: u64,
    pub funder_leaderboard: Vec<FunderEntry>,
    pub distinct_funders: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub ttl_ms: u64,
}
