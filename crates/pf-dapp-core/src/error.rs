use pf_contract_client::ClientError;
use thiserror::Error;

/// EIP-1193 "user rejected request".
pub const CODE_USER_REJECTED: i64 = 4001;
/// EIP-1193 "unauthorized".
pub const CODE_UNAUTHORIZED: i64 = 4100;
/// EIP-1193 "disconnected" / "chain disconnected".
pub const CODE_DISCONNECTED: i64 = 4900;
pub const CODE_CHAIN_DISCONNECTED: i64 = 4901;
/// Generic server error most nodes use for failed pre-flight checks.
pub const CODE_SERVER_ERROR: i64 = -32000;
pub const CODE_TX_REJECTED: i64 = -32003;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("no wallet provider found")]
    NoProviderFound,
    #[error("wallet authorization was rejected")]
    UserRejected,
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("wallet provider error: {0}")]
    ProviderError(String),
}

impl From<ClientError> for ConnectError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rpc { code, .. }
                if code == CODE_USER_REJECTED || code == CODE_UNAUTHORIZED =>
            {
                ConnectError::UserRejected
            }
            other => ConnectError::ProviderError(other.to_string()),
        }
    }
}

/// Why a silent restore did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotEligible {
    #[error("user explicitly disconnected")]
    ExplicitlyDisconnected,
    #[error("no wallet provider found")]
    NoProviderFound,
    #[error("no previously authorized accounts")]
    NoAuthorizedAccounts,
    #[error("silent reconnect failed: {0}")]
    Failed(ConnectError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DappError {
    #[error("no wallet provider available")]
    ProviderUnavailable,
    #[error("request rejected by the user")]
    UserRejected,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("wallet network changed")]
    NetworkMismatch,
    #[error("read failed: {0}")]
    ReadFailure(String),
    #[error("wallet not connected")]
    NotConnected,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("wallet provider error: {0}")]
    ProviderError(String),
}

impl DappError {
    /// Maps a write-path client failure onto the user-facing taxonomy.
    pub fn classify(err: &ClientError) -> DappError {
        match err {
            ClientError::Rpc { code, message } => {
                let lowered = message.to_ascii_lowercase();
                if *code == CODE_USER_REJECTED
                    || lowered.contains("user rejected")
                    || lowered.contains("user denied")
                {
                    DappError::UserRejected
                } else if *code == CODE_DISCONNECTED || *code == CODE_CHAIN_DISCONNECTED {
                    DappError::NetworkMismatch
                } else if lowered.contains("insufficient funds")
                    || *code == CODE_SERVER_ERROR
                    || *code == CODE_TX_REJECTED
                {
                    DappError::InsufficientFunds
                } else {
                    DappError::ProviderError(err.to_string())
                }
            }
            ClientError::Reverted(_) => DappError::InsufficientFunds,
            ClientError::Transport(_)
            | ClientError::Decode(_)
            | ClientError::Unsupported(_)
            | ClientError::MissingContract(_) => DappError::ProviderError(err.to_string()),
        }
    }

    pub fn read(err: &ClientError) -> DappError {
        DappError::ReadFailure(err.to_string())
    }

    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            DappError::ProviderUnavailable => "Please install MetaMask!",
            DappError::UserRejected => "Request rejected in your wallet.",
            DappError::InsufficientFunds => "Insufficient funds for this contribution.",
            DappError::NetworkMismatch => "Network changed. Reloading...",
            DappError::ReadFailure(_) => "Could not load on-chain data.",
            DappError::NotConnected => "Please connect your wallet first",
            DappError::InvalidAmount(_) => "Please enter a valid amount",
            DappError::ProviderError(_) => "Error funding project. Please try again.",
        }
    }
}

impl From<ConnectError> for DappError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::NoProviderFound => DappError::ProviderUnavailable,
            ConnectError::UserRejected => DappError::UserRejected,
            ConnectError::WrongNetwork { .. } => DappError::NetworkMismatch,
            ConnectError::ProviderError(message) => DappError::ProviderError(message),
        }
    }
}
