//! Contract client capability consumed by the dapp core.
//!
//! A client is supplied by an injected wallet provider (signer) or a public
//! JSON-RPC endpoint (read-only). Futures are `?Send`: the browser host is
//! single-threaded and JS-backed values never cross threads.

pub mod abi;

use async_trait::async_trait;
use pf_api_types::{Address, ContractRef, EventKind, LoggedEvent, U256, Wei};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("provider error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("transaction {0} reverted")]
    Reverted(String),
    #[error("no address configured for the {0:?} contract")]
    MissingContract(ContractRef),
}

/// Read-only calls the front end issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCall {
    /// `getHowMuchDudeFundedInUsdActual(address)` on the funding contract.
    ContributionUsd(Address),
    /// `getPicaTokenBalance()`: reward tokens still held by the funding contract.
    RewardPoolBalance,
    /// `calculatePicaTokenReward(uint256)`: whole reward tokens for a wei amount.
    RewardFor(Wei),
    /// `getTotalSupply()` on the NFT contract.
    NftTotalSupply,
    TokenDecimals,
    TokenSymbol,
}

impl ReadCall {
    pub fn contract(&self) -> ContractRef {
        match self {
            ReadCall::ContributionUsd(_) | ReadCall::RewardPoolBalance | ReadCall::RewardFor(_) => {
                ContractRef::Funding
            }
            ReadCall::NftTotalSupply => ContractRef::Nft,
            ReadCall::TokenDecimals | ReadCall::TokenSymbol => ContractRef::RewardToken,
        }
    }

    pub fn signature(&self) -> &'static str {
        match self {
            ReadCall::ContributionUsd(_) => "getHowMuchDudeFundedInUsdActual(address)",
            ReadCall::RewardPoolBalance => "getPicaTokenBalance()",
            ReadCall::RewardFor(_) => "calculatePicaTokenReward(uint256)",
            ReadCall::NftTotalSupply => "getTotalSupply()",
            ReadCall::TokenDecimals => "decimals()",
            ReadCall::TokenSymbol => "symbol()",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallValue {
    Uint(U256),
    Text(String),
}

impl CallValue {
    pub fn into_uint(self) -> Result<U256, ClientError> {
        match self {
            CallValue::Uint(value) => Ok(value),
            CallValue::Text(_) => Err(ClientError::Decode("expected uint, got string".into())),
        }
    }

    pub fn into_text(self) -> Result<String, ClientError> {
        match self {
            CallValue::Text(value) => Ok(value),
            CallValue::Uint(_) => Err(ClientError::Decode("expected string, got uint".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    /// Payable `fund()` on the funding contract.
    Fund { value: Wei },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
}

/// Block range for historical event queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockWindow {
    /// The most recent `n` blocks up to the chain head.
    Lookback(u64),
    Range { from: u64, to: u64 },
}

pub type ListenerId = u64;

pub type EventHandler = Rc<dyn Fn(LoggedEvent)>;

#[async_trait(?Send)]
pub trait ContractReader {
    async fn call(&self, call: ReadCall) -> Result<CallValue, ClientError>;
    /// Native currency held by one of the contracts.
    async fn native_balance(&self, contract: ContractRef) -> Result<Wei, ClientError>;
    async fn block_number(&self) -> Result<u64, ClientError>;
    async fn query_historical(
        &self,
        kind: EventKind,
        window: BlockWindow,
    ) -> Result<Vec<LoggedEvent>, ClientError>;
}

#[async_trait(?Send)]
pub trait ContractClient: ContractReader {
    fn reader(&self) -> &dyn ContractReader;
    fn signer_address(&self) -> &Address;
    async fn send(&self, call: WriteCall) -> Result<TxHash, ClientError>;
    async fn await_confirmation(&self, tx: &TxHash) -> Result<TxReceipt, ClientError>;
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerId, ClientError>;
    fn unsubscribe(&self, id: ListenerId);
}

#[async_trait(?Send)]
pub trait WalletProvider {
    /// `explicit` may prompt the user; otherwise only already-granted accounts are returned.
    async fn request_accounts(&self, explicit: bool) -> Result<Vec<Address>, ClientError>;
    async fn chain_id(&self) -> Result<u64, ClientError>;
    fn signer_client(&self, address: &Address) -> Rc<dyn ContractClient>;
}

/// Which client, if any, is currently usable.
#[derive(Clone, Default)]
pub enum ClientHandle {
    #[default]
    NoClient,
    ReadOnly(Rc<dyn ContractReader>),
    Signer(Rc<dyn ContractClient>),
}

impl ClientHandle {
    pub fn reader(&self) -> Option<&dyn ContractReader> {
        match self {
            ClientHandle::NoClient => None,
            ClientHandle::ReadOnly(reader) => Some(reader.as_ref()),
            ClientHandle::Signer(client) => Some(client.reader()),
        }
    }

    pub fn signer(&self) -> Option<&Rc<dyn ContractClient>> {
        match self {
            ClientHandle::Signer(client) => Some(client),
            ClientHandle::NoClient | ClientHandle::ReadOnly(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClientHandle::NoClient => "none",
            ClientHandle::ReadOnly(_) => "read-only",
            ClientHandle::Signer(_) => "signer",
        }
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
