use async_trait::async_trait;
use pf_api_types::{Address, ContractAddresses, ContractRef, EventKind, LoggedEvent, U256, Wei};
use pf_contract_client::abi;
use pf_contract_client::{
    BlockWindow, CallValue, ClientError, ContractReader, ReadCall, TxHash, TxReceipt, WriteCall,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Carries one JSON-RPC request to a node or wallet and returns its `result`.
#[async_trait(?Send)]
pub trait RpcTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError>;
}

#[async_trait(?Send)]
impl<T: RpcTransport + ?Sized> RpcTransport for std::rc::Rc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        (**self).request(method, params).await
    }
}

/// Error object of a JSON-RPC response, shared by every transport.
#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl From<RpcErrorObject> for ClientError {
    fn from(err: RpcErrorObject) -> Self {
        ClientError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    block_number: Option<String>,
    log_index: Option<String>,
    transaction_hash: Option<String>,
    topics: Vec<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

/// Contract reads, writes and log queries over any [`RpcTransport`].
pub struct RpcClient<T> {
    transport: T,
    contracts: ContractAddresses,
}

impl<T: RpcTransport> RpcClient<T> {
    pub fn new(transport: T, contracts: ContractAddresses) -> Self {
        Self { transport, contracts }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn contract_address(&self, contract: ContractRef) -> Result<&Address, ClientError> {
        let address = match contract {
            ContractRef::Funding => self.contracts.funding.as_ref(),
            ContractRef::Nft => self.contracts.nft.as_ref(),
            ContractRef::RewardToken => self.contracts.reward_token.as_ref(),
        };
        address.ok_or(ClientError::MissingContract(contract))
    }

    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        let raw = self.transport.request("eth_chainId", json!([])).await?;
        quantity_u64(&raw)
    }

    async fn eth_call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ClientError> {
        let params = json!([{ "to": to.as_str(), "data": abi::to_hex_prefixed(data) }, "latest"]);
        let raw = self.transport.request("eth_call", params).await?;
        let text = raw
            .as_str()
            .ok_or_else(|| ClientError::Decode(format!("eth_call returned {raw}")))?;
        abi::from_hex_prefixed(text)
    }

    /// Logs of the given kinds emitted by the funding contract in `[from, to]`.
    pub async fn logs(
        &self,
        kinds: &[EventKind],
        from: u64,
        to: u64,
    ) -> Result<Vec<LoggedEvent>, ClientError> {
        let funding = self.contract_address(ContractRef::Funding)?;
        let topics: Vec<String> = kinds
            .iter()
            .map(|kind| abi::to_hex_prefixed(&abi::event_topic(*kind)))
            .collect();
        let filter = json!({
            "address": funding.as_str(),
            "fromBlock": abi::quantity(U256::from(from)),
            "toBlock": abi::quantity(U256::from(to)),
            "topics": [topics],
        });

        let raw = self.transport.request("eth_getLogs", json!([filter])).await?;
        let logs: Vec<RpcLog> =
            serde_json::from_value(raw).map_err(|err| ClientError::Decode(err.to_string()))?;
        debug!(count = logs.len(), from, to, "fetched contract logs");

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match decode_log(log) {
                Ok(event) => events.push(event),
                Err(err) => warn!(error = %err, "skipping undecodable log"),
            }
        }
        Ok(events)
    }

    pub async fn send_transaction(
        &self,
        from: &Address,
        call: &WriteCall,
    ) -> Result<TxHash, ClientError> {
        let (contract, data, value) = abi::encode_write(call);
        let to = self.contract_address(contract)?;
        let tx = json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "value": abi::quantity(value.0),
            "data": abi::to_hex_prefixed(&data),
        });
        let raw = self.transport.request("eth_sendTransaction", json!([tx])).await?;
        raw.as_str()
            .map(|hash| TxHash(hash.to_owned()))
            .ok_or_else(|| ClientError::Decode(format!("eth_sendTransaction returned {raw}")))
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, tx: &TxHash) -> Result<Option<TxReceipt>, ClientError> {
        let raw = self
            .transport
            .request("eth_getTransactionReceipt", json!([tx.0]))
            .await?;
        if raw.is_null() {
            return Ok(None);
        }
        let receipt: RpcReceipt =
            serde_json::from_value(raw).map_err(|err| ClientError::Decode(err.to_string()))?;
        let block_number = match receipt.block_number.as_deref() {
            Some(raw) => abi::parse_quantity(raw)?.low_u64(),
            None => return Ok(None),
        };
        Ok(Some(TxReceipt {
            tx_hash: TxHash(receipt.transaction_hash),
            block_number,
            success: receipt.status.as_deref() != Some("0x0"),
        }))
    }
}

#[async_trait(?Send)]
impl<T: RpcTransport> ContractReader for RpcClient<T> {
    async fn call(&self, call: ReadCall) -> Result<CallValue, ClientError> {
        let to = self.contract_address(call.contract())?.clone();
        let output = self.eth_call(&to, &abi::encode_read(&call)).await?;
        abi::decode_read(&call, &output)
    }

    async fn native_balance(&self, contract: ContractRef) -> Result<Wei, ClientError> {
        let address = self.contract_address(contract)?;
        let raw = self
            .transport
            .request("eth_getBalance", json!([address.as_str(), "latest"]))
            .await?;
        let text = raw
            .as_str()
            .ok_or_else(|| ClientError::Decode(format!("eth_getBalance returned {raw}")))?;
        abi::parse_quantity(text).map(Wei)
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        let raw = self.transport.request("eth_blockNumber", json!([])).await?;
        quantity_u64(&raw)
    }

    async fn query_historical(
        &self,
        kind: EventKind,
        window: BlockWindow,
    ) -> Result<Vec<LoggedEvent>, ClientError> {
        let (from, to) = match window {
            BlockWindow::Range { from, to } => (from, to),
            BlockWindow::Lookback(blocks) => {
                let head = self.block_number().await?;
                (head.saturating_sub(blocks), head)
            }
        };
        self.logs(&[kind], from, to).await
    }
}

fn quantity_u64(raw: &Value) -> Result<u64, ClientError> {
    let text = raw
        .as_str()
        .ok_or_else(|| ClientError::Decode(format!("expected hex quantity, got {raw}")))?;
    let value = abi::parse_quantity(text)?;
    if value > U256::from(u64::MAX) {
        return Err(ClientError::Decode(format!("quantity {text} exceeds u64")));
    }
    Ok(value.low_u64())
}

fn decode_log(log: RpcLog) -> Result<LoggedEvent, ClientError> {
    let topics = log
        .topics
        .iter()
        .map(|topic| abi::word_from_hex(topic))
        .collect::<Result<Vec<_>, _>>()?;
    let data = abi::from_hex_prefixed(&log.data)?;
    let event = abi::decode_event(&topics, &data)?;
    let number = |raw: Option<&str>| -> Result<u64, ClientError> {
        Ok(raw.map(abi::parse_quantity).transpose()?.unwrap_or_default().low_u64())
    };
    Ok(LoggedEvent {
        block_number: number(log.block_number.as_deref())?,
        log_index: number(log.log_index.as_deref())?,
        tx_hash: log.transaction_hash.unwrap_or_default(),
        event,
    })
}
