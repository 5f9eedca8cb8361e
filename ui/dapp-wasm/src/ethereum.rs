//! Bridge to the injected EIP-1193 provider (`window.ethereum`).
//!
//! The provider is used both as the JSON-RPC transport for the signer
//! client and as the source of `accountsChanged` / `chainChanged` signals.
//! Live contract events are delivered by polling `eth_getLogs` on a timer,
//! since EIP-1193 has no portable log subscription.

use crate::dom;
use async_trait::async_trait;
use gloo_timers::future::TimeoutFuture;
use js_sys::{Function, Promise, Reflect};
use pf_api_types::{Address, ContractAddresses, ContractRef, EventKind, LoggedEvent, Wei};
use pf_contract_client::{
    BlockWindow, CallValue, ClientError, ContractClient, ContractReader, EventHandler, ListenerId,
    ReadCall, TxHash, TxReceipt, WalletProvider, WriteCall,
};
use pf_rpc_client::{RpcClient, RpcTransport};
use serde::Serialize;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Give up waiting for a receipt after this many polls.
const CONFIRMATION_POLLS: u32 = 150;

pub struct Eip1193 {
    inner: JsValue,
}

impl Eip1193 {
    pub fn detect() -> Option<Self> {
        let window = dom::window()?;
        let inner = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if inner.is_undefined() || inner.is_null() {
            return None;
        }
        Some(Self { inner })
    }

    fn method(&self, name: &str) -> Result<Function, ClientError> {
        Reflect::get(&self.inner, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or(ClientError::Unsupported("provider method missing"))
    }

    /// Registers a provider event handler for the lifetime of the page.
    pub fn on(&self, event: &str, handler: Closure<dyn FnMut(JsValue)>) -> Result<(), ClientError> {
        let on = self.method("on")?;
        on.call2(&self.inner, &JsValue::from_str(event), handler.as_ref().unchecked_ref())
            .map_err(provider_error)?;
        handler.forget();
        Ok(())
    }
}

/// Maps a rejected provider promise to `Rpc { code, message }` when it carries a code.
fn provider_error(err: JsValue) -> ClientError {
    let code = Reflect::get(&err, &JsValue::from_str("code"))
        .ok()
        .and_then(|code| code.as_f64());
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{err:?}"));
    match code {
        Some(code) => ClientError::Rpc {
            code: code as i64,
            message,
        },
        None => ClientError::Transport(message),
    }
}

#[async_trait(?Send)]
impl RpcTransport for Eip1193 {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let request = self.method("request")?;
        let args = json!({ "method": method, "params": params })
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| ClientError::Decode(err.to_string()))?;

        let promise: Promise = request
            .call1(&self.inner, &args)
            .map_err(provider_error)?
            .dyn_into()
            .map_err(|_| {
                ClientError::Transport(format!("{method}: provider did not return a promise"))
            })?;
        let result = JsFuture::from(promise).await.map_err(provider_error)?;
        if result.is_undefined() || result.is_null() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result)
            .map_err(|err| ClientError::Decode(format!("{method}: {err}")))
    }
}

pub type ProviderRpc = RpcClient<Rc<Eip1193>>;

pub struct InjectedWallet {
    provider: Rc<Eip1193>,
    rpc: ProviderRpc,
    contracts: ContractAddresses,
    poll_interval_ms: u32,
}

impl InjectedWallet {
    pub fn new(provider: Rc<Eip1193>, contracts: ContractAddresses, poll_interval_ms: u64) -> Self {
        Self {
            rpc: RpcClient::new(Rc::clone(&provider), contracts.clone()),
            provider,
            contracts,
            poll_interval_ms: u32::try_from(poll_interval_ms).unwrap_or(u32::MAX),
        }
    }
}

/// Parses the `accountsChanged` / `eth_accounts` payload.
pub fn parse_accounts(raw: Value) -> Result<Vec<Address>, ClientError> {
    let accounts: Vec<String> =
        serde_json::from_value(raw).map_err(|err| ClientError::Decode(err.to_string()))?;
    accounts
        .iter()
        .map(|account| Address::parse(account).map_err(|err| ClientError::Decode(err.to_string())))
        .collect()
}

#[async_trait(?Send)]
impl WalletProvider for InjectedWallet {
    async fn request_accounts(&self, explicit: bool) -> Result<Vec<Address>, ClientError> {
        let method = if explicit { "eth_requestAccounts" } else { "eth_accounts" };
        let raw = self.provider.request(method, json!([])).await?;
        parse_accounts(raw)
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        self.rpc.chain_id().await
    }

    fn signer_client(&self, address: &Address) -> Rc<dyn ContractClient> {
        Rc::new(BrowserSigner {
            rpc: Rc::new(RpcClient::new(Rc::clone(&self.provider), self.contracts.clone())),
            address: address.clone(),
            poll_interval_ms: self.poll_interval_ms,
            watch: Rc::new(RefCell::new(LogWatch::default())),
        })
    }
}

#[derive(Default)]
struct LogWatch {
    listeners: BTreeMap<ListenerId, (EventKind, EventHandler)>,
    next_id: ListenerId,
    running: bool,
    cursor: LogCursor,
}

/// Last block whose logs were delivered; `None` until the first head is seen.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LogCursor(Option<u64>);

impl LogCursor {
    /// Block range still to fetch up to `head`. The first call only anchors.
    fn pending(&mut self, head: u64) -> Option<(u64, u64)> {
        match self.0 {
            None => {
                self.0 = Some(head);
                None
            }
            Some(last) if head > last => Some((last + 1, head)),
            Some(_) => None,
        }
    }

    fn delivered(&mut self, to: u64) {
        self.0 = Some(to);
    }
}

/// Signer client bound to one wallet account.
pub struct BrowserSigner {
    rpc: Rc<ProviderRpc>,
    address: Address,
    poll_interval_ms: u32,
    watch: Rc<RefCell<LogWatch>>,
}

#[async_trait(?Send)]
impl ContractReader for BrowserSigner {
    async fn call(&self, call: ReadCall) -> Result<CallValue, ClientError> {
        self.rpc.call(call).await
    }

    async fn native_balance(&self, contract: ContractRef) -> Result<Wei, ClientError> {
        self.rpc.native_balance(contract).await
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        self.rpc.block_number().await
    }

    async fn query_historical(
        &self,
        kind: EventKind,
        window: BlockWindow,
    ) -> Result<Vec<LoggedEvent>, ClientError> {
        self.rpc.query_historical(kind, window).await
    }
}

#[async_trait(?Send)]
impl ContractClient for BrowserSigner {
    fn reader(&self) -> &dyn ContractReader {
        self.rpc.as_ref()
    }

    fn signer_address(&self) -> &Address {
        &self.address
    }

    async fn send(&self, call: WriteCall) -> Result<TxHash, ClientError> {
        self.rpc.send_transaction(&self.address, &call).await
    }

    async fn await_confirmation(&self, tx: &TxHash) -> Result<TxReceipt, ClientError> {
        for _ in 0..CONFIRMATION_POLLS {
            if let Some(receipt) = self.rpc.transaction_receipt(tx).await? {
                if !receipt.success {
                    return Err(ClientError::Reverted(tx.0.clone()));
                }
                return Ok(receipt);
            }
            TimeoutFuture::new(self.poll_interval_ms).await;
        }
        Err(ClientError::Transport(format!("timed out waiting for {}", tx.0)))
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerId, ClientError> {
        let (id, start) = {
            let mut watch = self.watch.borrow_mut();
            watch.next_id += 1;
            let id = watch.next_id;
            watch.listeners.insert(id, (kind, handler));
            let start = !watch.running;
            watch.running = true;
            (id, start)
        };
        if start {
            wasm_bindgen_futures::spawn_local(poll_logs(
                Rc::clone(&self.rpc),
                Rc::clone(&self.watch),
                self.poll_interval_ms,
            ));
        }
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.watch.borrow_mut().listeners.remove(&id);
    }
}

/// Delivers new funding-contract logs to listeners until none are left.
async fn poll_logs(rpc: Rc<ProviderRpc>, watch: Rc<RefCell<LogWatch>>, interval_ms: u32) {
    // Anchor at the current head before sleeping, so logs mined during the
    // first interval are delivered on the first tick.
    if !poll_once(&rpc, &watch).await {
        return;
    }
    loop {
        TimeoutFuture::new(interval_ms).await;
        if !poll_once(&rpc, &watch).await {
            return;
        }
    }
}

/// One polling round. Returns `false` once the last listener is gone.
async fn poll_once(rpc: &ProviderRpc, watch: &RefCell<LogWatch>) -> bool {
    let mut kinds: Vec<EventKind> = watch
        .borrow()
        .listeners
        .values()
        .map(|(kind, _)| *kind)
        .collect();
    if kinds.is_empty() {
        let mut watch = watch.borrow_mut();
        watch.running = false;
        watch.cursor = LogCursor::default();
        debug!("log polling stopped");
        return false;
    }
    kinds.sort_by_key(|kind| EventKind::ALL.iter().position(|k| k == kind));
    kinds.dedup();

    let head = match rpc.block_number().await {
        Ok(head) => head,
        Err(err) => {
            warn!(error = %err, "block number poll failed");
            return true;
        }
    };
    let Some((from, to)) = watch.borrow_mut().cursor.pending(head) else {
        return true;
    };

    let events = match rpc.logs(&kinds, from, to).await {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, from, to, "log poll failed");
            return true;
        }
    };
    watch.borrow_mut().cursor.delivered(to);

    for event in events {
        let handlers: Vec<EventHandler> = watch
            .borrow()
            .listeners
            .values()
            .filter(|(kind, _)| *kind == event.event.kind())
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }
    true
}
