//! In-memory chain, wallet and clients for unit tests.

use async_trait::async_trait;
use pf_api_types::{Address, ContractEvent, ContractRef, EventKind, LoggedEvent, U256, Wei};
use pf_contract_client::{
    BlockWindow, CallValue, ClientError, ContractClient, ContractReader, EventHandler, ListenerId,
    ReadCall, TxHash, TxReceipt, WalletProvider, WriteCall,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::{Rc, Weak};

pub fn addr(n: u8) -> Address {
    Address::parse(&format!("0x{}", hex_byte(n).repeat(20))).unwrap()
}

fn hex_byte(n: u8) -> String {
    format!("{n:02x}")
}

pub fn ether(whole: u64) -> Wei {
    Wei(U256::from(whole) * U256::exp10(18))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Read {
    Contribution,
    RewardPool,
    RewardFor,
    Balance,
    NftSupply,
    Logs,
    TokenMetadata,
}

pub struct MockChain {
    this: Weak<MockChain>,
    accounts: RefCell<Vec<Address>>,
    pub prompts: Cell<u32>,
    pub account_requests: Cell<u32>,
    pub reject_authorization: Cell<bool>,
    pub authorized: Cell<bool>,
    pub chain_id: Cell<u64>,
    pub head: Cell<u64>,
    contributions: RefCell<HashMap<Address, u64>>,
    total_raised: Cell<Wei>,
    reward_pool: Cell<Wei>,
    nft_supply: Cell<u64>,
    /// Whole reward tokens per whole ether.
    pub reward_rate: Cell<u64>,
    /// USD credited to the sender by each `fund` transaction.
    pub usd_per_fund: Cell<u64>,
    logs: RefCell<Vec<LoggedEvent>>,
    failing: RefCell<HashSet<Read>>,
    slow: RefCell<HashMap<Address, u32>>,
    listeners: RefCell<BTreeMap<ListenerId, (EventKind, EventHandler)>>,
    next_listener: Cell<ListenerId>,
    pub sent: RefCell<Vec<(Address, WriteCall)>>,
    pub send_error: RefCell<Option<ClientError>>,
    pub revert: Cell<bool>,
}

impl MockChain {
    pub fn with_accounts(accounts: &[Address]) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            accounts: RefCell::new(accounts.to_vec()),
            prompts: Cell::new(0),
            account_requests: Cell::new(0),
            reject_authorization: Cell::new(false),
            authorized: Cell::new(true),
            chain_id: Cell::new(1),
            head: Cell::new(1_000),
            contributions: RefCell::new(HashMap::new()),
            total_raised: Cell::new(Wei::ZERO),
            reward_pool: Cell::new(Wei::ZERO),
            nft_supply: Cell::new(0),
            reward_rate: Cell::new(4_000),
            usd_per_fund: Cell::new(0),
            logs: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            slow: RefCell::new(HashMap::new()),
            listeners: RefCell::new(BTreeMap::new()),
            next_listener: Cell::new(1),
            sent: RefCell::new(Vec::new()),
            send_error: RefCell::new(None),
            revert: Cell::new(false),
        })
    }

    pub fn wallet(self: &Rc<Self>) -> Rc<dyn WalletProvider> {
        Rc::clone(self) as Rc<dyn WalletProvider>
    }

    pub fn reader(self: &Rc<Self>) -> Rc<dyn ContractReader> {
        Rc::clone(self) as Rc<dyn ContractReader>
    }

    pub fn client(self: &Rc<Self>, address: &Address) -> Rc<dyn ContractClient> {
        Rc::new(MockClient {
            chain: Rc::clone(self),
            address: address.clone(),
        })
    }

    pub fn set_contribution(&self, who: &Address, usd: u64) {
        self.contributions.borrow_mut().insert(who.clone(), usd);
    }

    pub fn set_pool(&self, total_raised: Wei, reward_pool: Wei, nft_supply: u64) {
        self.total_raised.set(total_raised);
        self.reward_pool.set(reward_pool);
        self.nft_supply.set(nft_supply);
    }

    pub fn fail(&self, read: Read) {
        self.failing.borrow_mut().insert(read);
    }

    pub fn heal(&self, read: Read) {
        self.failing.borrow_mut().remove(&read);
    }

    /// Contribution reads for `who` yield to the executor `polls` times first.
    pub fn slow_down(&self, who: &Address, polls: u32) {
        self.slow.borrow_mut().insert(who.clone(), polls);
    }

    /// Historical `Funded` log without notifying listeners.
    pub fn push_funded(&self, funder: &Address, wei: u64, block_number: u64) {
        let mut logs = self.logs.borrow_mut();
        let log_index = logs.len() as u64;
        logs.push(LoggedEvent {
            block_number,
            log_index,
            tx_hash: format!("0x{log_index:064x}"),
            event: ContractEvent::Funded {
                funder: funder.clone(),
                eth_amount: Wei::from_u64(wei),
                pica_awarded: Wei::ZERO,
            },
        });
    }

    /// Mines `event` into a new block and delivers it to live listeners.
    pub fn emit(&self, event: ContractEvent) -> LoggedEvent {
        let block_number = self.head.get() + 1;
        self.head.set(block_number);
        let logged = {
            let mut logs = self.logs.borrow_mut();
            let logged = LoggedEvent {
                block_number,
                log_index: logs.len() as u64,
                tx_hash: format!("0x{block_number:064x}"),
                event,
            };
            logs.push(logged.clone());
            logged
        };

        let handlers: Vec<EventHandler> = self
            .listeners
            .borrow()
            .values()
            .filter(|(kind, _)| *kind == logged.event.kind())
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(logged.clone());
        }
        logged
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn check(&self, read: Read) -> Result<(), ClientError> {
        if self.failing.borrow().contains(&read) {
            return Err(ClientError::Transport(format!("{read:?} unavailable")));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl ContractReader for MockChain {
    async fn call(&self, call: ReadCall) -> Result<CallValue, ClientError> {
        match call {
            ReadCall::ContributionUsd(who) => {
                let polls = self.slow.borrow().get(&who).copied().unwrap_or(0);
                for _ in 0..polls {
                    tokio::task::yield_now().await;
                }
                self.check(Read::Contribution)?;
                let usd = self.contributions.borrow().get(&who).copied().unwrap_or(0);
                Ok(CallValue::Uint(U256::from(usd)))
            }
            ReadCall::RewardPoolBalance => {
                self.check(Read::RewardPool)?;
                Ok(CallValue::Uint(self.reward_pool.get().0))
            }
            ReadCall::RewardFor(value) => {
                self.check(Read::RewardFor)?;
                let tokens = value.0 * U256::from(self.reward_rate.get()) / U256::exp10(18);
                Ok(CallValue::Uint(tokens))
            }
            ReadCall::NftTotalSupply => {
                self.check(Read::NftSupply)?;
                Ok(CallValue::Uint(U256::from(self.nft_supply.get())))
            }
            ReadCall::TokenDecimals => {
                self.check(Read::TokenMetadata)?;
                Ok(CallValue::Uint(U256::from(18u8)))
            }
            ReadCall::TokenSymbol => {
                self.check(Read::TokenMetadata)?;
                Ok(CallValue::Text("PICA".into()))
            }
        }
    }

    async fn native_balance(&self, contract: ContractRef) -> Result<Wei, ClientError> {
        self.check(Read::Balance)?;
        match contract {
            ContractRef::Funding => Ok(self.total_raised.get()),
            ContractRef::Nft | ContractRef::RewardToken => Ok(Wei::ZERO),
        }
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.head.get())
    }

    async fn query_historical(
        &self,
        kind: EventKind,
        window: BlockWindow,
    ) -> Result<Vec<LoggedEvent>, ClientError> {
        self.check(Read::Logs)?;
        let head = self.head.get();
        let (from, to) = match window {
            BlockWindow::Lookback(blocks) => (head.saturating_sub(blocks), head),
            BlockWindow::Range { from, to } => (from, to),
        };
        Ok(self
            .logs
            .borrow()
            .iter()
            .filter(|log| log.event.kind() == kind && (from..=to).contains(&log.block_number))
            .cloned()
            .collect())
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockChain {
    async fn request_accounts(&self, explicit: bool) -> Result<Vec<Address>, ClientError> {
        self.account_requests.set(self.account_requests.get() + 1);
        if explicit {
            self.prompts.set(self.prompts.get() + 1);
            if self.reject_authorization.get() {
                return Err(ClientError::Rpc {
                    code: 4001,
                    message: "User rejected the request.".into(),
                });
            }
            self.authorized.set(true);
        }
        if !self.authorized.get() {
            return Ok(Vec::new());
        }
        Ok(self.accounts.borrow().clone())
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(self.chain_id.get())
    }

    fn signer_client(&self, address: &Address) -> Rc<dyn ContractClient> {
        let chain = self.this.upgrade().expect("mock chain dropped while in use");
        chain.client(address)
    }
}

/// Signer bound to one account of a [`MockChain`].
pub struct MockClient {
    chain: Rc<MockChain>,
    address: Address,
}

#[async_trait(?Send)]
impl ContractReader for MockClient {
    async fn call(&self, call: ReadCall) -> Result<CallValue, ClientError> {
        self.chain.call(call).await
    }

    async fn native_balance(&self, contract: ContractRef) -> Result<Wei, ClientError> {
        self.chain.native_balance(contract).await
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        self.chain.block_number().await
    }

    async fn query_historical(
        &self,
        kind: EventKind,
        window: BlockWindow,
    ) -> Result<Vec<LoggedEvent>, ClientError> {
        self.chain.query_historical(kind, window).await
    }
}

#[async_trait(?Send)]
impl ContractClient for MockClient {
    fn reader(&self) -> &dyn ContractReader {
        self.chain.as_ref()
    }

    fn signer_address(&self) -> &Address {
        &self.address
    }

    async fn send(&self, call: WriteCall) -> Result<TxHash, ClientError> {
        if let Some(err) = self.chain.send_error.borrow().clone() {
            return Err(err);
        }
        let WriteCall::Fund { value } = &call;
        let value = *value;
        self.chain.sent.borrow_mut().push((self.address.clone(), call));

        let credit = self.chain.usd_per_fund.get();
        if credit > 0 {
            *self
                .chain
                .contributions
                .borrow_mut()
                .entry(self.address.clone())
                .or_insert(0) += credit;
        }
        self.chain
            .total_raised
            .set(self.chain.total_raised.get().saturating_add(value));
        let logged = self.chain.emit(ContractEvent::Funded {
            funder: self.address.clone(),
            eth_amount: value,
            pica_awarded: Wei::ZERO,
        });
        Ok(TxHash(logged.tx_hash))
    }

    async fn await_confirmation(&self, tx: &TxHash) -> Result<TxReceipt, ClientError> {
        if self.chain.revert.get() {
            return Err(ClientError::Reverted(tx.0.clone()));
        }
        Ok(TxReceipt {
            tx_hash: tx.clone(),
            block_number: self.chain.head.get(),
            success: true,
        })
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<ListenerId, ClientError> {
        let id = self.chain.next_listener.get();
        self.chain.next_listener.set(id + 1);
        self.chain.listeners.borrow_mut().insert(id, (kind, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.chain.listeners.borrow_mut().remove(&id);
    }
}
