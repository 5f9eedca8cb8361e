//! Pulls on-chain state into the view.
//!
//! Every refresh takes a sequence number when it starts. A response older
//! than the last applied one for the same slot is dropped, so a slow read
//! can never overwrite a newer snapshot.

use crate::error::DappError;
use crate::funders::aggregate_funders;
use pf_api_types::{
    Address, ContractRef, ContributionSnapshot, ETHER_DECIMALS, EventKind, PoolSnapshot, Tier, Wei,
};
use pf_contract_client::{BlockWindow, CallValue, ClientError, ClientHandle, ReadCall};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use tracing::{debug, warn};

pub const DEFAULT_REWARD_SYMBOL: &str = "PICA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierTransition {
    /// First crossing of the lowest threshold; the contract mints an NFT.
    FirstNft(Tier),
    Upgraded { from: Tier, to: Tier },
}

impl TierTransition {
    pub fn between(previous: Tier, next: Tier) -> Option<Self> {
        if next <= previous {
            None
        } else if previous == Tier::None {
            Some(TierTransition::FirstNft(next))
        } else {
            Some(TierTransition::Upgraded {
                from: previous,
                to: next,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionUpdate {
    pub owner: Option<Address>,
    pub snapshot: ContributionSnapshot,
    pub transition: Option<TierTransition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome<T> {
    Applied(T),
    /// A newer refresh already landed; nothing was changed.
    Superseded,
    /// The read failed; the previous snapshot is still displayed.
    Failed(DappError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRead {
    RewardBalance,
    TotalRaised,
    NftSupply,
    Funders,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolRefresh {
    pub snapshot: PoolSnapshot,
    /// Sub-reads that failed and were replaced by zero/empty values.
    pub failed: Vec<(PoolRead, DappError)>,
    pub superseded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: usize,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_REWARD_SYMBOL.to_owned(),
            decimals: ETHER_DECIMALS,
        }
    }
}

/// Everything the page renders from chain state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub contribution_owner: Option<Address>,
    pub contribution: ContributionSnapshot,
    pub pool: PoolSnapshot,
    pub token: TokenMetadata,
}

pub struct RefreshEngine {
    lookback_blocks: u64,
    leaderboard_size: usize,
    issued: Cell<u64>,
    user_applied: Cell<u64>,
    pool_applied: Cell<u64>,
    view: RefCell<ViewState>,
}

impl RefreshEngine {
    pub fn new(lookback_blocks: u64, leaderboard_size: usize) -> Self {
        Self {
            lookback_blocks,
            leaderboard_size,
            issued: Cell::new(0),
            user_applied: Cell::new(0),
            pool_applied: Cell::new(0),
            view: RefCell::new(ViewState::default()),
        }
    }

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    fn issue(&self) -> u64 {
        let seq = self.issued.get() + 1;
        self.issued.set(seq);
        seq
    }

    fn accept(slot: &Cell<u64>, seq: u64) -> bool {
        if seq <= slot.get() {
            return false;
        }
        slot.set(seq);
        true
    }

    /// Clears the user snapshot and voids every user refresh still in flight.
    pub fn reset_user(&self) {
        let watermark = self.issue();
        self.user_applied.set(watermark);
        let mut view = self.view.borrow_mut();
        view.contribution_owner = None;
        view.contribution = ContributionSnapshot::default();
    }

    pub async fn refresh_user_contribution(
        &self,
        address: Option<&Address>,
        client: &ClientHandle,
    ) -> RefreshOutcome<ContributionUpdate> {
        let seq = self.issue();
        let (Some(address), Some(reader)) = (address, client.reader()) else {
            if !Self::accept(&self.user_applied, seq) {
                return RefreshOutcome::Superseded;
            }
            let mut view = self.view.borrow_mut();
            view.contribution_owner = None;
            view.contribution = ContributionSnapshot::default();
            return RefreshOutcome::Applied(ContributionUpdate {
                owner: None,
                snapshot: ContributionSnapshot::default(),
                transition: None,
            });
        };

        let result = reader
            .call(ReadCall::ContributionUsd(address.clone()))
            .await
            .and_then(CallValue::into_uint);

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                if seq <= self.user_applied.get() {
                    return RefreshOutcome::Superseded;
                }
                warn!(address = %address, error = %err, "user contribution read failed");
                return RefreshOutcome::Failed(DappError::read(&err));
            }
        };

        if !Self::accept(&self.user_applied, seq) {
            debug!(seq, "discarding superseded contribution response");
            return RefreshOutcome::Superseded;
        }

        let snapshot = ContributionSnapshot::from_usd(Wei(raw).saturating_u64() as f64);
        let mut view = self.view.borrow_mut();
        let transition = if view.contribution_owner.as_ref() == Some(address) {
            TierTransition::between(view.contribution.tier, snapshot.tier)
        } else {
            None
        };
        view.contribution_owner = Some(address.clone());
        view.contribution = snapshot.clone();
        debug!(
            address = %address,
            usd = snapshot.user_usd_contributed,
            tier = ?snapshot.tier,
            "contribution refreshed"
        );

        RefreshOutcome::Applied(ContributionUpdate {
            owner: Some(address.clone()),
            snapshot,
            transition,
        })
    }

    /// Best effort: each sub-read that fails is zeroed without aborting the others.
    pub async fn refresh_pool_snapshot(&self, client: &ClientHandle) -> PoolRefresh {
        let seq = self.issue();
        let Some(reader) = client.reader() else {
            let snapshot = PoolSnapshot::default();
            let superseded = !self.apply_pool(seq, &snapshot);
            return PoolRefresh {
                snapshot,
                failed: Vec::new(),
                superseded,
            };
        };

        let (reward, raised, supply, funded) = tokio::join!(
            reader.call(ReadCall::RewardPoolBalance),
            reader.native_balance(ContractRef::Funding),
            reader.call(ReadCall::NftTotalSupply),
            reader.query_historical(EventKind::Funded, BlockWindow::Lookback(self.lookback_blocks)),
        );

        let mut failed = Vec::new();
        let reward_token_balance = absorb(
            PoolRead::RewardBalance,
            reward.and_then(CallValue::into_uint).map(Wei),
            &mut failed,
        )
        .unwrap_or_default();
        let total_raised_wei =
            absorb(PoolRead::TotalRaised, raised, &mut failed).unwrap_or_default();
        let nft_supply = absorb(
            PoolRead::NftSupply,
            supply.and_then(CallValue::into_uint).map(|raw| Wei(raw).saturating_u64()),
            &mut failed,
        )
        .unwrap_or_default();
        let events = absorb(PoolRead::Funders, funded, &mut failed).unwrap_or_default();

        let aggregate = aggregate_funders(
            events.iter().map(|logged| &logged.event),
            self.leaderboard_size,
        );
        let snapshot = PoolSnapshot {
            total_raised_wei,
            reward_token_balance,
            nft_supply,
            funder_leaderboard: aggregate.leaderboard,
            distinct_funders: aggregate.distinct_funders,
        };

        let superseded = !self.apply_pool(seq, &snapshot);
        debug!(
            seq,
            superseded,
            failures = failed.len(),
            funders = snapshot.distinct_funders,
            "pool snapshot refreshed"
        );
        PoolRefresh {
            snapshot,
            failed,
            superseded,
        }
    }

    fn apply_pool(&self, seq: u64, snapshot: &PoolSnapshot) -> bool {
        if !Self::accept(&self.pool_applied, seq) {
            return false;
        }
        self.view.borrow_mut().pool = snapshot.clone();
        true
    }

    /// Symbol and decimals of the reward token; falls back to `PICA`/18.
    pub async fn load_token_metadata(&self, client: &ClientHandle) -> TokenMetadata {
        let Some(reader) = client.reader() else {
            return self.view.borrow().token.clone();
        };
        let (symbol, decimals) = tokio::join!(
            reader.call(ReadCall::TokenSymbol),
            reader.call(ReadCall::TokenDecimals),
        );

        let mut token = TokenMetadata::default();
        match symbol.and_then(CallValue::into_text) {
            Ok(symbol) if !symbol.trim().is_empty() => token.symbol = symbol,
            Ok(_) => {}
            Err(err) => warn!(error = %err, "reward token symbol read failed"),
        }
        match decimals.and_then(CallValue::into_uint) {
            Ok(raw) => token.decimals = Wei(raw).saturating_u64().min(u64::from(u8::MAX)) as usize,
            Err(err) => warn!(error = %err, "reward token decimals read failed"),
        }

        self.view.borrow_mut().token = token.clone();
        token
    }
}

fn absorb<T>(
    read: PoolRead,
    result: Result<T, ClientError>,
    failed: &mut Vec<(PoolRead, DappError)>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(?read, error = %err, "pool read failed; using empty value");
            failed.push((read, DappError::read(&err)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockChain, Read, addr};
    use pf_api_types::ContractEvent;
    use std::rc::Rc;

    fn engine() -> RefreshEngine {
        RefreshEngine::new(10_000, 10)
    }

    fn signer(chain: &Rc<MockChain>, who: &Address) -> ClientHandle {
        ClientHandle::Signer(chain.client(who))
    }

    #[test]
    fn tier_transitions() {
        assert_eq!(TierTransition::between(Tier::None, Tier::None), None);
        assert_eq!(
            TierTransition::between(Tier::None, Tier::Bronze),
            Some(TierTransition::FirstNft(Tier::Bronze))
        );
        assert_eq!(
            TierTransition::between(Tier::Bronze, Tier::Gold),
            Some(TierTransition::Upgraded {
                from: Tier::Bronze,
                to: Tier::Gold
            })
        );
        assert_eq!(TierTransition::between(Tier::Silver, Tier::Bronze), None);
    }

    #[test]
    fn first_nft_fires_once_at_the_crossing() {
        let steps = [9.99, 9.99 + 0.02, 10.01, 10.5];
        let mut previous = Tier::None;
        let mut signals = Vec::new();
        for usd in steps {
            let snapshot = ContributionSnapshot::from_usd(usd);
            signals.push(TierTransition::between(previous, snapshot.tier));
            previous = snapshot.tier;
        }
        assert_eq!(
            signals,
            vec![None, Some(TierTransition::FirstNft(Tier::Bronze)), None, None]
        );
    }

    #[tokio::test]
    async fn no_session_yields_empty_snapshot() {
        let engine = engine();
        let outcome = engine.refresh_user_contribution(None, &ClientHandle::NoClient).await;
        let RefreshOutcome::Applied(update) = outcome else {
            panic!("expected an applied update");
        };
        assert_eq!(update.snapshot, ContributionSnapshot::default());
        assert_eq!(update.snapshot.tier, Tier::None);
    }

    #[tokio::test]
    async fn maps_contribution_to_tier() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.set_contribution(&addr(1), 150);
        let engine = engine();

        let outcome = engine
            .refresh_user_contribution(Some(&addr(1)), &signer(&chain, &addr(1)))
            .await;
        let RefreshOutcome::Applied(update) = outcome else {
            panic!("expected an applied update");
        };
        assert_eq!(update.snapshot.tier, Tier::Silver);
        assert_eq!(update.snapshot.user_usd_contributed, 150.0);
        assert_eq!(update.transition, None);
        assert_eq!(engine.view().contribution_owner, Some(addr(1)));
    }

    #[tokio::test]
    async fn failed_read_keeps_previous_snapshot() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.set_contribution(&addr(1), 50);
        let engine = engine();
        let client = signer(&chain, &addr(1));
        engine.refresh_user_contribution(Some(&addr(1)), &client).await;

        chain.fail(Read::Contribution);
        let outcome = engine.refresh_user_contribution(Some(&addr(1)), &client).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(DappError::ReadFailure(_))));
        assert_eq!(engine.view().contribution.user_usd_contributed, 50.0);
    }

    #[tokio::test]
    async fn crossing_between_refreshes_reports_transition() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.set_contribution(&addr(1), 9);
        let engine = engine();
        let client = signer(&chain, &addr(1));
        engine.refresh_user_contribution(Some(&addr(1)), &client).await;

        chain.set_contribution(&addr(1), 10);
        let outcome = engine.refresh_user_contribution(Some(&addr(1)), &client).await;
        let RefreshOutcome::Applied(update) = outcome else {
            panic!("expected an applied update");
        };
        assert_eq!(update.transition, Some(TierTransition::FirstNft(Tier::Bronze)));

        let outcome = engine.refresh_user_contribution(Some(&addr(1)), &client).await;
        let RefreshOutcome::Applied(update) = outcome else {
            panic!("expected an applied update");
        };
        assert_eq!(update.transition, None);
    }

    #[tokio::test]
    async fn slow_stale_response_is_discarded() {
        let chain = MockChain::with_accounts(&[addr(1), addr(2)]);
        chain.set_contribution(&addr(1), 5);
        chain.set_contribution(&addr(2), 500);
        chain.slow_down(&addr(1), 5);
        let engine = engine();
        let client = signer(&chain, &addr(1));
        let (first, second) = (addr(1), addr(2));

        let (slow, fast) = tokio::join!(
            engine.refresh_user_contribution(Some(&first), &client),
            engine.refresh_user_contribution(Some(&second), &client),
        );
        assert_eq!(slow, RefreshOutcome::Superseded);
        assert!(matches!(fast, RefreshOutcome::Applied(_)));
        assert_eq!(engine.view().contribution_owner, Some(addr(2)));
        assert_eq!(engine.view().contribution.tier, Tier::Silver);
    }

    #[tokio::test]
    async fn reset_voids_in_flight_user_refresh() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.set_contribution(&addr(1), 5_000);
        chain.slow_down(&addr(1), 3);
        let engine = engine();
        let client = signer(&chain, &addr(1));
        let owner = addr(1);

        let (outcome, ()) = tokio::join!(
            engine.refresh_user_contribution(Some(&owner), &client),
            async {
                tokio::task::yield_now().await;
                engine.reset_user();
            }
        );
        assert_eq!(outcome, RefreshOutcome::Superseded);
        assert_eq!(engine.view().contribution, ContributionSnapshot::default());
    }

    #[tokio::test]
    async fn pool_snapshot_aggregates_funders() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.set_pool(Wei::from_u64(3_000), Wei::from_u64(77), 4);
        chain.push_funded(&addr(1), 100, 1_000);
        chain.push_funded(&addr(2), 300, 901);
        chain.push_funded(&addr(1), 250, 902);
        let engine = engine();

        let refresh = engine.refresh_pool_snapshot(&ClientHandle::ReadOnly(chain.reader())).await;
        assert!(refresh.failed.is_empty());
        assert!(!refresh.superseded);
        let snapshot = refresh.snapshot;
        assert_eq!(snapshot.total_raised_wei, Wei::from_u64(3_000));
        assert_eq!(snapshot.reward_token_balance, Wei::from_u64(77));
        assert_eq!(snapshot.nft_supply, 4);
        assert_eq!(snapshot.distinct_funders, 2);
        assert_eq!(snapshot.funder_leaderboard[0].address, addr(1));
        assert_eq!(snapshot.funder_leaderboard[0].cumulative_wei, Wei::from_u64(350));
        assert_eq!(engine.view().pool, snapshot);
    }

    #[tokio::test]
    async fn nft_supply_failure_is_isolated() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.set_pool(Wei::from_u64(3_000), Wei::from_u64(77), 4);
        chain.push_funded(&addr(1), 100, 1_000);
        chain.fail(Read::NftSupply);
        let engine = engine();

        let refresh = engine.refresh_pool_snapshot(&ClientHandle::ReadOnly(chain.reader())).await;
        assert_eq!(refresh.snapshot.nft_supply, 0);
        assert_eq!(refresh.snapshot.total_raised_wei, Wei::from_u64(3_000));
        assert_eq!(refresh.snapshot.reward_token_balance, Wei::from_u64(77));
        assert_eq!(refresh.snapshot.distinct_funders, 1);
        assert_eq!(refresh.failed.len(), 1);
        assert_eq!(refresh.failed[0].0, PoolRead::NftSupply);
    }

    #[tokio::test]
    async fn every_pool_read_failing_still_returns_a_snapshot() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        for read in [Read::RewardPool, Read::Balance, Read::NftSupply, Read::Logs] {
            chain.fail(read);
        }
        let engine = engine();

        let refresh = engine.refresh_pool_snapshot(&ClientHandle::ReadOnly(chain.reader())).await;
        assert_eq!(refresh.snapshot, PoolSnapshot::default());
        assert_eq!(refresh.failed.len(), 4);
    }

    #[tokio::test]
    async fn lookback_window_excludes_old_funding() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.head.set(20_000);
        chain.push_funded(&addr(1), 100, 5_000);
        chain.push_funded(&addr(2), 1, 15_000);
        let engine = engine();

        let refresh = engine.refresh_pool_snapshot(&ClientHandle::ReadOnly(chain.reader())).await;
        assert_eq!(refresh.snapshot.distinct_funders, 1);
        assert_eq!(refresh.snapshot.funder_leaderboard[0].address, addr(2));
    }

    #[tokio::test]
    async fn no_client_pool_is_empty() {
        let engine = engine();
        let refresh = engine.refresh_pool_snapshot(&ClientHandle::NoClient).await;
        assert_eq!(refresh.snapshot, PoolSnapshot::default());
        assert!(refresh.failed.is_empty());
    }

    #[tokio::test]
    async fn token_metadata_falls_back_on_failure() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let engine = engine();
        let token = engine.load_token_metadata(&ClientHandle::ReadOnly(chain.reader())).await;
        assert_eq!(token.symbol, "PICA");
        assert_eq!(token.decimals, 18);

        chain.fail(Read::TokenMetadata);
        let token = engine.load_token_metadata(&ClientHandle::ReadOnly(chain.reader())).await;
        assert_eq!(token, TokenMetadata::default());
    }

    #[test]
    fn funded_event_kind_is_used_for_aggregation() {
        let event = ContractEvent::Funded {
            funder: addr(1),
            eth_amount: Wei::from_u64(1),
            pica_awarded: Wei::ZERO,
        };
        assert_eq!(event.kind(), EventKind::Funded);
    }
}
