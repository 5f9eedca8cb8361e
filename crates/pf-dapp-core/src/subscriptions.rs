//! Live contract event subscriptions, one set per session.
//!
//! Handlers only forward events into a channel tagged with the subscription
//! generation. Dropping the [`SubscriptionHandle`] removes every listener, and
//! the consumer drops events whose generation is no longer current.

use crate::format;
use crate::refresh::TokenMetadata;
use pf_api_types::{Address, ContractEvent, EventKind, LoggedEvent, NotificationKind, Tier};
use pf_contract_client::{ClientError, ContractClient, EventHandler, ListenerId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: LoggedEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed { owner: Address, generation: u64 },
}

/// Owns the listeners registered for one session.
pub struct SubscriptionHandle {
    client: Rc<dyn ContractClient>,
    owner: Address,
    generation: u64,
    listeners: Vec<ListenerId>,
}

impl SubscriptionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        for id in self.listeners.drain(..) {
            self.client.unsubscribe(id);
        }
        debug!(owner = %self.owner, generation = self.generation, "event listeners removed");
    }
}

pub struct EventSubscriptionManager {
    sink: UnboundedSender<TaggedEvent>,
    next_generation: Cell<u64>,
    active: RefCell<Option<SubscriptionHandle>>,
}

impl EventSubscriptionManager {
    pub fn new(sink: UnboundedSender<TaggedEvent>) -> Self {
        Self {
            sink,
            next_generation: Cell::new(1),
            active: RefCell::new(None),
        }
    }

    /// Registers listeners for every event kind. Calling it again for the same
    /// owner and client is a no-op returning the current generation.
    pub fn subscribe(
        &self,
        owner: &Address,
        client: &Rc<dyn ContractClient>,
    ) -> Result<u64, ClientError> {
        if let Some(handle) = self.active.borrow().as_ref() {
            let same_client = std::ptr::addr_eq(Rc::as_ptr(&handle.client), Rc::as_ptr(client));
            if &handle.owner == owner && same_client {
                return Ok(handle.generation);
            }
        }
        self.unsubscribe();

        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);

        let mut listeners = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            let sink = self.sink.clone();
            let handler: EventHandler = Rc::new(move |event| {
                // Receiver gone means the app is shutting down.
                let _ = sink.send(TaggedEvent { generation, event });
            });
            match client.subscribe(kind, handler) {
                Ok(id) => listeners.push(id),
                Err(err) => {
                    for id in listeners {
                        client.unsubscribe(id);
                    }
                    return Err(err);
                }
            }
        }

        info!(owner = %owner, generation, "subscribed to contract events");
        *self.active.borrow_mut() = Some(SubscriptionHandle {
            client: Rc::clone(client),
            owner: owner.clone(),
            generation,
            listeners,
        });
        Ok(generation)
    }

    /// Tears down the current listeners; returns whether any were active.
    pub fn unsubscribe(&self) -> bool {
        let handle = self.active.borrow_mut().take();
        handle.is_some()
    }

    pub fn state(&self) -> SubscriptionState {
        match self.active.borrow().as_ref() {
            Some(handle) => SubscriptionState::Subscribed {
                owner: handle.owner.clone(),
                generation: handle.generation,
            },
            None => SubscriptionState::Unsubscribed,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .borrow()
            .as_ref()
            .is_some_and(|handle| handle.generation == generation)
    }
}

/// What a live event asks the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    RefreshPool,
    RefreshUser,
    Notify {
        kind: NotificationKind,
        title: String,
        message: String,
    },
}

pub fn react(
    event: &ContractEvent,
    session: Option<&Address>,
    token: &TokenMetadata,
) -> Vec<Reaction> {
    let mine = session.is_some_and(|address| address == event.subject());
    match event {
        ContractEvent::Funded { pica_awarded, .. } => {
            let mut reactions = vec![Reaction::RefreshPool];
            if mine {
                reactions.push(Reaction::RefreshUser);
                reactions.push(Reaction::Notify {
                    kind: NotificationKind::Success,
                    title: "Contribution received".into(),
                    message: format!(
                        "You were awarded {} {}",
                        format::token(*pica_awarded, token.decimals, format::REWARD_PREVIEW_WIDTH),
                        token.symbol
                    ),
                });
            }
            reactions
        }
        ContractEvent::NftMinted { .. } if mine => vec![
            Reaction::Notify {
                kind: NotificationKind::Success,
                title: "NFT minted".into(),
                message: "🎉 Congratulations! You just received your BRABO NFT!".into(),
            },
            Reaction::RefreshUser,
        ],
        ContractEvent::TierUpgraded { total_usd, .. } if mine => {
            let tier = Tier::for_usd(total_usd.saturating_u64() as f64);
            vec![
                Reaction::Notify {
                    kind: NotificationKind::Success,
                    title: "Tier upgraded".into(),
                    message: format!("🎊 Your NFT has been upgraded to {} tier!", tier.label()),
                },
                Reaction::RefreshUser,
            ]
        }
        ContractEvent::NftMinted { .. } | ContractEvent::TierUpgraded { .. } => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockChain, addr, ether};
    use pf_api_types::Wei;
    use tokio::sync::mpsc;

    fn funded(who: &Address) -> ContractEvent {
        ContractEvent::Funded {
            funder: who.clone(),
            eth_amount: Wei::from_u64(1),
            pica_awarded: ether(4_000),
        }
    }

    #[test]
    fn subscribe_is_idempotent_per_session() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = EventSubscriptionManager::new(tx);
        let client = chain.client(&addr(1));

        let first = manager.subscribe(&addr(1), &client).unwrap();
        let second = manager.subscribe(&addr(1), &client).unwrap();
        assert_eq!(first, second);
        assert_eq!(chain.listener_count(), EventKind::ALL.len());

        chain.emit(funded(&addr(1)));
        assert_eq!(rx.try_recv().unwrap().generation, first);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_removes_every_listener() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = EventSubscriptionManager::new(tx);
        manager.subscribe(&addr(1), &chain.client(&addr(1))).unwrap();

        assert!(manager.unsubscribe());
        assert!(!manager.unsubscribe());
        assert_eq!(chain.listener_count(), 0);
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);

        chain.emit(funded(&addr(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn new_owner_replaces_previous_generation() {
        let chain = MockChain::with_accounts(&[addr(1), addr(2)]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = EventSubscriptionManager::new(tx);

        let old = manager.subscribe(&addr(1), &chain.client(&addr(1))).unwrap();
        let new = manager.subscribe(&addr(2), &chain.client(&addr(2))).unwrap();
        assert_ne!(old, new);
        assert!(!manager.is_current(old));
        assert!(manager.is_current(new));
        assert_eq!(chain.listener_count(), EventKind::ALL.len());

        chain.emit(funded(&addr(1)));
        let tagged = rx.try_recv().unwrap();
        assert_eq!(tagged.generation, new);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn funding_by_someone_else_only_refreshes_pool() {
        let reactions = react(&funded(&addr(2)), Some(&addr(1)), &TokenMetadata::default());
        assert_eq!(reactions, vec![Reaction::RefreshPool]);
    }

    #[test]
    fn own_funding_refreshes_user_and_reports_reward() {
        let reactions = react(&funded(&addr(1)), Some(&addr(1)), &TokenMetadata::default());
        assert_eq!(reactions[0], Reaction::RefreshPool);
        assert_eq!(reactions[1], Reaction::RefreshUser);
        let Reaction::Notify { kind, message, .. } = &reactions[2] else {
            panic!("expected a notification");
        };
        assert_eq!(*kind, NotificationKind::Success);
        assert_eq!(message, "You were awarded 4000.0 PICA");
    }

    #[test]
    fn nft_and_tier_events_only_concern_their_subject() {
        let minted = ContractEvent::NftMinted { recipient: addr(1) };
        assert!(react(&minted, Some(&addr(2)), &TokenMetadata::default()).is_empty());
        assert!(react(&minted, None, &TokenMetadata::default()).is_empty());
        assert_eq!(react(&minted, Some(&addr(1)), &TokenMetadata::default()).len(), 2);

        let upgraded = ContractEvent::TierUpgraded {
            user: addr(1),
            total_usd: Wei::from_u64(150),
        };
        let reactions = react(&upgraded, Some(&addr(1)), &TokenMetadata::default());
        assert_eq!(
            reactions[0],
            Reaction::Notify {
                kind: NotificationKind::Success,
                title: "Tier upgraded".into(),
                message: "🎊 Your NFT has been upgraded to Silver tier!".into(),
            }
        );
    }
}
