//! Wallet session lifecycle.
//!
//! One owned session at a time, acquired by `connect`/`restore_if_eligible`
//! and released by `disconnect`, an emptied account set or a chain change.
//! The "explicitly disconnected" flag survives reloads so a silent restore
//! never reconnects a user who chose to leave.

use crate::error::{ConnectError, NotEligible};
use pf_api_types::Address;
use pf_contract_client::{ClientHandle, ContractClient, ContractReader, WalletProvider};
use pf_storage::DisconnectFlagStore;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// The user pressed connect and may have been prompted.
    UserInitiated,
    /// Reload-time reconnect with already-granted accounts.
    Restored,
    /// The wallet switched its primary account under us.
    AccountSwitch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub address: Address,
    pub origin: SessionOrigin,
    pub chain_id: u64,
}

/// Snapshot handed to the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub address: Option<Address>,
    pub is_connected: bool,
    pub explicitly_disconnected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountChange {
    Unchanged,
    Switched(Session),
    /// Wallet reported no accounts; the session was dropped.
    Disconnected,
    /// No session to update (user disconnected or no wallet).
    Ignored,
}

struct ActiveSession {
    session: Session,
    client: Rc<dyn ContractClient>,
}

pub struct SessionManager {
    provider: Option<Rc<dyn WalletProvider>>,
    read_only: Option<Rc<dyn ContractReader>>,
    store: Rc<dyn DisconnectFlagStore>,
    expected_chain_id: Option<u64>,
    active: RefCell<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(
        provider: Option<Rc<dyn WalletProvider>>,
        read_only: Option<Rc<dyn ContractReader>>,
        store: Rc<dyn DisconnectFlagStore>,
        expected_chain_id: Option<u64>,
    ) -> Self {
        Self {
            provider,
            read_only,
            store,
            expected_chain_id,
            active: RefCell::new(None),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn session(&self) -> Option<Session> {
        self.active.borrow().as_ref().map(|active| active.session.clone())
    }

    pub fn address(&self) -> Option<Address> {
        self.active
            .borrow()
            .as_ref()
            .map(|active| active.session.address.clone())
    }

    pub fn state(&self) -> SessionState {
        let address = self.address();
        SessionState {
            is_connected: address.is_some(),
            address,
            explicitly_disconnected: self.explicitly_disconnected(),
        }
    }

    fn explicitly_disconnected(&self) -> bool {
        self.store.load_disconnected().unwrap_or_else(|err| {
            warn!(error = %err, "could not read disconnect flag; assuming not set");
            false
        })
    }

    /// Best client available right now: the session signer, else the public reader.
    pub fn client(&self) -> ClientHandle {
        if let Some(active) = self.active.borrow().as_ref() {
            return ClientHandle::Signer(Rc::clone(&active.client));
        }
        match &self.read_only {
            Some(reader) => ClientHandle::ReadOnly(Rc::clone(reader)),
            None => ClientHandle::NoClient,
        }
    }

    pub fn signer(&self) -> Option<(Session, Rc<dyn ContractClient>)> {
        self.active
            .borrow()
            .as_ref()
            .map(|active| (active.session.clone(), Rc::clone(&active.client)))
    }

    pub async fn connect(&self, explicit: bool) -> Result<Session, ConnectError> {
        let provider = self.provider.clone().ok_or(ConnectError::NoProviderFound)?;
        let accounts = provider.request_accounts(explicit).await?;
        let Some(address) = accounts.into_iter().next() else {
            return Err(ConnectError::ProviderError("wallet returned no accounts".into()));
        };
        let origin = if explicit {
            SessionOrigin::UserInitiated
        } else {
            SessionOrigin::Restored
        };
        self.open(provider.as_ref(), address, origin).await
    }

    pub async fn restore_if_eligible(&self) -> Result<Session, NotEligible> {
        if self.explicitly_disconnected() {
            info!("skipping wallet restore: user disconnected explicitly");
            return Err(NotEligible::ExplicitlyDisconnected);
        }
        let Some(provider) = self.provider.clone() else {
            return Err(NotEligible::NoProviderFound);
        };
        let accounts = provider
            .request_accounts(false)
            .await
            .map_err(|err| NotEligible::Failed(err.into()))?;
        let Some(address) = accounts.into_iter().next() else {
            return Err(NotEligible::NoAuthorizedAccounts);
        };
        self.open(provider.as_ref(), address, SessionOrigin::Restored)
            .await
            .map_err(NotEligible::Failed)
    }

    async fn open(
        &self,
        provider: &dyn WalletProvider,
        address: Address,
        origin: SessionOrigin,
    ) -> Result<Session, ConnectError> {
        let chain_id = provider.chain_id().await?;
        if let Some(expected) = self.expected_chain_id {
            if expected != chain_id {
                return Err(ConnectError::WrongNetwork {
                    expected,
                    actual: chain_id,
                });
            }
        }

        let client = provider.signer_client(&address);
        if let Err(err) = self.store.save_disconnected(false) {
            warn!(error = %err, "could not clear disconnect flag");
        }

        let session = Session {
            address,
            origin,
            chain_id,
        };
        info!(address = %session.address, ?origin, chain_id, "wallet session established");
        *self.active.borrow_mut() = Some(ActiveSession {
            session: session.clone(),
            client,
        });
        Ok(session)
    }

    /// Drops the session and remembers the choice across reloads.
    pub fn disconnect(&self) {
        let previous = self.active.borrow_mut().take();
        if let Err(err) = self.store.save_disconnected(true) {
            warn!(error = %err, "could not persist disconnect flag");
        }
        if let Some(active) = previous {
            info!(address = %active.session.address, "wallet disconnected by user");
        }
    }

    /// Drops the in-memory session without touching the persisted flag.
    pub fn invalidate(&self) {
        self.active.borrow_mut().take();
    }

    pub async fn on_accounts_changed(
        &self,
        accounts: &[Address],
    ) -> Result<AccountChange, ConnectError> {
        let Some(primary) = accounts.first().cloned() else {
            if self.active.borrow_mut().take().is_some() {
                info!("wallet removed all accounts; session closed");
                return Ok(AccountChange::Disconnected);
            }
            return Ok(AccountChange::Ignored);
        };

        let current = self.session();
        if current.as_ref().map(|s| &s.address) == Some(&primary) {
            return Ok(AccountChange::Unchanged);
        }
        if current.is_none() && self.explicitly_disconnected() {
            return Ok(AccountChange::Ignored);
        }
        let Some(provider) = self.provider.clone() else {
            return Ok(AccountChange::Ignored);
        };

        // The old signer must not outlive the account it was bound to.
        self.invalidate();
        let session = self
            .open(provider.as_ref(), primary, SessionOrigin::AccountSwitch)
            .await?;
        Ok(AccountChange::Switched(session))
    }

    /// Any chain change invalidates the session; the caller rebuilds its world view.
    pub fn on_chain_changed(&self, chain_id: u64) {
        if let Some(active) = self.active.borrow_mut().take() {
            warn!(
                address = %active.session.address,
                from = active.session.chain_id,
                to = chain_id,
                "chain changed; session invalidated"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockChain, addr};
    use pf_storage::InMemoryFlagStore;

    fn manager(chain: &Rc<MockChain>, store: &Rc<InMemoryFlagStore>) -> SessionManager {
        SessionManager::new(Some(chain.wallet()), None, store.clone(), None)
    }

    #[tokio::test]
    async fn explicit_connect_prompts_and_clears_flag() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let store = Rc::new(InMemoryFlagStore::with_flag(true));
        let sessions = manager(&chain, &store);

        let session = sessions.connect(true).await.unwrap();
        assert_eq!(session.address, addr(1));
        assert_eq!(session.origin, SessionOrigin::UserInitiated);
        assert_eq!(chain.prompts.get(), 1);
        assert!(!store.load_disconnected().unwrap());
        assert!(sessions.state().is_connected);
        assert!(matches!(sessions.client(), ClientHandle::Signer(_)));
    }

    #[tokio::test]
    async fn connect_without_provider_fails() {
        let store = Rc::new(InMemoryFlagStore::default());
        let sessions = SessionManager::new(None, None, store, None);
        assert_eq!(sessions.connect(true).await, Err(ConnectError::NoProviderFound));
        assert!(matches!(sessions.client(), ClientHandle::NoClient));
    }

    #[tokio::test]
    async fn declined_prompt_is_user_rejected() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.reject_authorization.set(true);
        let store = Rc::new(InMemoryFlagStore::default());
        let sessions = manager(&chain, &store);

        assert_eq!(sessions.connect(true).await, Err(ConnectError::UserRejected));
        assert!(sessions.session().is_none());
    }

    #[tokio::test]
    async fn disconnect_then_reload_skips_restore_until_explicit_connect() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let store = Rc::new(InMemoryFlagStore::default());

        let first_page = manager(&chain, &store);
        first_page.connect(true).await.unwrap();
        first_page.disconnect();
        assert!(first_page.session().is_none());

        let requests_before = chain.account_requests.get();
        let reloaded = manager(&chain, &store);
        assert_eq!(
            reloaded.restore_if_eligible().await,
            Err(NotEligible::ExplicitlyDisconnected)
        );
        assert_eq!(chain.account_requests.get(), requests_before);
        assert!(reloaded.state().explicitly_disconnected);

        reloaded.connect(true).await.unwrap();
        let reloaded_again = manager(&chain, &store);
        let restored = reloaded_again.restore_if_eligible().await.unwrap();
        assert_eq!(restored.origin, SessionOrigin::Restored);
        assert_eq!(chain.prompts.get(), 2);
    }

    #[tokio::test]
    async fn restore_without_granted_accounts_is_not_eligible() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.authorized.set(false);
        let store = Rc::new(InMemoryFlagStore::default());
        let sessions = manager(&chain, &store);

        assert_eq!(
            sessions.restore_if_eligible().await,
            Err(NotEligible::NoAuthorizedAccounts)
        );
        assert_eq!(chain.prompts.get(), 0);
    }

    #[tokio::test]
    async fn wrong_network_is_refused() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        chain.chain_id.set(5);
        let store = Rc::new(InMemoryFlagStore::default());
        let sessions = SessionManager::new(Some(chain.wallet()), None, store, Some(1));

        assert_eq!(
            sessions.connect(true).await,
            Err(ConnectError::WrongNetwork {
                expected: 1,
                actual: 5
            })
        );
    }

    #[tokio::test]
    async fn account_changes_follow_the_primary_account() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let store = Rc::new(InMemoryFlagStore::default());
        let sessions = manager(&chain, &store);
        sessions.connect(true).await.unwrap();

        assert_eq!(
            sessions.on_accounts_changed(&[addr(1)]).await.unwrap(),
            AccountChange::Unchanged
        );

        let change = sessions.on_accounts_changed(&[addr(2), addr(1)]).await.unwrap();
        let AccountChange::Switched(session) = change else {
            panic!("expected a switch, got {change:?}");
        };
        assert_eq!(session.address, addr(2));
        assert_eq!(sessions.address(), Some(addr(2)));

        assert_eq!(
            sessions.on_accounts_changed(&[]).await.unwrap(),
            AccountChange::Disconnected
        );
        assert!(sessions.session().is_none());
        // Wallet-side removal is not an explicit disconnect.
        assert!(!store.load_disconnected().unwrap());
    }

    #[tokio::test]
    async fn account_change_after_explicit_disconnect_is_ignored() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let store = Rc::new(InMemoryFlagStore::default());
        let sessions = manager(&chain, &store);
        sessions.connect(true).await.unwrap();
        sessions.disconnect();

        assert_eq!(
            sessions.on_accounts_changed(&[addr(3)]).await.unwrap(),
            AccountChange::Ignored
        );
        assert!(sessions.session().is_none());
    }

    #[tokio::test]
    async fn chain_change_invalidates_session_and_falls_back_to_reader() {
        let chain = MockChain::with_accounts(&[addr(1)]);
        let store = Rc::new(InMemoryFlagStore::default());
        let reader: Rc<dyn ContractReader> = chain.reader();
        let sessions = SessionManager::new(Some(chain.wallet()), Some(reader), store, None);
        sessions.connect(true).await.unwrap();

        sessions.on_chain_changed(137);
        assert!(sessions.session().is_none());
        assert!(matches!(sessions.client(), ClientHandle::ReadOnly(_)));
    }
}
