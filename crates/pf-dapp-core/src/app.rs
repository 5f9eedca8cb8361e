//! The front end's single owner of session, refresh, subscription and
//! notification state. The UI layer drives it with user actions and wallet
//! signals and renders whatever arrives on the `UiEvent` channel.

use crate::config::DappConfig;
use crate::error::{ConnectError, DappError, NotEligible};
use crate::funding::{self, RewardPreview};
use crate::notify::NotificationCenter;
use crate::refresh::{
    ContributionUpdate, RefreshEngine, RefreshOutcome, TierTransition, TokenMetadata, ViewState,
};
use crate::session::{AccountChange, Session, SessionManager, SessionState};
use crate::subscriptions::{EventSubscriptionManager, Reaction, TaggedEvent, react};
use pf_api_types::{Address, ContributionSnapshot, Notification, NotificationKind, PoolSnapshot};
use pf_contract_client::{
    ContractClient, ContractReader, TxHash, TxReceipt, WalletProvider, WriteCall,
};
use pf_storage::DisconnectFlagStore;
use std::rc::Rc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Milliseconds since some fixed origin; only differences matter.
pub type Clock = Rc<dyn Fn() -> u64>;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    SessionChanged(SessionState),
    ContributionUpdated(ContributionUpdate),
    PoolUpdated(PoolSnapshot),
    TokenLoaded(TokenMetadata),
    TierChanged(TierTransition),
    Notify(Notification),
    /// The wallet moved to another chain; everything must be rebuilt.
    ReinitRequired,
}

pub struct DappChannels {
    pub ui_events: UnboundedReceiver<UiEvent>,
    pub contract_events: UnboundedReceiver<TaggedEvent>,
}

pub struct Dapp {
    config: DappConfig,
    sessions: SessionManager,
    refresh: RefreshEngine,
    subscriptions: EventSubscriptionManager,
    notifications: NotificationCenter,
    ui: UnboundedSender<UiEvent>,
    clock: Clock,
}

impl Dapp {
    pub fn new(
        config: DappConfig,
        provider: Option<Rc<dyn WalletProvider>>,
        read_only: Option<Rc<dyn ContractReader>>,
        store: Rc<dyn DisconnectFlagStore>,
        clock: Clock,
    ) -> (Self, DappChannels) {
        let (ui, ui_events) = mpsc::unbounded_channel();
        let (events, contract_events) = mpsc::unbounded_channel();
        let dapp = Self {
            sessions: SessionManager::new(provider, read_only, store, config.expected_chain_id),
            refresh: RefreshEngine::new(config.funder_lookback_blocks, config.leaderboard_size),
            subscriptions: EventSubscriptionManager::new(events),
            notifications: NotificationCenter::new(config.notification_ttl_ms),
            config,
            ui,
            clock,
        };
        (
            dapp,
            DappChannels {
                ui_events,
                contract_events,
            },
        )
    }

    pub fn config(&self) -> &DappConfig {
        &self.config
    }

    pub fn view(&self) -> ViewState {
        self.refresh.view()
    }

    pub fn session_state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn has_provider(&self) -> bool {
        self.sessions.has_provider()
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            debug!("ui channel closed; event dropped");
        }
    }

    fn emit_session(&self) {
        self.emit(UiEvent::SessionChanged(self.sessions.state()));
    }

    /// Page-load entry point: silent restore, token metadata, first pulls.
    pub async fn init(&self) {
        match self.sessions.restore_if_eligible().await {
            Ok(session) => self.start_session(&session),
            Err(NotEligible::Failed(err)) => warn!(error = %err, "silent wallet restore failed"),
            Err(reason) => debug!(%reason, "wallet not restored"),
        }
        self.emit_session();

        let token = self.refresh.load_token_metadata(&self.sessions.client()).await;
        self.emit(UiEvent::TokenLoaded(token));
        self.refresh_all().await;
    }

    fn start_session(&self, session: &Session) {
        let Some((_, client)) = self.sessions.signer() else {
            return;
        };
        if let Err(err) = self.subscriptions.subscribe(&session.address, &client) {
            warn!(
                address = %session.address,
                error = %err,
                "could not subscribe to contract events"
            );
        }
    }

    fn end_session(&self) {
        self.subscriptions.unsubscribe();
        self.refresh.reset_user();
        self.emit(UiEvent::ContributionUpdated(ContributionUpdate {
            owner: None,
            snapshot: ContributionSnapshot::default(),
            transition: None,
        }));
    }

    pub async fn connect(&self) -> Result<Session, DappError> {
        match self.sessions.connect(true).await {
            Ok(session) => {
                self.start_session(&session);
                self.emit_session();
                self.refresh_all().await;
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "wallet connect failed");
                self.notify(
                    NotificationKind::Error,
                    "Connection failed",
                    connect_failure_message(&err),
                );
                self.emit_session();
                Err(err.into())
            }
        }
    }

    pub async fn disconnect(&self) {
        self.sessions.disconnect();
        self.end_session();
        self.emit_session();
        self.refresh_pool().await;
    }

    pub async fn handle_accounts_changed(&self, accounts: &[Address]) {
        match self.sessions.on_accounts_changed(accounts).await {
            Ok(AccountChange::Unchanged | AccountChange::Ignored) => {}
            Ok(AccountChange::Switched(session)) => {
                info!(address = %session.address, "switched to new wallet account");
                self.end_session();
                self.start_session(&session);
                self.emit_session();
                self.refresh_all().await;
            }
            Ok(AccountChange::Disconnected) => {
                self.end_session();
                self.emit_session();
            }
            Err(err) => {
                warn!(error = %err, "could not follow wallet account change");
                self.end_session();
                self.emit_session();
                self.notify(
                    NotificationKind::Error,
                    "Connection failed",
                    connect_failure_message(&err),
                );
            }
        }
    }

    pub fn handle_chain_changed(&self, chain_id: u64) {
        self.sessions.on_chain_changed(chain_id);
        self.end_session();
        self.emit_session();
        self.notify(
            NotificationKind::Info,
            "Network changed",
            DappError::NetworkMismatch.user_message(),
        );
        self.emit(UiEvent::ReinitRequired);
    }

    /// Applies one live event. Events from a torn-down subscription are dropped.
    pub async fn handle_contract_event(&self, tagged: TaggedEvent) {
        if !self.subscriptions.is_current(tagged.generation) {
            debug!(generation = tagged.generation, "dropping event from stale subscription");
            return;
        }
        let session = self.sessions.address();
        let token = self.refresh.view().token;
        for reaction in react(&tagged.event.event, session.as_ref(), &token) {
            match reaction {
                Reaction::RefreshPool => self.refresh_pool().await,
                Reaction::RefreshUser => self.refresh_user().await,
                Reaction::Notify { kind, title, message } => {
                    self.notify(kind, title, message);
                }
            }
        }
    }

    pub async fn refresh_user(&self) {
        let address = self.sessions.address();
        let client = self.sessions.client();
        match self.refresh.refresh_user_contribution(address.as_ref(), &client).await {
            RefreshOutcome::Applied(update) => {
                let transition = update.transition;
                self.emit(UiEvent::ContributionUpdated(update));
                if let Some(transition) = transition {
                    self.emit(UiEvent::TierChanged(transition));
                }
            }
            RefreshOutcome::Superseded => {}
            RefreshOutcome::Failed(err) => {
                self.notify(NotificationKind::Error, "Refresh failed", err.user_message());
            }
        }
    }

    pub async fn refresh_pool(&self) {
        let refresh = self.refresh.refresh_pool_snapshot(&self.sessions.client()).await;
        if !refresh.superseded {
            self.emit(UiEvent::PoolUpdated(refresh.snapshot));
        }
        if let Some((_, err)) = refresh.failed.first() {
            self.notify(NotificationKind::Info, "Partial data", err.user_message());
        }
    }

    pub async fn refresh_all(&self) {
        tokio::join!(self.refresh_user(), self.refresh_pool());
    }

    /// Sends `fund()` with the typed amount. Reports "submitted" before "confirmed".
    pub async fn fund(&self, eth_amount: &str) -> Result<TxReceipt, DappError> {
        let result = self.submit_funding(eth_amount).await;
        if let Err(err) = &result {
            warn!(error = %err, "funding failed");
            self.notify(NotificationKind::Error, "Funding failed", err.user_message());
        }
        result
    }

    async fn submit_funding(&self, eth_amount: &str) -> Result<TxReceipt, DappError> {
        let (session, client) = self.sessions.signer().ok_or(DappError::NotConnected)?;
        let value = funding::parse_amount(eth_amount)?;

        let tx = client
            .send(WriteCall::Fund { value })
            .await
            .map_err(|err| DappError::classify(&err))?;
        info!(address = %session.address, tx = %tx.0, "funding transaction submitted");
        self.notify(
            NotificationKind::Info,
            funding::SUBMITTED_TITLE,
            format!("Waiting for confirmation of {}", tx.0),
        );

        let receipt = self.confirm(client.as_ref(), &tx).await?;
        self.notify(
            NotificationKind::Success,
            funding::CONFIRMED_TITLE,
            funding::CONFIRMED_MESSAGE,
        );
        self.refresh_all().await;
        Ok(receipt)
    }

    async fn confirm(
        &self,
        client: &dyn ContractClient,
        tx: &TxHash,
    ) -> Result<TxReceipt, DappError> {
        let receipt = client
            .await_confirmation(tx)
            .await
            .map_err(|err| DappError::classify(&err))?;
        if !receipt.success {
            return Err(DappError::InsufficientFunds);
        }
        info!(tx = %tx.0, block = receipt.block_number, "funding transaction confirmed");
        Ok(receipt)
    }

    /// `Ok(None)` when there is nothing to preview: no session or no valid amount.
    pub async fn preview_reward(
        &self,
        eth_amount: &str,
    ) -> Result<Option<RewardPreview>, DappError> {
        let Some(address) = self.sessions.address() else {
            return Ok(None);
        };
        let Ok(value) = funding::parse_amount(eth_amount) else {
            return Ok(None);
        };
        let client = self.sessions.client();
        let Some(reader) = client.reader() else {
            return Ok(None);
        };
        funding::fetch_preview(reader, &address, value, self.config.pica_multiplier)
            .await
            .map(Some)
            .map_err(|err| {
                warn!(error = %err, "reward preview failed");
                DappError::read(&err)
            })
    }

    pub fn notify(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Notification {
        let notification = self.notifications.push(kind, title, message, (self.clock)());
        self.emit(UiEvent::Notify(notification.clone()));
        notification
    }

    pub fn dismiss_notification(&self, id: u64) -> bool {
        self.notifications.dismiss(id)
    }

    pub fn expire_notifications(&self) -> Vec<u64> {
        self.notifications.expire((self.clock)())
    }

    pub fn active_notifications(&self) -> Vec<Notification> {
        self.notifications.active()
    }
}

fn connect_failure_message(err: &ConnectError) -> &'static str {
    match err {
        ConnectError::ProviderError(_) => "Error connecting wallet. Please try again.",
        other => DappError::from(other.clone()).user_message(),
    }
}
