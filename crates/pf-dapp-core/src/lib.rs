//! Target-independent core of the PicaFund front end.
//!
//! Nothing here touches the DOM or a network stack directly: wallet, contract
//! and storage access come in through the traits of `pf-contract-client` and
//! `pf-storage`, so the same code runs in the browser and in native tests.

pub mod app;
pub mod config;
pub mod error;
pub mod format;
pub mod funders;
pub mod funding;
pub mod notify;
pub mod refresh;
pub mod session;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{Clock, Dapp, DappChannels, UiEvent};
pub use config::DappConfig;
pub use error::{ConnectError, DappError, NotEligible};
pub use refresh::{ContributionUpdate, TierTransition, TokenMetadata, ViewState};
pub use session::{Session, SessionOrigin, SessionState};
pub use subscriptions::TaggedEvent;
