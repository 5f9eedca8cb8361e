//! Global page state.
//!
//! `RefCell`-wrapped `thread_local!` storage (WASM is single-threaded). The
//! core `Dapp` owns all chain state; this only keeps what rendering needs.

use pf_dapp_core::{Dapp, TokenMetadata};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
pub struct AppState {
    pub dapp: Option<Rc<Dapp>>,
    pub token: TokenMetadata,
    pub connected: bool,
}

thread_local! {
    static STATE: RefCell<AppState> = RefCell::new(AppState::default());
}

pub fn with<F, R>(f: F) -> R
where
    F: FnOnce(&AppState) -> R,
{
    STATE.with(|s| f(&s.borrow()))
}

pub fn with_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut AppState) -> R,
{
    STATE.with(|s| f(&mut s.borrow_mut()))
}

// ── Convenience accessors ──

pub fn dapp() -> Option<Rc<Dapp>> {
    with(|s| s.dapp.clone())
}

pub fn set_dapp(dapp: Rc<Dapp>) {
    with_mut(|s| s.dapp = Some(dapp));
}

pub fn token() -> TokenMetadata {
    with(|s| s.token.clone())
}

pub fn set_token(token: TokenMetadata) {
    with_mut(|s| s.token = token);
}

pub fn connected() -> bool {
    with(|s| s.connected)
}

pub fn set_connected(connected: bool) {
    with_mut(|s| s.connected = connected);
}
