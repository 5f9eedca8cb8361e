//! Event binding.
//!
//! Wires page listeners and wallet signals to the core, and runs the two
//! pumps that drain the core's channels: UI events into the DOM and live
//! contract events back into the core.

use crate::dom::{self, Elements};
use crate::ethereum::{self, Eip1193};
use crate::render;
use crate::state;
use crate::toast;
use gloo_utils::format::JsValueSerdeExt;
use pf_dapp_core::funding::SUBMITTED_TITLE;
use pf_dapp_core::{DappChannels, UiEvent};
use serde_json::Value;
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Attach an async click handler to an element.
macro_rules! on_click_async {
    ($el:expr, $els:expr, $handler:expr) => {{
        let els = $els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els2 = els.clone();
            wasm_bindgen_futures::spawn_local(async move {
                $handler(&els2).await;
            });
        }) as Box<dyn FnMut(_)>);
        if $el
            .add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .is_err()
        {
            warn!("could not bind click handler");
        }
        cb.forget();
    }};
}

/// Bind all page listeners. Call once after init.
pub fn bind_events(els: &Elements) {
    on_click_async!(els.connect_btn, els, on_connect_toggle);
    on_click_async!(els.fund_btn, els, on_fund);

    // ── Reward preview ──
    let els2 = els.clone();
    let cb = Closure::wrap(Box::new(move |_: web_sys::Event| {
        let els3 = els2.clone();
        wasm_bindgen_futures::spawn_local(async move {
            on_amount_input(&els3).await;
        });
    }) as Box<dyn FnMut(_)>);
    if els
        .eth_amount
        .add_event_listener_with_callback("input", cb.as_ref().unchecked_ref())
        .is_err()
    {
        warn!("could not bind amount input handler");
    }
    cb.forget();
}

/// `accountsChanged` follows the wallet; `chainChanged` rebuilds the page.
pub fn bind_wallet_signals(provider: &Eip1193) {
    let accounts_changed = Closure::wrap(Box::new(move |raw: JsValue| {
        let accounts = raw
            .into_serde::<Value>()
            .map_err(|err| err.to_string())
            .and_then(|value| ethereum::parse_accounts(value).map_err(|err| err.to_string()));
        let accounts = match accounts {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!(error = %err, "unreadable accountsChanged payload");
                return;
            }
        };
        if let Some(dapp) = state::dapp() {
            wasm_bindgen_futures::spawn_local(async move {
                dapp.handle_accounts_changed(&accounts).await;
            });
        }
    }) as Box<dyn FnMut(JsValue)>);
    if let Err(err) = provider.on("accountsChanged", accounts_changed) {
        warn!(error = %err, "could not listen for account changes");
    }

    let chain_changed = Closure::wrap(Box::new(move |raw: JsValue| {
        let chain_id = raw
            .as_string()
            .and_then(|hex| u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok())
            .unwrap_or_default();
        if let Some(dapp) = state::dapp() {
            dapp.handle_chain_changed(chain_id);
        }
    }) as Box<dyn FnMut(JsValue)>);
    if let Err(err) = provider.on("chainChanged", chain_changed) {
        warn!(error = %err, "could not listen for chain changes");
    }
}

pub fn spawn_pumps(els: &Elements, channels: DappChannels) {
    let DappChannels {
        mut ui_events,
        mut contract_events,
    } = channels;

    let els = els.clone();
    wasm_bindgen_futures::spawn_local(async move {
        while let Some(event) = ui_events.recv().await {
            apply(&els, event);
        }
    });

    wasm_bindgen_futures::spawn_local(async move {
        while let Some(tagged) = contract_events.recv().await {
            if let Some(dapp) = state::dapp() {
                dapp.handle_contract_event(tagged).await;
            }
        }
    });
}

fn apply(els: &Elements, event: UiEvent) {
    match event {
        UiEvent::SessionChanged(session) => render::session(els, &session),
        UiEvent::ContributionUpdated(update) => render::contribution(els, &update.snapshot),
        UiEvent::PoolUpdated(snapshot) => render::pool(els, &snapshot),
        UiEvent::TokenLoaded(token) => state::set_token(token),
        // The toast for the mint/upgrade arrives as its own notification.
        UiEvent::TierChanged(_) => {}
        UiEvent::Notify(notification) => {
            if notification.title == SUBMITTED_TITLE {
                render::fund_button_busy(els, Some("Confirming..."));
            }
            toast::show(els, &notification);
        }
        UiEvent::ReinitRequired => dom::reload(),
    }
}

// ── Handlers ──

async fn on_connect_toggle(els: &Elements) {
    let Some(dapp) = state::dapp() else {
        return;
    };
    if state::connected() {
        dapp.disconnect().await;
    } else if dapp.connect().await.is_ok() {
        on_amount_input(els).await;
    }
}

async fn on_fund(els: &Elements) {
    let Some(dapp) = state::dapp() else {
        return;
    };
    render::fund_button_busy(els, Some("Processing..."));
    let amount = dom::get_input_value(&els.eth_amount);
    if dapp.fund(&amount).await.is_ok() {
        dom::set_input_value(&els.eth_amount, "");
        render::preview(els, None);
    }
    render::fund_button_busy(els, None);
}

async fn on_amount_input(els: &Elements) {
    let Some(dapp) = state::dapp() else {
        return;
    };
    let amount = dom::get_input_value(&els.eth_amount);
    match dapp.preview_reward(&amount).await {
        Ok(preview) => render::preview(els, preview.as_ref()),
        Err(_) => render::preview(els, None),
    }
}
